use {
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// An ISO 4217 currency code. Always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn usd() -> Self {
        Self("USD".to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::from(code.to_owned())
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of exchange rates used to normalise bid prices.
#[cfg_attr(test, mockall::automock)]
pub trait Conversions: Send + Sync {
    /// The rate `r` such that `amount_in_from * r = amount_in_to`, or `None`
    /// if the pair is not supported.
    fn rate(&self, from: &Currency, to: &Currency) -> Option<Decimal>;
}

/// Fixed rates loaded from the configuration.
///
/// A pair configured in one direction can be used in the other direction as
/// well.
#[derive(Debug, Clone, Default)]
pub struct RateTable(HashMap<(Currency, Currency), Decimal>);

impl RateTable {
    pub fn new(rates: impl IntoIterator<Item = (Currency, Currency, Decimal)>) -> Self {
        Self(
            rates
                .into_iter()
                .map(|(from, to, rate)| ((from, to), rate))
                .collect(),
        )
    }
}

impl Conversions for RateTable {
    fn rate(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        if let Some(rate) = self.0.get(&(from.clone(), to.clone())) {
            return Some(*rate);
        }
        self.0
            .get(&(to.clone(), from.clone()))
            .and_then(|inverse| Decimal::ONE.checked_div(*inverse))
    }
}
