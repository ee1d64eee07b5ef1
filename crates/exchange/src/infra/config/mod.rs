use {
    crate::domain::{AdapterName, Currency, hooks::Plans},
    rust_decimal::Decimal,
    std::time::Duration,
    url::Url,
};

pub mod file;

/// Configuration of the exchange, as loaded from the config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub currency: Currency,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    /// Responses larger than this are discarded.
    pub response_size_limit: usize,
    /// In configuration order, which is the tie-break order.
    pub adapters: Vec<Adapter>,
    pub rates: Vec<Rate>,
    pub plans: Plans,
}

#[derive(Debug, Clone)]
pub struct Adapter {
    pub name: AdapterName,
    pub endpoint: Url,
    pub timeout: Option<Duration>,
    pub bid_adjustment: Decimal,
}

#[derive(Debug, Clone)]
pub struct Rate {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
}
