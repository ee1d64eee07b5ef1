use {
    super::{AdapterName, ImpressionId},
    crate::domain::currency::Currency,
    serde::{Deserialize, Serialize},
    serde_with::{DurationMilliSeconds, serde_as},
    std::{collections::HashSet, time::Duration},
    thiserror::Error,
};

/// Unique identifier of an inbound auction request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct Id(pub String);

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The inbound bid request.
///
/// Immutable once the fan-out starts. Before that, hooks of the
/// `raw-auction-request` stage may replace it through their change sets.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionRequest {
    pub id: Id,
    /// The endpoint the request arrived on. Selects the hook plan.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// The publisher account. Selects the account hook plan.
    #[serde(default)]
    pub account: Option<String>,
    /// Top level timeout of the auction in milliseconds.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default)]
    pub tmax: Option<Duration>,
    pub impressions: Vec<Impression>,
    /// Privacy and consent signals. Passed through to adapters untouched.
    #[serde(default)]
    pub consent: Option<serde_json::Value>,
    /// The adapters selected to participate, in request order.
    pub adapters: Vec<AdapterName>,
    /// Currency the caller wants prices in. Defaults to the exchange's.
    #[serde(default)]
    pub currency: Option<Currency>,
}

pub const DEFAULT_ENDPOINT: &str = "/openrtb2/auction";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impression {
    pub id: ImpressionId,
    #[serde(default)]
    pub media: Vec<super::MediaType>,
    /// Adapter specific parameters, keyed by adapter name.
    #[serde(default)]
    pub ext: serde_json::Value,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("the request has no impressions")]
    NoImpressions,
    #[error("impression at position {0} has an empty id")]
    EmptyImpressionId(usize),
    #[error("impression id {0} is used more than once")]
    DuplicateImpression(ImpressionId),
    #[error("the request timeout must be greater than zero")]
    ZeroTimeout,
}

impl AuctionRequest {
    /// Checks the structural invariants every auction relies on.
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        if self.impressions.is_empty() {
            return Err(InvalidRequest::NoImpressions);
        }
        let mut seen = HashSet::new();
        for (i, impression) in self.impressions.iter().enumerate() {
            if impression.id.0.is_empty() {
                return Err(InvalidRequest::EmptyImpressionId(i));
            }
            if !seen.insert(&impression.id) {
                return Err(InvalidRequest::DuplicateImpression(impression.id.clone()));
            }
        }
        if self.tmax.is_some_and(|tmax| tmax.is_zero()) {
            return Err(InvalidRequest::ZeroTimeout);
        }
        Ok(())
    }

    /// Position of the impression in the request, used to order results.
    pub fn impression_position(&self, id: &ImpressionId) -> Option<usize> {
        self.impressions.iter().position(|imp| &imp.id == id)
    }
}
