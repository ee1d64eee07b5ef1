//! The contract between the exchange and its demand partners.
//!
//! An adapter translates the exchange's auction request into its partner's
//! wire format and the partner's answers back into [`TypedBid`]s. It never
//! performs I/O itself; the exchange sends the requests it builds through a
//! [`crate::infra::transport::Transport`].

use {
    crate::domain::{AdapterName, AuctionRequest, ImpressionId, TypedBid},
    bytes::Bytes,
    indexmap::IndexMap,
    reqwest::{Method, StatusCode, header::HeaderMap},
    rust_decimal::Decimal,
    std::{sync::Arc, time::Duration},
    url::Url,
};

pub mod generic;

pub use generic::Generic;

pub trait Adapter: Send + Sync {
    /// Builds the partner requests for an auction. Errors are reported
    /// alongside whatever requests could still be built.
    fn build_requests(
        &self,
        request: &AuctionRequest,
    ) -> (Vec<OutboundRequest>, Vec<anyhow::Error>);

    /// Interprets the partner's answer to one of the requests built by
    /// [`Adapter::build_requests`]. An empty or `204 No Content` response
    /// is a valid "no bid" and must not produce errors.
    fn parse_response(
        &self,
        request: &OutboundRequest,
        response: &RawResponse,
    ) -> (Vec<TypedBid>, Vec<anyhow::Error>);
}

/// An HTTP request built by an adapter.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// The impressions this request bids on.
    pub impressions: Vec<ImpressionId>,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_no_content(&self) -> bool {
        self.status == StatusCode::NO_CONTENT || self.body.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Upper bound on the time this adapter gets, on top of the auction
    /// deadline.
    pub timeout: Option<Duration>,
    /// Multiplier applied to this adapter's prices before ranking.
    pub bid_adjustment: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: None,
            bid_adjustment: Decimal::ONE,
        }
    }
}

#[derive(Clone)]
pub struct Entry {
    pub adapter: Arc<dyn Adapter>,
    pub settings: Settings,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// All adapters known to the exchange, in configuration order.
///
/// Built once at startup and shared read-only between auctions. The order is
/// meaningful: when two bids tie on price, the adapter registered first
/// wins.
#[derive(Debug, Clone, Default)]
pub struct Registry(IndexMap<AdapterName, Entry>);

impl Registry {
    pub fn with(mut self, name: AdapterName, adapter: Arc<dyn Adapter>, settings: Settings) -> Self {
        self.0.insert(name, Entry { adapter, settings });
        self
    }

    pub fn get(&self, name: &AdapterName) -> Option<&Entry> {
        self.0.get(name)
    }

    /// Configuration position of the adapter. Unknown adapters rank last.
    pub fn rank(&self, name: &AdapterName) -> usize {
        self.0.get_index_of(name).unwrap_or(usize::MAX)
    }

    pub fn settings(&self, name: &AdapterName) -> Settings {
        self.get(name)
            .map(|entry| entry.settings.clone())
            .unwrap_or_default()
    }
}
