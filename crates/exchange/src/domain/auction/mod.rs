use {
    crate::{
        domain::{
            aggregation::{self, AuctionOutcome, Tally},
            currency::{Conversions, Currency},
            fanout::{self, AdapterOutcome, AdapterResult},
            hooks::{self, BidderResponse, Rejection, Repository, Stage, StageOutcome, engine},
            time::Deadline,
        },
        infra::{adapter::Registry, observe, transport::Transport},
    },
    futures::future::join_all,
    indexmap::IndexMap,
    serde::{Deserialize, Serialize},
    std::{borrow::Borrow, sync::Arc, time::Duration},
    tokio::time::Instant,
    tracing::Instrument,
};

mod bid;
mod request;

pub use {
    bid::{MediaType, TypedBid, VideoInfo},
    request::{AuctionRequest, DEFAULT_ENDPOINT, Id, Impression, InvalidRequest},
};

/// Name under which an adapter is registered.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct AdapterName(pub String);

impl From<&str> for AdapterName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for AdapterName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for AdapterName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AdapterName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct ImpressionId(pub String);

impl From<&str> for ImpressionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ImpressionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ImpressionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Currency prices are normalised to unless the request asks otherwise.
    pub currency: Currency,
    /// Used when the request has no timeout.
    pub default_timeout: Duration,
    /// Requested timeouts are capped to this.
    pub max_timeout: Duration,
}

impl Settings {
    pub fn timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_timeout)
            .min(self.max_timeout)
    }
}

/// Runs auctions. One instance serves any number of concurrent auctions;
/// everything it holds is read-only except the plans, which are swapped as
/// a whole.
pub struct Exchange {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    hooks: Arc<Repository>,
    plans: Arc<hooks::PlanStore>,
    conversions: Arc<dyn Conversions>,
    settings: Settings,
}

impl Exchange {
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        hooks: Arc<Repository>,
        plans: Arc<hooks::PlanStore>,
        conversions: Arc<dyn Conversions>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            transport,
            hooks,
            plans,
            conversions,
            settings,
        }
    }

    pub fn plans(&self) -> &hooks::PlanStore {
        &self.plans
    }

    /// Runs one auction to completion.
    ///
    /// Never fails: partner and hook failures are contained and reported in
    /// the result. Returns within the auction's timeout plus the time it
    /// takes to collect results.
    pub async fn run_auction(&self, request: AuctionRequest) -> AuctionResult {
        let span = tracing::info_span!("auction", id = %request.id);
        let id = request.id.0.clone();
        ::observe::request_id::scope(id, self.auction(request).instrument(span)).await
    }

    async fn auction(&self, mut request: AuctionRequest) -> AuctionResult {
        let start = Instant::now();
        let mut result = AuctionResult {
            id: request.id.clone(),
            outcome: Outcome::BadInput {
                reason: String::new(),
            },
            elapsed: Duration::ZERO,
            adapters: IndexMap::new(),
            hooks: vec![],
        };

        if let Err(err) = request.validate() {
            observe::bad_input(&err);
            result.outcome = Outcome::BadInput {
                reason: err.to_string(),
            };
            return result.finish(start);
        }
        let timeout = self.settings.timeout(request.tmax);
        request.tmax = Some(timeout);
        let deadline = Deadline::after(timeout);
        observe::auction_started(&request, timeout);

        let stages = engine::Executor::new(self.plans.snapshot(), &request);

        for stage in [Stage::Entrypoint, Stage::RawAuctionRequest] {
            let hooks = match stage {
                Stage::Entrypoint => &self.hooks.entrypoint,
                _ => &self.hooks.raw_auction_request,
            };
            let execution = stages.execute(stage, hooks, request, deadline).await;
            result.hooks.push(execution.outcome);
            if let Some(rejection) = execution.rejection {
                result.outcome = Outcome::Rejected(rejection);
                return result.finish(start);
            }
            request = execution.payload;
        }
        // Hooks may have changed the request in ways that break it.
        if let Err(err) = request.validate() {
            observe::bad_input(&err);
            result.outcome = Outcome::BadInput {
                reason: err.to_string(),
            };
            return result.finish(start);
        }

        let mut adapters = fanout::Executor::new(self.registry.clone(), self.transport.clone())
            .execute(&request, deadline)
            .await;

        let responses = adapters.iter().filter_map(|(name, outcome)| match &outcome.result {
            AdapterResult::Bids(bids) => {
                let response = BidderResponse {
                    adapter: name.clone(),
                    bids: bids.clone(),
                };
                Some(stages.execute_for_adapter(
                    Stage::RawBidderResponse,
                    name,
                    &self.hooks.raw_bidder_response,
                    response,
                    deadline,
                ))
            }
            _ => None,
        });
        let executions = join_all(responses).await;
        for execution in executions {
            let Some(name) = execution.outcome.adapter.clone() else {
                continue;
            };
            if let Some(outcome) = adapters.get_mut(&name) {
                outcome.result = match execution.rejection {
                    Some(rejection) => AdapterResult::Rejected(rejection),
                    None if execution.payload.bids.is_empty() => AdapterResult::NoBid,
                    None => AdapterResult::Bids(execution.payload.bids),
                };
            }
            result.hooks.push(execution.outcome);
        }

        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.settings.currency.clone());
        let aggregation = aggregation::aggregate(
            &request,
            &currency,
            &adapters,
            &self.registry,
            self.conversions.as_ref(),
        );

        let execution = stages
            .execute(
                Stage::AllProcessedBidResponses,
                &self.hooks.all_processed_bid_responses,
                aggregation.outcome,
                deadline,
            )
            .await;
        result.hooks.push(execution.outcome);
        let outcome = match execution.rejection {
            Some(_) => AuctionOutcome::empty(currency, execution.payload.impressions),
            None => execution.payload,
        };

        let execution = stages
            .execute(
                Stage::AuctionResponse,
                &self.hooks.auction_response,
                outcome,
                deadline,
            )
            .await;
        result.hooks.push(execution.outcome);

        result.outcome = Outcome::Bids(execution.payload);
        result.adapters = adapters
            .into_iter()
            .map(|(name, outcome)| {
                let tally = aggregation.tallies.get(&name).copied().unwrap_or_default();
                (name, AdapterStatus::new(outcome, tally))
            })
            .collect();
        result.finish(start)
    }
}

/// Everything the caller learns about an auction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionResult {
    pub id: Id,
    pub outcome: Outcome,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// One entry per adapter selected by the request.
    pub adapters: IndexMap<AdapterName, AdapterStatus>,
    /// Traces of every stage that ran, in execution order.
    pub hooks: Vec<StageOutcome>,
}

impl AuctionResult {
    fn finish(mut self, start: Instant) -> Self {
        self.elapsed = start.elapsed();
        observe::auction_finished(&self);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Bids(AuctionOutcome),
    Rejected(Rejection),
    BadInput { reason: String },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bids(outcome) if outcome.candidates.is_empty() => "no_bids",
            Self::Bids(_) => "bids",
            Self::Rejected(_) => "rejected",
            Self::BadInput { .. } => "bad_input",
        }
    }

    pub fn bids(&self) -> Option<&AuctionOutcome> {
        match self {
            Self::Bids(outcome) => Some(outcome),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    pub result: AdapterResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub bids: Tally,
}

impl AdapterStatus {
    fn new(outcome: AdapterOutcome, bids: Tally) -> Self {
        Self {
            result: outcome.result,
            warnings: outcome.warnings,
            elapsed: outcome.elapsed,
            bids,
        }
    }
}
