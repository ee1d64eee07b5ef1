//! Sends one auction to many adapters at once and collects what comes back
//! before the deadline.

use {
    crate::{
        domain::{
            AdapterName,
            AuctionRequest,
            TypedBid,
            hooks::Rejection,
            time::Deadline,
        },
        infra::{
            adapter::{Adapter, OutboundRequest, Registry},
            observe,
            transport::{self, Transport},
        },
        util::task::{self, Joined},
    },
    futures::future::join_all,
    indexmap::IndexMap,
    itertools::Itertools,
    serde::Serialize,
    std::{sync::Arc, time::Duration},
    thiserror::Error,
    tokio::time::Instant,
};

/// What one adapter contributed to an auction.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AdapterResult {
    Bids(Vec<TypedBid>),
    NoBid,
    Error(AdapterError),
    Timeout,
    /// A `raw-bidder-response` hook vetoed the adapter's bids.
    Rejected(Rejection),
}

impl AdapterResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bids(_) => "bids",
            Self::NoBid => "no_bid",
            Self::Error(err) => err.label(),
            Self::Timeout => "timeout",
            Self::Rejected(_) => "rejected",
        }
    }

    pub fn bids(&self) -> &[TypedBid] {
        match self {
            Self::Bids(bids) => bids,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum AdapterError {
    #[error("bad input: {0}")]
    BadInput(String),
    #[error("bad server response: {0}")]
    BadServerResponse(String),
    #[error("failed to request bids: {0}")]
    FailedToRequestBids(String),
    #[error("adapter panicked: {0}")]
    Panic(String),
}

impl AdapterError {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "bad_input",
            Self::BadServerResponse(_) => "bad_server_response",
            Self::FailedToRequestBids(_) => "failed_to_request_bids",
            Self::Panic(_) => "panic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterOutcome {
    pub result: AdapterResult,
    /// Errors that did not prevent the adapter from bidding.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// The network phase of one adapter: its outbound requests and the deadline
/// they have to be answered by. Consumed by the task that runs it.
pub struct AdapterCall {
    pub adapter: Arc<dyn Adapter>,
    pub requests: Vec<OutboundRequest>,
    pub deadline: Deadline,
}

#[derive(Default)]
struct Responses {
    bids: Vec<TypedBid>,
    parse_errors: Vec<String>,
    transport_errors: Vec<transport::Error>,
    panic: Option<task::Panic>,
}

impl AdapterCall {
    /// Sends all requests concurrently and parses each answer as it comes
    /// in.
    async fn run(self, transport: Arc<dyn Transport>) -> Responses {
        let Self {
            adapter,
            requests,
            deadline,
        } = self;
        let calls = requests.into_iter().map(|request| {
            let adapter = adapter.clone();
            let transport = transport.clone();
            async move {
                let response = transport.send(&request, deadline).await?;
                Ok::<_, transport::Error>(
                    task::blocking(move || adapter.parse_response(&request, &response)).await,
                )
            }
        });

        let mut responses = Responses::default();
        for result in join_all(calls).await {
            match result {
                Ok(Ok((bids, errors))) => {
                    responses.bids.extend(bids);
                    responses
                        .parse_errors
                        .extend(errors.iter().map(|err| format!("{err:#}")));
                }
                Ok(Err(panic)) => responses.panic = Some(panic),
                Err(err) => responses.transport_errors.push(err),
            }
        }
        responses
    }
}

/// Fans an auction out to the adapters it selected.
pub struct Executor {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Runs every adapter named in the request at most once and returns one
    /// result per adapter, in request order. Returns no later than the
    /// deadline plus the time needed to collect results.
    pub async fn execute(
        &self,
        request: &AuctionRequest,
        deadline: Deadline,
    ) -> IndexMap<AdapterName, AdapterOutcome> {
        let request = Arc::new(request.clone());
        let adapters = request.adapters.iter().unique().map(|name| {
            let request = request.clone();
            async move {
                let outcome = self.adapter(name, request, deadline).await;
                observe::adapter_finished(name, &outcome);
                (name.clone(), outcome)
            }
        });
        join_all(adapters).await.into_iter().collect()
    }

    async fn adapter(
        &self,
        name: &AdapterName,
        request: Arc<AuctionRequest>,
        deadline: Deadline,
    ) -> AdapterOutcome {
        let start = Instant::now();
        let finish = |result: AdapterResult, warnings: Vec<String>| AdapterOutcome {
            result,
            warnings,
            elapsed: start.elapsed(),
        };

        let Some(entry) = self.registry.get(name) else {
            observe::unknown_adapter(name);
            return finish(
                AdapterResult::Error(AdapterError::BadInput("unknown adapter".to_owned())),
                vec![],
            );
        };
        let call_deadline = deadline.derive_opt(entry.settings.timeout);

        // Building is synchronous partner code. It runs off this task so a
        // slow adapter can't hold up the others or the deadline.
        let adapter = entry.adapter.clone();
        let build = task::spawn_blocking_isolated(move || adapter.build_requests(&request));
        let (requests, errors) = match task::join_until(build, call_deadline).await {
            Joined::Done(built) => built,
            Joined::Panicked(panic) => {
                observe::adapter_panicked(name, &panic);
                return finish(AdapterResult::Error(AdapterError::Panic(panic.0)), vec![]);
            }
            Joined::TimedOut => {
                observe::adapter_build_timed_out(name);
                return finish(AdapterResult::Timeout, vec![]);
            }
        };
        let mut warnings = errors.iter().map(|err| format!("{err:#}")).collect_vec();
        if requests.is_empty() {
            if warnings.is_empty() {
                return finish(AdapterResult::NoBid, vec![]);
            }
            observe::adapter_build_failed(name, &warnings);
            let message = warnings.join("; ");
            return finish(AdapterResult::Error(AdapterError::BadInput(message)), vec![]);
        }

        let call = AdapterCall {
            adapter: entry.adapter.clone(),
            requests,
            deadline: call_deadline,
        };
        observe::dispatching(name, call.requests.len(), call_deadline);
        let handle = task::spawn_isolated(call.run(self.transport.clone()));

        let responses = match task::join_until(handle, call_deadline).await {
            Joined::Done(responses) => responses,
            Joined::Panicked(panic) => {
                observe::adapter_panicked(name, &panic);
                return finish(AdapterResult::Error(AdapterError::Panic(panic.0)), warnings);
            }
            Joined::TimedOut => return finish(AdapterResult::Timeout, warnings),
        };
        if let Some(panic) = responses.panic {
            observe::adapter_panicked(name, &panic);
            return finish(AdapterResult::Error(AdapterError::Panic(panic.0)), warnings);
        }

        let result = if !responses.bids.is_empty() {
            AdapterResult::Bids(responses.bids)
        } else if !responses.parse_errors.is_empty() {
            AdapterResult::Error(AdapterError::BadServerResponse(
                responses.parse_errors.join("; "),
            ))
        } else if !responses.transport_errors.is_empty() {
            if responses.transport_errors.iter().all(transport::Error::is_timeout) {
                AdapterResult::Timeout
            } else {
                AdapterResult::Error(AdapterError::FailedToRequestBids(
                    responses.transport_errors.iter().join("; "),
                ))
            }
        } else {
            AdapterResult::NoBid
        };
        if matches!(result, AdapterResult::Bids(_)) {
            warnings.extend(responses.parse_errors);
            warnings.extend(responses.transport_errors.iter().map(ToString::to_string));
        }
        finish(result, warnings)
    }
}
