//! This module implements the observability for the exchange. It exposes
//! functions which represent events that are meaningful to the system. These
//! functions are called when the corresponding events occur. They log the
//! event and update the metrics, if the event is worth measuring.

use {
    crate::{
        domain::{
            AdapterName,
            AuctionRequest,
            TypedBid,
            aggregation::DropReason,
            auction::{AuctionResult, InvalidRequest},
            fanout::{AdapterOutcome, AdapterResult},
            hooks::{HookId, HookOutcome, Plans, Rejection, Stage, StageOutcome},
            time::Deadline,
        },
        infra::config::Config,
        util::task::Panic,
    },
    std::time::Duration,
};

mod metrics;

/// Setup the observability. The log argument configures the tokio tracing
/// framework.
pub fn init(log: &str, stderr_threshold: Option<tracing::Level>, use_json: bool) {
    observe::tracing::initialize(log, stderr_threshold, use_json);
    metrics::init();
}

/// Observe the loaded configuration.
pub fn config(config: &Config) {
    tracing::info!(
        currency = %config.currency,
        adapters = config.adapters.len(),
        default_timeout = ?config.default_timeout,
        max_timeout = ?config.max_timeout,
        "loaded configuration"
    );
}

/// Observe a request that failed validation before the auction started.
pub fn bad_input(err: &InvalidRequest) {
    tracing::info!(%err, "rejected auction request");
}

/// Observe that an auction is starting.
pub fn auction_started(request: &AuctionRequest, timeout: Duration) {
    tracing::debug!(
        endpoint = %request.endpoint,
        account = ?request.account,
        adapters = ?request.adapters,
        ?timeout,
        "auction started"
    );
}

/// Observe the auction result handed back to the caller.
pub fn auction_finished(result: &AuctionResult) {
    let winners = result
        .outcome
        .bids()
        .map(|outcome| outcome.winners().count())
        .unwrap_or_default();
    tracing::info!(
        outcome = result.outcome.label(),
        winners,
        elapsed = ?result.elapsed,
        "auction finished"
    );
    metrics::get()
        .auctions
        .with_label_values(&[result.outcome.label()])
        .inc();
}

/// Observe a request naming an adapter that is not registered.
pub fn unknown_adapter(name: &AdapterName) {
    tracing::info!(%name, "unknown adapter");
}

/// Observe that an adapter could not build any request.
pub fn adapter_build_failed(name: &AdapterName, errors: &[String]) {
    tracing::debug!(%name, ?errors, "adapter failed to build requests");
}

/// Observe that an adapter was still building its requests at its deadline.
pub fn adapter_build_timed_out(name: &AdapterName) {
    tracing::warn!(%name, "adapter did not build its requests in time");
}

/// Observe a panic inside adapter code.
pub fn adapter_panicked(name: &AdapterName, panic: &Panic) {
    tracing::error!(%name, %panic, "adapter panicked");
}

/// Observe that an adapter's requests are about to be sent.
pub fn dispatching(name: &AdapterName, requests: usize, deadline: Deadline) {
    tracing::trace!(
        %name,
        requests,
        remaining = ?deadline.remaining(),
        "dispatching adapter requests"
    );
}

/// Observe the result of one adapter.
pub fn adapter_finished(name: &AdapterName, outcome: &AdapterOutcome) {
    match &outcome.result {
        AdapterResult::Bids(bids) => {
            tracing::debug!(%name, bids = bids.len(), elapsed = ?outcome.elapsed, "adapter bid")
        }
        AdapterResult::Error(err) => {
            tracing::info!(%name, %err, elapsed = ?outcome.elapsed, "adapter failed")
        }
        other => tracing::debug!(%name, result = other.label(), elapsed = ?outcome.elapsed, "adapter finished"),
    }
    if !outcome.warnings.is_empty() {
        tracing::debug!(%name, warnings = ?outcome.warnings, "adapter warnings");
    }
    metrics::get()
        .adapter_results
        .with_label_values(&[name.as_str(), outcome.result.label()])
        .inc();
    metrics::get()
        .adapter_time
        .with_label_values(&[name.as_str()])
        .observe(outcome.elapsed.as_secs_f64());
}

/// Observe a bid that was discarded during aggregation.
pub fn bid_dropped(adapter: &AdapterName, bid: &TypedBid, reason: DropReason) {
    let reason: &'static str = reason.into();
    tracing::debug!(%adapter, bid = %bid.id, impression = %bid.impression, reason, "dropped bid");
    metrics::get()
        .dropped_bids
        .with_label_values(&[adapter.as_str(), reason])
        .inc();
}

/// Observe a hook named in the plans that nothing registered.
pub fn hook_missing(id: &HookId, stage: Stage) {
    tracing::warn!(hook = %id, %stage, "hook in plan is not registered, skipping");
}

/// Observe the outcome of one hook invocation.
pub fn hook_invoked(stage: Stage, outcome: &HookOutcome) {
    let status: &'static str = outcome.status.into();
    tracing::debug!(
        hook = %outcome.hook,
        %stage,
        status,
        action = ?outcome.action,
        message = ?outcome.message,
        elapsed = ?outcome.elapsed,
        "hook invoked"
    );
    if !outcome.warnings.is_empty() {
        tracing::info!(hook = %outcome.hook, %stage, warnings = ?outcome.warnings, "hook warnings");
    }
    let stage: &'static str = stage.into();
    metrics::get()
        .hook_invocations
        .with_label_values(&[outcome.hook.module.as_str(), stage, status])
        .inc();
}

/// Observe a completed stage.
pub fn stage_finished(outcome: &StageOutcome) {
    if outcome.groups.is_empty() {
        return;
    }
    tracing::trace!(
        stage = %outcome.stage,
        adapter = ?outcome.adapter,
        state = ?outcome.state,
        elapsed = ?outcome.elapsed,
        "stage finished"
    );
    let stage: &'static str = outcome.stage.into();
    metrics::get()
        .stage_time
        .with_label_values(&[stage])
        .observe(outcome.elapsed.as_secs_f64());
}

/// Observe a hook rejecting the auction or an adapter.
pub fn stage_rejected(rejection: &Rejection, adapter: Option<&AdapterName>) {
    tracing::info!(
        stage = %rejection.stage,
        hook = %rejection.hook,
        message = ?rejection.message,
        ?adapter,
        "rejected by hook"
    );
}

/// Observe new hook plans being activated.
pub fn plans_replaced(plans: &Plans) {
    tracing::info!(accounts = plans.accounts.len(), "replaced hook plans");
}
