/// Metrics for the exchange.
#[derive(Debug, Clone, prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Finished auctions by outcome.
    #[metric(labels("result"))]
    pub auctions: prometheus::IntCounterVec,
    /// What each adapter contributed.
    #[metric(labels("adapter", "result"))]
    pub adapter_results: prometheus::IntCounterVec,
    /// Time from dispatching an adapter until its result was collected.
    #[metric(
        labels("adapter"),
        buckets(0.005, 0.01, 0.025, 0.05, 0.1, 0.15, 0.2, 0.3, 0.5, 1.0)
    )]
    pub adapter_time: prometheus::HistogramVec,
    /// Bids discarded during aggregation.
    #[metric(labels("adapter", "reason"))]
    pub dropped_bids: prometheus::IntCounterVec,
    /// Hook invocations by status.
    #[metric(labels("module", "stage", "status"))]
    pub hook_invocations: prometheus::IntCounterVec,
    /// Time spent per pipeline stage.
    #[metric(
        labels("stage"),
        buckets(0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25)
    )]
    pub stage_time: prometheus::HistogramVec,
}

/// Setup the metrics registry.
pub fn init() {
    observe::metrics::setup_registry_reentrant(Some("exchange".to_owned()), None);
}

/// Get the metrics instance.
pub fn get() -> &'static Metrics {
    Metrics::instance(observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}
