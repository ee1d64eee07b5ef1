use std::{collections::HashMap, sync::OnceLock};

/// Global metrics registry used by all components.
static REGISTRY: OnceLock<prometheus_metric_storage::StorageRegistry> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid registry configuration: {0}")]
    Invalid(#[from] prometheus::Error),
    #[error("the metrics registry was already initialized")]
    AlreadyInitialized,
}

/// Configures the global metrics registry.
///
/// Allows specifying a common prefix that is added to all metric names as
/// well as common labels. Must happen before the first call to
/// [`get_storage_registry`], ideally at the very beginning of `main`,
/// otherwise the registry was already initialized with defaults.
pub fn setup_registry(
    prefix: Option<String>,
    labels: Option<HashMap<String, String>>,
) -> Result<(), SetupError> {
    let registry = prometheus::Registry::new_custom(prefix, labels)?;
    REGISTRY
        .set(prometheus_metric_storage::StorageRegistry::new(registry))
        .map_err(|_| SetupError::AlreadyInitialized)
}

/// Like [`setup_registry`], but can be called multiple times in a row.
/// Later calls and invalid configurations are ignored.
///
/// Useful for tests.
pub fn setup_registry_reentrant(prefix: Option<String>, labels: Option<HashMap<String, String>>) {
    let _ = setup_registry(prefix, labels);
}

/// Get the global instance of the metrics registry.
pub fn get_registry() -> &'static prometheus::Registry {
    get_storage_registry().registry()
}

/// Get the global instance of the metric storage registry.
///
/// Falls back to a default registry when [`setup_registry`] was never called
/// so unit tests don't have to set it up before touching any metric.
pub fn get_storage_registry() -> &'static prometheus_metric_storage::StorageRegistry {
    REGISTRY.get_or_init(prometheus_metric_storage::StorageRegistry::default)
}

/// Renders all metrics of `registry` in the prometheus text format.
pub fn encode(registry: &prometheus::Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    match encoder.encode_to_string(&registry.gather()) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(?err, "failed to encode metrics");
            String::new()
        }
    }
}
