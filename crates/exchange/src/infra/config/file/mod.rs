pub use load::{from_toml, load};
use {
    crate::domain::Currency,
    rust_decimal::Decimal,
    serde::Deserialize,
    std::{collections::HashMap, time::Duration},
    url::Url,
};

mod load;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Config {
    /// Currency bids are normalised to when the request doesn't name one.
    #[serde(default = "default_currency")]
    currency: Currency,

    /// Timeout of auctions whose request carries none.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    default_timeout: Duration,

    /// Upper bound for timeouts requested by callers.
    #[serde(with = "humantime_serde", default = "max_timeout")]
    max_timeout: Duration,

    /// Maximum size of an adapter response in bytes.
    #[serde(default = "default_response_size_limit")]
    response_size_limit: usize,

    #[serde(rename = "adapter", default)]
    adapters: Vec<AdapterConfig>,

    #[serde(rename = "currency-rate", default)]
    rates: Vec<RateConfig>,

    #[serde(default)]
    hooks: HooksConfig,
}

fn default_currency() -> Currency {
    Currency::usd()
}

fn default_timeout() -> Duration {
    Duration::from_millis(200)
}

fn max_timeout() -> Duration {
    Duration::from_millis(1000)
}

fn default_response_size_limit() -> usize {
    1024 * 1024
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AdapterConfig {
    name: String,

    #[serde(default)]
    kind: AdapterKind,

    endpoint: Url,

    /// Caps the time this adapter gets below the auction deadline.
    #[serde(with = "humantime_serde", default)]
    timeout: Option<Duration>,

    /// Multiplier applied to the adapter's prices before ranking.
    #[serde(default = "default_bid_adjustment")]
    bid_adjustment: Decimal,
}

fn default_bid_adjustment() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum AdapterKind {
    /// See [`crate::infra::adapter::Generic`].
    #[default]
    Generic,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RateConfig {
    from: Currency,
    to: Currency,
    rate: Decimal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct HooksConfig {
    #[serde(default)]
    host: PlanConfig,
    #[serde(default)]
    default_account: PlanConfig,
    #[serde(default)]
    account: HashMap<String, PlanConfig>,
}

/// Keyed by endpoint.
type PlanConfig = HashMap<String, EndpointConfig>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct EndpointConfig {
    #[serde(default)]
    entrypoint: Vec<GroupConfig>,
    #[serde(default)]
    raw_auction_request: Vec<GroupConfig>,
    #[serde(default)]
    raw_bidder_response: Vec<GroupConfig>,
    #[serde(default)]
    all_processed_bid_responses: Vec<GroupConfig>,
    #[serde(default)]
    auction_response: Vec<GroupConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct GroupConfig {
    #[serde(with = "humantime_serde")]
    timeout: Duration,
    hooks: Vec<HookConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct HookConfig {
    module: String,
    hook: String,
}
