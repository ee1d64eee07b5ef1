use {
    super::{EndpointConfig, PlanConfig},
    crate::{
        domain::hooks::{ExecutionPlan, Group, HookId, Plans, Stage},
        infra::{self, config::file},
    },
    anyhow::{Context, ensure},
    itertools::Itertools,
    std::path::Path,
    tokio::fs,
};

/// Load the exchange configuration from a TOML file.
pub async fn load(path: &Path) -> anyhow::Result<infra::Config> {
    let data = fs::read_to_string(path)
        .await
        .with_context(|| format!("I/O error while reading {path:?}"))?;
    from_toml(&data).with_context(|| format!("invalid configuration in {path:?}"))
}

/// Parses and validates a configuration document.
pub fn from_toml(data: &str) -> anyhow::Result<infra::Config> {
    let config: file::Config = toml::de::from_str(data).context("TOML syntax error")?;

    ensure!(
        !config.default_timeout.is_zero(),
        "default-timeout must be positive"
    );
    ensure!(
        config.default_timeout <= config.max_timeout,
        "default-timeout must not exceed max-timeout"
    );
    if let Some(name) = config.adapters.iter().map(|a| &a.name).duplicates().next() {
        anyhow::bail!("adapter {name} is configured more than once");
    }

    let adapters = config
        .adapters
        .into_iter()
        .map(|adapter| {
            ensure!(
                !adapter.bid_adjustment.is_sign_negative(),
                "bid-adjustment of adapter {} must not be negative",
                adapter.name
            );
            let file::AdapterKind::Generic = adapter.kind;
            Ok(infra::config::Adapter {
                name: adapter.name.into(),
                endpoint: adapter.endpoint,
                timeout: adapter.timeout,
                bid_adjustment: adapter.bid_adjustment,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let rates = config
        .rates
        .into_iter()
        .map(|rate| {
            ensure!(
                rate.rate > rust_decimal::Decimal::ZERO,
                "rate {} -> {} must be positive",
                rate.from,
                rate.to
            );
            Ok(infra::config::Rate {
                from: rate.from,
                to: rate.to,
                rate: rate.rate,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let plans = Plans {
        host: plan(config.hooks.host).context("hooks.host")?,
        default_account: plan(config.hooks.default_account).context("hooks.default-account")?,
        accounts: config
            .hooks
            .account
            .into_iter()
            .map(|(account, config)| {
                let plan = plan(config).with_context(|| format!("hooks.account.{account}"))?;
                Ok((account, plan))
            })
            .collect::<anyhow::Result<_>>()?,
    };

    Ok(infra::Config {
        currency: config.currency,
        default_timeout: config.default_timeout,
        max_timeout: config.max_timeout,
        response_size_limit: config.response_size_limit,
        adapters,
        rates,
        plans,
    })
}

fn plan(config: PlanConfig) -> anyhow::Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::default();
    for (endpoint, stages) in config {
        let EndpointConfig {
            entrypoint,
            raw_auction_request,
            raw_bidder_response,
            all_processed_bid_responses,
            auction_response,
        } = stages;
        let stages = [
            (Stage::Entrypoint, entrypoint),
            (Stage::RawAuctionRequest, raw_auction_request),
            (Stage::RawBidderResponse, raw_bidder_response),
            (Stage::AllProcessedBidResponses, all_processed_bid_responses),
            (Stage::AuctionResponse, auction_response),
        ];
        for (stage, groups) in stages {
            for group in groups {
                ensure!(
                    !group.timeout.is_zero(),
                    "group timeout at {endpoint} {stage} must be positive"
                );
                plan = plan.with_group(
                    endpoint.as_str(),
                    stage,
                    Group {
                        timeout: group.timeout,
                        hooks: group
                            .hooks
                            .into_iter()
                            .map(|hook| HookId::new(hook.module, hook.hook))
                            .collect(),
                    },
                );
            }
        }
    }
    Ok(plan)
}
