use {
    crate::{
        domain::{
            AuctionRequest,
            Exchange,
            auction,
            currency::RateTable,
            hooks::{PlanStore, Repository},
        },
        infra::{
            self,
            adapter::{self, Registry},
            cli,
            config,
            observe,
            transport,
        },
    },
    anyhow::Context,
    clap::Parser,
    std::{path::Path, sync::Arc},
    tokio::io::AsyncReadExt,
};

pub async fn start(args: impl Iterator<Item = String>) {
    let args = cli::Args::parse_from(args);
    observe::init(&args.log, args.stderr_threshold, args.use_json_logs);
    tracing::info!("running exchange with {args:#?}");
    if let Err(err) = run(&args).await {
        tracing::error!(?err, "exchange failed");
        std::process::exit(1);
    }
    if args.print_metrics {
        eprintln!(
            "{}",
            ::observe::metrics::encode(::observe::metrics::get_registry())
        );
    }
}

async fn run(args: &cli::Args) -> anyhow::Result<()> {
    let config = config::file::load(&args.config).await?;
    observe::config(&config);
    let exchange = exchange(&config)?;

    let request = read_request(&args.request).await?;
    let result = exchange.run_auction(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Assembles an exchange from its configuration. The binary ships no hook
/// modules, so every hook named in the plans is skipped.
pub fn exchange(config: &infra::Config) -> anyhow::Result<Exchange> {
    let registry = config
        .adapters
        .iter()
        .fold(Registry::default(), |registry, adapter| {
            registry.with(
                adapter.name.clone(),
                Arc::new(adapter::Generic::new(
                    adapter.name.clone(),
                    adapter.endpoint.clone(),
                )),
                adapter::Settings {
                    timeout: adapter.timeout,
                    bid_adjustment: adapter.bid_adjustment,
                },
            )
        });
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let rates = RateTable::new(
        config
            .rates
            .iter()
            .map(|rate| (rate.from.clone(), rate.to.clone(), rate.rate)),
    );

    Ok(Exchange::new(
        Arc::new(registry),
        Arc::new(transport::Http::new(client, config.response_size_limit)),
        Arc::new(Repository::default()),
        Arc::new(PlanStore::new(config.plans.clone())),
        Arc::new(rates),
        auction::Settings {
            currency: config.currency.clone(),
            default_timeout: config.default_timeout,
            max_timeout: config.max_timeout,
        },
    ))
}

async fn read_request(path: &Path) -> anyhow::Result<AuctionRequest> {
    let data = if path == Path::new("-") {
        let mut data = String::new();
        tokio::io::stdin()
            .read_to_string(&mut data)
            .await
            .context("failed to read request from stdin")?;
        data
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("I/O error while reading {path:?}"))?
    };
    serde_json::from_str(&data).context("malformed auction request")
}
