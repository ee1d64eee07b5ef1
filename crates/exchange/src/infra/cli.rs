use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The log filter.
    #[clap(long, env, default_value = "warn,exchange=debug")]
    pub log: String,

    /// At which log level logs should be printed to stderr instead of stdout.
    #[clap(long, env)]
    pub stderr_threshold: Option<tracing::Level>,

    /// Whether to use JSON format for the logs.
    #[clap(long, env, default_value = "false")]
    pub use_json_logs: bool,

    /// Path to the exchange configuration file. This file should be in TOML
    /// format. For an example see `crates/exchange/example.toml`.
    #[clap(long, env)]
    pub config: PathBuf,

    /// Path to a JSON auction request. `-` reads the request from stdin.
    #[clap(long, env, default_value = "-")]
    pub request: PathBuf,

    /// Print the metrics collected during the auction to stderr when done.
    #[clap(long, env, default_value = "false")]
    pub print_metrics: bool,
}
