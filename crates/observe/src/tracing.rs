use {
    std::{io::IsTerminal, panic::PanicHookInfo, sync::Once},
    time::macros::format_description,
    tracing::{Level, Metadata},
    tracing_subscriber::{
        EnvFilter,
        Layer,
        Registry,
        fmt::{time::UtcTime, writer::MakeWriterExt as _},
        prelude::*,
    },
};

/// Initializes the logging setup that is shared between the binaries.
/// `env_filter` has similar syntax to env_logger. It is documented at
/// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
///
/// Events at `stderr_threshold` or more severe are written to stderr, all
/// others to stdout. Without a threshold everything goes to stdout.
pub fn initialize(env_filter: &str, stderr_threshold: Option<Level>, use_json: bool) {
    if let Err(err) = tracing_subscriber::registry()
        .with(fmt_layer(env_filter, stderr_threshold, use_json))
        .try_init()
    {
        eprintln!("failed to install tracing subscriber: {err}");
        return;
    }
    std::panic::set_hook(Box::new(tracing_panic_hook));
    tracing::info!(%env_filter, use_json, "initialized logging");
}

/// Like [`initialize`], but can be called multiple times in a row. Later calls
/// are ignored.
///
/// Useful for tests.
pub fn initialize_reentrant(env_filter: &str) {
    // The subscriber is a global object, installing a second one from another
    // test thread would fail.
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(fmt_layer(env_filter, Some(Level::ERROR), false))
            .try_init();
        std::panic::set_hook(Box::new(tracing_panic_hook));
    });
}

fn fmt_layer(
    env_filter: &str,
    stderr_threshold: Option<Level>,
    use_json: bool,
) -> Box<dyn Layer<Registry> + Send + Sync> {
    let writer = std::io::stderr
        .with_filter(move |meta: &Metadata<'_>| {
            stderr_threshold.is_some_and(|threshold| *meta.level() <= threshold)
        })
        .or_else(std::io::stdout);
    let timer = UtcTime::new(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ));
    let filter = EnvFilter::new(env_filter);

    if use_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .with_timer(timer)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_timer(timer)
            .with_ansi(std::io::stdout().is_terminal())
            .with_filter(filter)
            .boxed()
    }
}

/// Panic hook that prints roughly the same message as the default panic hook
/// but uses `tracing::error!` instead of stderr, so panics keep the log format.
fn tracing_panic_hook(panic: &PanicHookInfo) {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("<unnamed>");
    let backtrace = std::backtrace::Backtrace::capture();
    tracing::error!("thread '{name}' {panic}\nstack backtrace:\n{backtrace}");
}
