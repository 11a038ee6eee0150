use tracing::Level;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Initialize logging for the advisor.
///
/// `RUST_LOG` takes precedence; otherwise the crate logs at `level` and
/// everything else at `warn`. Logs go to stderr so the JSON report on stdout
/// stays machine readable.
pub fn init_logging(level: Level, json_output: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lightning_index_advisor={},warn", level)));

    if json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_timer(SystemTime)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(SystemTime)
            .with_target(false)
            .with_thread_names(false);

        let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
    }
}

/// Level used by the CLI for its `--verbose` flag.
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    }
}
