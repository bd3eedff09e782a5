//! Tracing setup for the `kfrag` binary
//!
//! Logs go to stderr so stdout stays clean for reports and JSON output.
//! `RUST_LOG` takes precedence over the verbosity flag.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive for a given `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "kfrag=info,kconfig_fragments=info",
        1 => "kfrag=debug,kconfig_fragments=debug",
        _ => "kfrag=trace,kconfig_fragments=trace",
    }
}

/// Install the global subscriber. Calling this twice is harmless.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(verbosity).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
