//! Tracing setup for the CLI.
//!
//! Reads `RUST_LOG`, defaults to `info`. Logs go to stderr so that stdout
//! stays reserved for reports (`--json` included).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
