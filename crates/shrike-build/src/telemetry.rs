//! Subscriber setup for the `shrike` command.
//!
//! The process-wide subscriber is installed at most once; a second
//! [`init_tracing`] call leaves the first one in place.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`. With `json` set, each event is
/// one JSON object per line; plan and activation output on stdout is left
/// untouched either way.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
