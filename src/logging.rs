//! Optional subscriber setup for binaries and tests using this crate.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! caller's choice. [`init`] is a convenience for the common profiles.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Output profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output at debug level.
    Development,
    /// JSON output at info level.
    Production,
    /// Human-readable output routed through the test harness capture.
    Test,
}

static INIT: Once = Once::new();

/// Installs a global subscriber for `profile`. Only the first call has an
/// effect; `RUST_LOG` overrides the profile's default filter.
pub fn init(profile: Profile) {
    INIT.call_once(|| {
        let filter = |default: &str| {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
        };
        // try_init: another subscriber may already be installed by the host
        let _ = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter("database_storage=debug"))
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter("database_storage=info"))
                .try_init(),
            Profile::Test => tracing_subscriber::fmt()
                .with_env_filter(filter("database_storage=debug"))
                .with_test_writer()
                .try_init(),
        };
    });
}
