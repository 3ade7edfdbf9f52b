use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that turns on log output in tests.
const ENABLE_TEST_TRACING_ENV: &str = "ENABLE_TRACING";

static TEST_TRACING: Once = Once::new();

/// Installs the global subscriber for a service.
///
/// `RUST_LOG` wins when set; otherwise `{service_name}=info` is used.
pub fn init_tracing(service_name: &str) {
    let default_filter = format!("{}=info", service_name.replace('-', "_"));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer())
        .init();
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV).is_err() {
            return;
        }

        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
