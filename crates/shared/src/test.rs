//! # test
//! Logging for integration tests
//!

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, registry, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Set a global trace level logger that writes through the test harness capture.
///
/// Safe to call from every test; only the first call installs the logger.
pub fn init_test_logger() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::filter::Targets::new().with_default(Level::TRACE);

        let layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_ansi(true)
            .with_target(false);

        // Another test binary harness may already own the global default.
        let _ = registry().with(layer).with(filter).try_init();
    });
}
