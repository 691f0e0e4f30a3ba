/*!
Logging and profiling setup for the command line entry point.

With the `profiling` feature, setting `ENABLE_PROFILING` records a Chrome
trace (`trace-<timestamp>.json`) of every `profiling` scope, viewable in
Perfetto. Without it only the `fmt` logging layer is installed.
*/

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Keeps profiling output alive; drop it to flush the trace file
pub struct LoggingGuard {
    #[cfg(feature = "profiling")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Default filter when `RUST_LOG` is not set
fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,trail_planner_lib::geometry=info"
    } else {
        "info"
    }
}

/// Initialize logging (and the chrome trace layer if profiling is enabled)
pub fn setup_logging_and_profiling() -> LoggingGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));
    let fmt_layer = fmt::layer().with_target(false).with_filter(filter);

    #[cfg(feature = "profiling")]
    {
        let (chrome_layer, guard) = if std::env::var("ENABLE_PROFILING").is_ok() {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .include_args(true)
                .build();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };
        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();
        if guard.is_some() {
            tracing::info!("ENABLE_PROFILING set - recording a chrome trace");
        }
        LoggingGuard { _chrome: guard }
    }

    #[cfg(not(feature = "profiling"))]
    {
        tracing_subscriber::registry().with(fmt_layer).init();
        LoggingGuard {}
    }
}
