// Foxscream Logging
// Installs the tracing subscriber used by the command-line front end

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Environment variable read for the log filter, before `RUST_LOG`
pub const LOG_ENV: &str = "FOXSCREAM_LOG";

/// Initialize tracing once per process. `force_filter` overrides the
/// environment (used by `--trace`); otherwise nothing is installed unless
/// `FOXSCREAM_LOG` or `RUST_LOG` is set.
pub fn init_tracing(force_filter: Option<&str>) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match force_filter {
            Some(directives) => EnvFilter::new(directives),
            None => match std::env::var(LOG_ENV).or_else(|_| std::env::var("RUST_LOG")) {
                Ok(directives) => EnvFilter::new(directives),
                Err(_) => return,
            },
        };

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
