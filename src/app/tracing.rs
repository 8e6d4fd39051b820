use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber.
///
/// JSON output by default; set `RUST_LOG_FORMAT=plain` for a readable
/// console format. `RUST_LOG` filters as usual, defaulting to info.
pub fn init_tracing() {
    let plain = std::env::var("RUST_LOG_FORMAT").is_ok_and(|v| v == "plain");
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    if plain {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .with(filter)
            .init();
    }
}
