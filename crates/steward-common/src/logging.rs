//! Structured logging setup.
//!
//! Output format follows `LOG_FORMAT`: `json` for log aggregation, anything
//! else for human-readable development output. Level filtering follows the
//! standard `RUST_LOG` variable (default `info`), e.g.
//! `RUST_LOG=steward_election=debug`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber for the given service.
///
/// Call once at process start, before any election engine is spawned.
pub fn init_logging(service_name: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_ansi(true))
            .init();
    }

    tracing::debug!(service = service_name, "logging initialized");
}
