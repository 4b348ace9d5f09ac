//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! LOG_LEVEL takes a filter ("debug", or full directives such as
//! "info,tutor=debug,tutor_backend=debug"); LOG_FORMAT switches between the
//! default pretty output and "json" structured logs. Targets plus file/line
//! are included so the per-module targets ("tutor", "tutor_backend") stay
//! distinguishable next to the tower-http request spans.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str =
    "info,tutor=debug,tutor_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The builder types diverge per format, so finish inside each arm.
    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
