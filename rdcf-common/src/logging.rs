//! Logging utilities.
//!
//! Structured logging via `tracing-subscriber`, JSON or pretty.
//!
//! # Noise Filtering
//!
//! Noisy library modules (hyper, reqwest, h2, rustls, ...) are pinned to `warn`
//! so that business logs stay readable at the configured level.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Modules filtered to warn level by default.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tokio_util",
    "tower_http",
    "html5ever",
    "selectors",
];

/// Build filter directives: base level plus `module=warn` for each noisy module.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);

    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }

    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }

    directives
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - "json" for structured JSON, anything else for human-readable
///
/// `RUST_LOG` overrides the computed filter when set.
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Initialize logging with additional excluded targets.
///
/// Like [`init_logging`], but pins the given modules to `warn` as well.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let directives = build_directives(log_level, excluded_targets);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len() + excluded_targets.len(),
        "Logging initialized"
    );
}

/// Generate a new trace ID for request tracing.
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_include_noisy_modules() {
        let directives = build_directives("debug", &[]);
        assert!(directives.starts_with("debug"));
        assert!(directives.contains("hyper=warn"));
        assert!(directives.contains("reqwest=warn"));
        assert_eq!(directives.matches("=warn").count(), NOISY_MODULES.len());
    }

    #[test]
    fn test_directives_include_custom_exclusions() {
        let directives = build_directives("info", &["rdcf_valuation::data".to_string()]);
        assert!(directives.ends_with("rdcf_valuation::data=warn"));
    }

    #[test]
    fn test_directives_parse_as_filter() {
        let directives = build_directives("info", &["custom".to_string()]);
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let a = generate_trace_id();
        let b = generate_trace_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("info", "pretty");
        init_logging("debug", "json");
    }
}
