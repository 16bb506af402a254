//! Reverse DCF - growth-fade valuation service.
//!
//! Serves intrinsic PE and overvaluation scores over HTTP, fetching company
//! fundamentals from Screener on demand.

use anyhow::Result;
use rdcf_common::config::{config_path, Config};
use rdcf_common::logging::init_logging_with_exclusions;
use rdcf_valuation::ValuationService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    let config = Config::load_and_validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Reverse DCF v{}", env!("CARGO_PKG_VERSION"));
    let path = config_path();
    if !path.exists() {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
    }
    tracing::info!(
        endpoint = %config.service_endpoint(),
        market_data = %config.market_data.base_url,
        terminal_discounting = ?config.valuation.terminal_discounting,
        "Configuration loaded"
    );

    let service = ValuationService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
