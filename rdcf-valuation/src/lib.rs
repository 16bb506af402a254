//! Reverse DCF Valuation Library
//!
//! Answers "what PE is this business worth?" with a growth-fade discounted
//! cash flow model, and compares the answer with the multiples the market
//! is paying.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   rdcf-valuation (Rust Service)                     │
//! │                           :4440                                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  Market Data    │  │  Growth-Fade    │  │  Overvaluation  │     │
//! │  │  (Screener)     │  │  Engine         │  │  Scorer         │     │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Growth-Fade Model
//! - **Explicit**: NOPAT grows at a constant rate, funded by reinvestment
//! - **Fade**: growth declines linearly to the terminal rate
//! - **Terminal**: growing perpetuity beyond the horizon
//!
//! ## Overvaluation
//! - The lower of current and forward PE is compared with the intrinsic PE
//! - A positive percentage means the market pays more than the model justifies

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod error;
pub mod routes;
pub mod valuation;

pub use error::ServiceError;
pub use routes::build_router;

use anyhow::{Context, Result};
use rdcf_common::config::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::data::{MarketDataProvider, ScreenerAdapter};
use crate::valuation::{
    EngineOptions, GrowthFadeValuationEngine, OvervaluationScorer, ValuationParams,
};

/// Valuation service state
pub struct ValuationState {
    /// Configuration
    pub config: Config,
    /// Growth-fade engine configured from `config.valuation`
    pub engine: GrowthFadeValuationEngine,
    /// Overvaluation scorer
    pub scorer: OvervaluationScorer,
    /// Fundamentals source
    pub provider: Arc<dyn MarketDataProvider>,
}

impl ValuationState {
    /// Create a state backed by the Screener adapter
    pub fn new(config: Config) -> Self {
        let provider = Arc::new(ScreenerAdapter::from_config(&config.market_data));
        Self::with_provider(config, provider)
    }

    /// Create a state with an explicit fundamentals source
    pub fn with_provider(config: Config, provider: Arc<dyn MarketDataProvider>) -> Self {
        let engine =
            GrowthFadeValuationEngine::with_options(EngineOptions::from(&config.valuation));

        Self {
            config,
            engine,
            scorer: OvervaluationScorer::new(),
            provider,
        }
    }

    /// Parameters used for fields a request leaves out
    pub fn default_params(&self) -> ValuationParams {
        ValuationParams::from(&self.config.valuation)
    }
}

/// Main valuation service
pub struct ValuationService {
    state: Arc<ValuationState>,
}

impl ValuationService {
    /// Create a new valuation service
    pub fn new(config: Config) -> Self {
        let state = Arc::new(ValuationState::new(config));
        Self { state }
    }

    /// Start the HTTP server
    pub async fn start(self) -> Result<()> {
        let host = self.state.config.bind_address().to_string();
        let port = self.state.config.service_port();

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = build_router(self.state.clone()).layer(cors);

        let listener = tokio::net::TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", host, port))?;

        tracing::info!(
            address = %listener.local_addr()?,
            provider = self.state.provider.name(),
            "Starting HTTP server"
        );

        axum::serve(listener, app).await?;

        Ok(())
    }
}
