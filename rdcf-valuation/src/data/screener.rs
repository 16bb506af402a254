//! Screener (screener.in) adapter for Indian equity fundamentals.
//!
//! # Pages
//! - `/company/{SYMBOL}/consolidated/`: consolidated statements (tried first)
//! - `/company/{SYMBOL}/`: standalone statements, used when the consolidated
//!   page shows no P/E or does not exist
//!
//! # Rate Limits
//! Screener answers bursts with HTTP 429. Recoverable failures are retried
//! with linear backoff up to `max_retries` times.

use async_trait::async_trait;
use rdcf_common::config::MarketDataConfig;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::parser::{parse_company_page, CompanyPage};
use super::provider::{normalize_symbol, MarketDataProvider, ProviderError};
use super::{MarketSnapshot, StatementBasis};

// ============================================================================
// Constants
// ============================================================================

/// Retry delay after a 429 without a usable Retry-After header (seconds)
const RATE_LIMIT_RETRY_SECS: u64 = 5;

/// Upper bound on any single wait between attempts
const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);

// ============================================================================
// Adapter
// ============================================================================

/// Fundamentals provider backed by Screener company pages.
pub struct ScreenerAdapter {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_backoff: Duration,
    prefer_consolidated: bool,
}

impl ScreenerAdapter {
    /// Create an adapter against the public site with default settings.
    pub fn new() -> Self {
        Self::from_config(&MarketDataConfig::default())
    }

    /// Create from the `market_data` config section.
    pub fn from_config(config: &MarketDataConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            prefer_consolidated: config.prefer_consolidated,
        }
    }

    /// Company page URL for a normalized symbol.
    pub fn company_url(&self, symbol: &str, basis: StatementBasis) -> String {
        format!(
            "{}/company/{}/{}",
            self.base_url,
            symbol,
            basis.path_suffix()
        )
    }

    /// GET a page once, mapping HTTP failures to provider errors.
    async fn get_page(&self, symbol: &str, url: &str) -> Result<String, ProviderError> {
        debug!(url = %url, "Fetching Screener page");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Network("Request timeout".into())
            } else if e.is_connect() {
                ProviderError::Network("Connection failed".into())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(symbol.to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after.or(Some(RATE_LIMIT_RETRY_SECS)),
            });
        }

        if status.is_server_error() {
            return Err(ProviderError::Network(format!("HTTP {}", status)));
        }

        if !status.is_success() {
            return Err(ProviderError::InvalidRequest(format!(
                "HTTP {} for {}",
                status, url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response body: {}", e)))
    }

    /// GET a page, retrying recoverable failures.
    async fn get_page_with_retry(&self, symbol: &str, url: &str) -> Result<String, ProviderError> {
        let mut attempt = 0;

        loop {
            match self.get_page(symbol, url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_recoverable() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.retry_wait(&e, attempt);
                    warn!(
                        url = %url,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Screener request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn retry_wait(&self, error: &ProviderError, attempt: u32) -> Duration {
        let wait = match error {
            ProviderError::RateLimited {
                retry_after_secs: Some(secs),
            } => Duration::from_secs(*secs).max(self.retry_backoff),
            _ => self.retry_backoff * attempt,
        };
        wait.min(MAX_RETRY_WAIT)
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        basis: StatementBasis,
    ) -> Result<CompanyPage, ProviderError> {
        let url = self.company_url(symbol, basis);
        let html = self.get_page_with_retry(symbol, &url).await?;
        parse_company_page(&html)
    }
}

impl Default for ScreenerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for ScreenerAdapter {
    fn name(&self) -> &'static str {
        "screener"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot, ProviderError> {
        let symbol = normalize_symbol(symbol)?;

        if !self.prefer_consolidated {
            let page = self.fetch_page(&symbol, StatementBasis::Standalone).await?;
            return page.into_snapshot(&symbol, StatementBasis::Standalone);
        }

        match self.fetch_page(&symbol, StatementBasis::Consolidated).await {
            Ok(page) if page.current_pe.is_some() => {
                info!(symbol = %symbol, basis = "consolidated", "Fetched fundamentals");
                page.into_snapshot(&symbol, StatementBasis::Consolidated)
            }
            Ok(_) | Err(ProviderError::NotFound(_)) => {
                info!(
                    symbol = %symbol,
                    "Consolidated P/E unavailable, falling back to standalone"
                );
                let page = self.fetch_page(&symbol, StatementBasis::Standalone).await?;
                page.into_snapshot(&symbol, StatementBasis::Standalone)
            }
            Err(e) => Err(e),
        }
    }
}
