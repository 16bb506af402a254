//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait that fundamentals sources implement,
//! so the valuation service never depends on a concrete scraper.

use async_trait::async_trait;
use std::fmt;

use super::MarketSnapshot;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to market data providers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network error (connection failed, timeout, upstream 5xx)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// No company page exists for the requested symbol
    NotFound(String),
    /// The page could not be interpreted
    Parse(String),
    /// A field required by the valuation is blank or absent
    MissingField { field: String },
    /// Invalid request parameters
    InvalidRequest(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::NotFound(symbol) => write!(f, "Symbol not found: {}", symbol),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
            Self::MissingField { field } => write!(f, "Missing field: {}", field),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Source of per-company fundamentals.
///
/// Implementations must report blank or absent numbers as
/// `ProviderError::MissingField` rather than substituting a default.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name (e.g., "screener")
    fn name(&self) -> &'static str;

    /// Fetch a fundamentals snapshot for a ticker symbol.
    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot, ProviderError>;
}

/// Normalize a user-supplied ticker: trimmed, upper-case, URL-safe.
pub fn normalize_symbol(symbol: &str) -> Result<String, ProviderError> {
    let symbol = symbol.trim().to_uppercase();

    if symbol.is_empty() {
        return Err(ProviderError::InvalidRequest("symbol is empty".into()));
    }

    if let Some(c) = symbol
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '&' | '-' | '_')))
    {
        return Err(ProviderError::InvalidRequest(format!(
            "symbol {:?} contains invalid character {:?}",
            symbol, c
        )));
    }

    Ok(symbol)
}
