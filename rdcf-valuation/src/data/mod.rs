//! Market data module.
//!
//! Fetches the per-company fundamentals the valuation needs: observed PE
//! multiples, historical RoCE and compounded growth figures.
//!
//! # Data Sources
//! - **Screener** (`ScreenerAdapter`): company pages at screener.in, consolidated
//!   statements first, standalone as fallback

mod parser;
mod provider;
mod screener;

pub use parser::{parse_company_page, AnnualFigure, CompanyPage};
pub use provider::{normalize_symbol, MarketDataProvider, ProviderError};
pub use screener::ScreenerAdapter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// Which set of financial statements a snapshot was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementBasis {
    Consolidated,
    Standalone,
}

impl StatementBasis {
    /// Path segment appended to the company URL.
    pub fn path_suffix(&self) -> &'static str {
        match self {
            Self::Consolidated => "consolidated/",
            Self::Standalone => "",
        }
    }
}

impl std::fmt::Display for StatementBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Consolidated => write!(f, "consolidated"),
            Self::Standalone => write!(f, "standalone"),
        }
    }
}

/// One labelled compounded-growth figure, e.g. ("5 Years", 12.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthPeriod {
    pub label: String,
    /// Percent; `None` when the page leaves the cell blank
    pub percent: Option<f64>,
}

/// Fundamentals for one company at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Normalized ticker the snapshot was requested for
    pub symbol: String,
    pub company_name: Option<String>,
    /// Exchange listing code shown on the page (NSE preferred, else BSE)
    pub exchange_symbol: Option<String>,
    pub basis: StatementBasis,
    /// Price over trailing earnings
    pub current_pe: f64,
    /// Market cap over the latest full-year net profit, one decimal
    pub forward_pe: f64,
    /// Market capitalisation (crore)
    pub market_cap: f64,
    /// Latest full-year net profit (crore)
    pub latest_annual_net_profit: f64,
    /// Column header of that year, e.g. "Mar 2024"
    pub latest_fiscal_year: String,
    /// Median of the last five yearly pre-tax RoCE values, percent
    pub historical_roce: f64,
    /// Yearly pre-tax RoCE values, oldest first
    pub roce_history: Vec<f64>,
    pub sales_growth: Vec<GrowthPeriod>,
    pub profit_growth: Vec<GrowthPeriod>,
    pub fetched_at: DateTime<Utc>,
}
