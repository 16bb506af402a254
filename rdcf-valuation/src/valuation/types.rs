//! Valuation types.
//!
//! Inputs, the year-by-year projection ledger, and the results produced by
//! the growth-fade engine and the overvaluation scorer.

pub use rdcf_common::config::MAX_HORIZON_YEARS;
use rdcf_common::config::ValuationDefaultsConfig;
use serde::{Deserialize, Serialize};

use super::error::ValuationError;

/// Corporate tax rate applied to pre-tax return on capital.
pub const TAX_RATE: f64 = 0.25;

/// Normalization base for invested capital. Outputs are ratios, so only
/// consistency matters.
pub const STARTING_NORMALIZED_CAPITAL: f64 = 100.0;

// ============================================================================
// Input Types
// ============================================================================

/// Validated model inputs, all rates as fractions (0.12 = 12%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Discount rate
    pub cost_of_capital: f64,
    /// Pre-tax return on capital employed
    pub pre_tax_return_on_capital: f64,
    /// Growth during the high-growth phase
    pub explicit_growth_rate: f64,
    /// Length of the high-growth phase
    pub explicit_growth_years: u32,
    /// Years over which growth moves linearly to the terminal rate
    pub fade_period_years: u32,
    /// Perpetual growth after the fade phase
    pub terminal_growth_rate: f64,
}

impl ValuationConfig {
    /// Post-tax return on capital.
    pub fn post_tax_return_on_capital(&self) -> f64 {
        self.pre_tax_return_on_capital * (1.0 - TAX_RATE)
    }

    /// Total number of projected years after the seed year.
    ///
    /// Saturates on overflow; `validate` rejects such configurations.
    pub fn horizon_years(&self) -> u32 {
        self.explicit_growth_years
            .saturating_add(self.fade_period_years)
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ValuationError> {
        let rates = [
            ("cost_of_capital", self.cost_of_capital),
            ("pre_tax_return_on_capital", self.pre_tax_return_on_capital),
            ("explicit_growth_rate", self.explicit_growth_rate),
            ("terminal_growth_rate", self.terminal_growth_rate),
        ];
        for (field, value) in rates {
            if !value.is_finite() {
                return Err(ValuationError::invalid(field, "must be a finite number"));
            }
        }

        if self.cost_of_capital <= 0.0 {
            return Err(ValuationError::invalid(
                "cost_of_capital",
                format!("must be greater than 0 (got {})", self.cost_of_capital),
            ));
        }

        if self.post_tax_return_on_capital() <= 0.0 {
            return Err(ValuationError::invalid(
                "pre_tax_return_on_capital",
                format!(
                    "must give a positive post-tax return (got {})",
                    self.pre_tax_return_on_capital
                ),
            ));
        }

        if self.explicit_growth_years == 0 {
            return Err(ValuationError::invalid(
                "explicit_growth_years",
                "must be at least 1",
            ));
        }

        if self.fade_period_years == 0 {
            return Err(ValuationError::invalid("fade_period_years", "must be at least 1"));
        }

        match self
            .explicit_growth_years
            .checked_add(self.fade_period_years)
        {
            Some(horizon) if horizon <= MAX_HORIZON_YEARS => {}
            _ => {
                let field = if self.explicit_growth_years > self.fade_period_years {
                    "explicit_growth_years"
                } else {
                    "fade_period_years"
                };
                return Err(ValuationError::invalid(
                    field,
                    format!(
                        "explicit_growth_years + fade_period_years must not exceed {} (got {} + {})",
                        MAX_HORIZON_YEARS, self.explicit_growth_years, self.fade_period_years
                    ),
                ));
            }
        }

        if self.cost_of_capital <= self.terminal_growth_rate {
            return Err(ValuationError::invalid(
                "terminal_growth_rate",
                format!(
                    "must be below cost_of_capital ({} >= {})",
                    self.terminal_growth_rate, self.cost_of_capital
                ),
            ));
        }

        Ok(())
    }
}

/// User-facing parameters, rates in percent (12.0 = 12%).
///
/// Missing fields deserialize to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationParams {
    pub cost_of_capital_pct: f64,
    pub pre_tax_roce_pct: f64,
    pub explicit_growth_pct: f64,
    pub explicit_growth_years: u32,
    pub fade_period_years: u32,
    pub terminal_growth_pct: f64,
}

impl ValuationParams {
    /// Normalize percentages to fractions.
    pub fn to_config(&self) -> ValuationConfig {
        ValuationConfig {
            cost_of_capital: self.cost_of_capital_pct / 100.0,
            pre_tax_return_on_capital: self.pre_tax_roce_pct / 100.0,
            explicit_growth_rate: self.explicit_growth_pct / 100.0,
            explicit_growth_years: self.explicit_growth_years,
            fade_period_years: self.fade_period_years,
            terminal_growth_rate: self.terminal_growth_pct / 100.0,
        }
    }

    /// Describe every parameter outside the range the input form offers.
    ///
    /// These are advisory; the engine evaluates any configuration that
    /// passes [`ValuationConfig::validate`].
    pub fn range_warnings(&self) -> Vec<String> {
        let values = [
            self.cost_of_capital_pct,
            self.pre_tax_roce_pct,
            self.explicit_growth_pct,
            f64::from(self.explicit_growth_years),
            f64::from(self.fade_period_years),
            self.terminal_growth_pct,
        ];

        PARAMETER_RANGES
            .iter()
            .zip(values)
            .filter(|(range, value)| !range.contains(*value))
            .map(|(range, value)| {
                format!(
                    "{} = {} is outside the usual range {}-{}",
                    range.field, value, range.min, range.max
                )
            })
            .collect()
    }
}

impl From<&ValuationDefaultsConfig> for ValuationParams {
    fn from(defaults: &ValuationDefaultsConfig) -> Self {
        Self {
            cost_of_capital_pct: defaults.cost_of_capital_pct,
            pre_tax_roce_pct: defaults.pre_tax_roce_pct,
            explicit_growth_pct: defaults.explicit_growth_pct,
            explicit_growth_years: defaults.explicit_growth_years,
            fade_period_years: defaults.fade_period_years,
            terminal_growth_pct: defaults.terminal_growth_pct,
        }
    }
}

impl Default for ValuationParams {
    fn default() -> Self {
        Self::from(&ValuationDefaultsConfig::default())
    }
}

/// Range offered for one input parameter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParameterRange {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParameterRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Input ranges, in the same order as the fields of [`ValuationParams`].
pub const PARAMETER_RANGES: [ParameterRange; 6] = [
    ParameterRange { field: "cost_of_capital_pct", min: 8.0, max: 16.0, step: 0.5 },
    ParameterRange { field: "pre_tax_roce_pct", min: 10.0, max: 100.0, step: 5.0 },
    ParameterRange { field: "explicit_growth_pct", min: 8.0, max: 20.0, step: 1.0 },
    ParameterRange { field: "explicit_growth_years", min: 10.0, max: 25.0, step: 1.0 },
    // Fixed at 15 in the input form
    ParameterRange { field: "fade_period_years", min: 15.0, max: 15.0, step: 5.0 },
    ParameterRange { field: "terminal_growth_pct", min: 0.0, max: 7.5, step: 0.5 },
];

// ============================================================================
// Projection Ledger
// ============================================================================

/// Phase a projected year belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionPhase {
    /// Year 0: establishes starting NOPAT and the first investment
    Seed,
    /// Constant high growth
    Explicit,
    /// Growth moving linearly toward the terminal rate
    Fade,
}

impl std::fmt::Display for ProjectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seed => write!(f, "seed"),
            Self::Explicit => write!(f, "explicit"),
            Self::Fade => write!(f, "fade"),
        }
    }
}

/// One simulated year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionYear {
    /// Year index, 0 for the seed year
    pub year: u32,
    pub phase: ProjectionPhase,
    /// Net operating profit after tax
    pub nopat: f64,
    /// Realized growth (explicit phase) or targeted growth (seed and fade)
    pub growth_rate: f64,
    /// Fraction of NOPAT reinvested
    pub reinvestment_rate: f64,
    pub investment: f64,
    pub free_cash_flow: f64,
    /// Invested capital carried into the next year
    pub capital_ending_balance: f64,
    pub discount_factor: f64,
    /// Present value added to the running total.
    /// Zero for the seed year, which is not part of the valuation.
    pub discounted_free_cash_flow: f64,
}

/// Growing-perpetuity value beyond the projection horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalValue {
    pub nopat: f64,
    pub reinvestment: f64,
    pub free_cash_flow: f64,
    pub discount_factor: f64,
    pub discounted_value: f64,
}

/// The full projection behind one valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Seed year followed by explicit and fade years, in order
    pub years: Vec<ProjectionYear>,
    pub terminal: TerminalValue,
    /// Sum of explicit-phase discounted cash flows
    pub explicit_discounted_sum: f64,
    /// Sum of fade-phase discounted cash flows
    pub fade_discounted_sum: f64,
}

impl Projection {
    /// The seed year.
    pub fn seed(&self) -> Option<&ProjectionYear> {
        self.years.first().filter(|y| y.phase == ProjectionPhase::Seed)
    }

    /// Years of the given phase, in order.
    pub fn phase(&self, phase: ProjectionPhase) -> impl Iterator<Item = &ProjectionYear> {
        self.years.iter().filter(move |y| y.phase == phase)
    }

    /// Final projected year, the base of the terminal value.
    pub fn last_year(&self) -> Option<&ProjectionYear> {
        self.years.last()
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Output of the growth-fade engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// Total discounted value divided by seed-year NOPAT
    pub intrinsic_pe: f64,
    /// Explicit + fade cash flows + terminal value, all discounted
    pub total_discounted_value: f64,
    pub seed_nopat: f64,
    pub projection: Projection,
}

impl ValuationResult {
    /// Intrinsic PE rounded to two decimals for display.
    pub fn display_pe(&self) -> f64 {
        (self.intrinsic_pe * 100.0).round() / 100.0
    }
}

/// Which observed multiple served as the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMultiple {
    Current,
    Forward,
}

impl std::fmt::Display for ReferenceMultiple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current PE"),
            Self::Forward => write!(f, "forward PE"),
        }
    }
}

/// Output of the overvaluation scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvervaluationResult {
    /// Negative values mean undervalued
    pub percent_overvalued: f64,
    pub reference_multiple: f64,
    pub reference: ReferenceMultiple,
}

impl OvervaluationResult {
    /// Percentage truncated toward zero, as the original form displays it.
    pub fn truncated_percent(&self) -> i64 {
        self.percent_overvalued.trunc() as i64
    }

    pub fn is_overvalued(&self) -> bool {
        self.percent_overvalued > 0.0
    }
}

// ============================================================================
// Tests
// ============================================================================
