//! Growth-Fade Valuation Engine.
//!
//! Projects NOPAT on a normalized capital base of 100 through three phases:
//!
//! 1. **Explicit**: constant growth, funded by a reinvestment rate of
//!    `growth / post_tax_roc` (growth = RoCE × reinvestment rate).
//! 2. **Fade**: growth moves linearly to the terminal rate, the reinvestment
//!    rate re-derived every year from the current growth.
//! 3. **Terminal**: a growing perpetuity on the last year's NOPAT.
//!
//! The discounted free cash flows plus the discounted terminal value, divided
//! by the seed year's NOPAT, give the intrinsic PE.

use rdcf_common::config::{TerminalDiscounting, ValuationDefaultsConfig};
use tracing::debug;

use super::error::ValuationError;
use super::types::{
    Projection, ProjectionPhase, ProjectionYear, TerminalValue, ValuationConfig, ValuationResult,
    STARTING_NORMALIZED_CAPITAL,
};

/// Numeric conventions of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Round each explicit-phase discounted cash flow to 2 decimals before
    /// accumulating it. Fade and terminal terms are never rounded.
    pub round_explicit_cash_flows: bool,
    /// Period at which the terminal value is discounted.
    pub terminal_discounting: TerminalDiscounting,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            round_explicit_cash_flows: true,
            terminal_discounting: TerminalDiscounting::AtHorizon,
        }
    }
}

impl From<&ValuationDefaultsConfig> for EngineOptions {
    fn from(config: &ValuationDefaultsConfig) -> Self {
        Self {
            round_explicit_cash_flows: config.round_explicit_cash_flows,
            terminal_discounting: config.terminal_discounting,
        }
    }
}

/// Stateless growth-fade DCF engine.
#[derive(Debug, Clone, Default)]
pub struct GrowthFadeValuationEngine {
    options: EngineOptions,
}

impl GrowthFadeValuationEngine {
    /// Create an engine with the default conventions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom conventions.
    pub fn with_options(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Run the three-phase projection and compute the intrinsic PE.
    ///
    /// The configuration is validated first; an invalid configuration
    /// produces no ledger at all.
    pub fn evaluate(&self, config: &ValuationConfig) -> Result<ValuationResult, ValuationError> {
        config.validate()?;

        let roc = config.post_tax_return_on_capital();
        let explicit_reinvestment = config.explicit_growth_rate / roc;
        let terminal_reinvestment = config.terminal_growth_rate / roc;

        let mut years = Vec::with_capacity(config.horizon_years() as usize + 1);

        // Seed year
        let seed_nopat = roc * STARTING_NORMALIZED_CAPITAL;
        let seed_investment = seed_nopat * explicit_reinvestment;
        let mut capital = STARTING_NORMALIZED_CAPITAL + seed_investment;
        years.push(ProjectionYear {
            year: 0,
            phase: ProjectionPhase::Seed,
            nopat: seed_nopat,
            growth_rate: config.explicit_growth_rate,
            reinvestment_rate: explicit_reinvestment,
            investment: seed_investment,
            free_cash_flow: seed_nopat - seed_investment,
            capital_ending_balance: capital,
            discount_factor: 1.0,
            discounted_free_cash_flow: 0.0,
        });

        // Explicit growth phase
        let mut previous_nopat = seed_nopat;
        let mut explicit_sum = 0.0;
        for year in 1..=config.explicit_growth_years {
            let nopat = capital * roc;
            let realized_growth = nopat / previous_nopat - 1.0;
            let investment = nopat * explicit_reinvestment;
            let free_cash_flow = nopat - investment;
            capital += investment;

            let discount_factor = discount_factor(config.cost_of_capital, year);
            let mut discounted = free_cash_flow * discount_factor;
            if self.options.round_explicit_cash_flows {
                discounted = round_to_cents(discounted);
            }
            explicit_sum += discounted;

            years.push(ProjectionYear {
                year,
                phase: ProjectionPhase::Explicit,
                nopat,
                growth_rate: realized_growth,
                reinvestment_rate: explicit_reinvestment,
                investment,
                free_cash_flow,
                capital_ending_balance: capital,
                discount_factor,
                discounted_free_cash_flow: discounted,
            });
            previous_nopat = nopat;
        }

        // Fade phase, seeded from the last explicit year's realized growth
        let fade_seed = years
            .last()
            .map_or(config.explicit_growth_rate, |y| y.growth_rate);
        let fade_step = (config.explicit_growth_rate - config.terminal_growth_rate)
            / f64::from(config.fade_period_years);
        let mut fade_sum = 0.0;
        for offset in 1..=config.fade_period_years {
            let year = config.explicit_growth_years + offset;
            let growth = fade_seed - fade_step * f64::from(offset);
            let reinvestment_rate = growth / roc;

            let nopat = capital * roc;
            let investment = nopat * reinvestment_rate;
            let free_cash_flow = nopat - investment;
            capital += investment;

            let discount_factor = discount_factor(config.cost_of_capital, year);
            let discounted = free_cash_flow * discount_factor;
            fade_sum += discounted;

            years.push(ProjectionYear {
                year,
                phase: ProjectionPhase::Fade,
                nopat,
                growth_rate: growth,
                reinvestment_rate,
                investment,
                free_cash_flow,
                capital_ending_balance: capital,
                discount_factor,
                discounted_free_cash_flow: discounted,
            });
        }

        let terminal = match years.last() {
            Some(last) => self.terminal_value(config, last, terminal_reinvestment),
            None => return Err(ValuationError::invalid("fade_period_years", "must be at least 1")),
        };

        let total_discounted_value = explicit_sum + fade_sum + terminal.discounted_value;
        let intrinsic_pe = total_discounted_value / seed_nopat;

        let outputs = [
            ("terminal_value", terminal.discounted_value),
            ("total_discounted_value", total_discounted_value),
            ("intrinsic_pe", intrinsic_pe),
        ];
        if let Some(&(quantity, value)) = outputs.iter().find(|(_, v)| !v.is_finite()) {
            debug!(quantity, value, "Growth-fade projection overflowed");
            return Err(ValuationError::NonFiniteResult { quantity, value });
        }

        debug!(
            intrinsic_pe,
            horizon_years = config.horizon_years(),
            explicit_sum,
            fade_sum,
            terminal_pv = terminal.discounted_value,
            "Growth-fade valuation complete"
        );

        Ok(ValuationResult {
            intrinsic_pe,
            total_discounted_value,
            seed_nopat,
            projection: Projection {
                years,
                terminal,
                explicit_discounted_sum: explicit_sum,
                fade_discounted_sum: fade_sum,
            },
        })
    }

    /// Gordon-growth perpetuity on the last projected year's NOPAT.
    fn terminal_value(
        &self,
        config: &ValuationConfig,
        last: &ProjectionYear,
        reinvestment_rate: f64,
    ) -> TerminalValue {
        let g = config.terminal_growth_rate;
        let nopat = last.nopat * (1.0 + g) / (config.cost_of_capital - g);
        let reinvestment = nopat * reinvestment_rate;
        let free_cash_flow = nopat - reinvestment;

        let discount_factor = match self.options.terminal_discounting {
            TerminalDiscounting::AtHorizon => last.discount_factor,
            TerminalDiscounting::OnePeriodLater => {
                last.discount_factor / (1.0 + config.cost_of_capital)
            }
        };

        TerminalValue {
            nopat,
            reinvestment,
            free_cash_flow,
            discount_factor,
            discounted_value: free_cash_flow * discount_factor,
        }
    }
}

/// `(1 + rate)^-year`
fn discount_factor(rate: f64, year: u32) -> f64 {
    (1.0 + rate).powf(-f64::from(year))
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::types::ValuationParams;

    fn default_config() -> ValuationConfig {
        ValuationParams::default().to_config()
    }

    fn exact_engine() -> GrowthFadeValuationEngine {
        GrowthFadeValuationEngine::with_options(EngineOptions {
            round_explicit_cash_flows: false,
            ..EngineOptions::default()
        })
    }

    #[test]
    fn test_default_parameters() {
        let result = GrowthFadeValuationEngine::new()
            .evaluate(&default_config())
            .unwrap();

        assert!(
            (result.intrinsic_pe - 14.972705814666).abs() < 1e-6,
            "PE: {}",
            result.intrinsic_pe
        );
        assert_eq!(result.display_pe(), 14.97);
        assert!((result.seed_nopat - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_ledger_shape() {
        let config = default_config();
        let result = GrowthFadeValuationEngine::new().evaluate(&config).unwrap();
        let projection = &result.projection;

        assert_eq!(projection.years.len(), 31);
        assert_eq!(projection.phase(ProjectionPhase::Explicit).count(), 15);
        assert_eq!(projection.phase(ProjectionPhase::Fade).count(), 15);

        let seed = projection.seed().unwrap();
        assert_eq!(seed.year, 0);
        assert!((seed.investment - 12.0).abs() < 1e-9);
        assert!((seed.capital_ending_balance - 112.0).abs() < 1e-9);

        for (index, year) in projection.years.iter().enumerate() {
            assert_eq!(year.year as usize, index);
        }
    }

    #[test]
    fn test_seed_year_excluded_from_sum() {
        let result = exact_engine().evaluate(&default_config()).unwrap();
        let projection = &result.projection;

        let ledger_sum: f64 = projection
            .years
            .iter()
            .map(|y| y.discounted_free_cash_flow)
            .sum();
        let phase_sums = projection.explicit_discounted_sum + projection.fade_discounted_sum;
        assert!((ledger_sum - phase_sums).abs() < 1e-9);
        assert_eq!(projection.seed().unwrap().discounted_free_cash_flow, 0.0);
    }

    #[test]
    fn test_explicit_cash_flows_rounded_to_cents() {
        let result = GrowthFadeValuationEngine::new()
            .evaluate(&default_config())
            .unwrap();

        for year in result.projection.phase(ProjectionPhase::Explicit) {
            let cents = year.discounted_free_cash_flow * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6, "year {}", year.year);
        }

        let unrounded_fade = result
            .projection
            .phase(ProjectionPhase::Fade)
            .any(|y| {
                let cents = y.discounted_free_cash_flow * 100.0;
                (cents - cents.round()).abs() > 1e-6
            });
        assert!(unrounded_fade);
    }

    #[test]
    fn test_rounding_is_small_smoothing() {
        let rounded = GrowthFadeValuationEngine::new()
            .evaluate(&default_config())
            .unwrap();
        let exact = exact_engine().evaluate(&default_config()).unwrap();

        // At most half a cent per explicit year, relative to a seed NOPAT of 15
        assert!((rounded.intrinsic_pe - exact.intrinsic_pe).abs() <= 15.0 * 0.005 / 15.0);
    }

    #[test]
    fn test_terminal_uses_horizon_discount_factor() {
        let result = GrowthFadeValuationEngine::new()
            .evaluate(&default_config())
            .unwrap();
        let last = result.projection.last_year().unwrap();
        assert_eq!(last.year, 30);
        assert_eq!(result.projection.terminal.discount_factor, last.discount_factor);
    }

    #[test]
    fn test_terminal_one_period_later() {
        let engine = GrowthFadeValuationEngine::with_options(EngineOptions {
            terminal_discounting: TerminalDiscounting::OnePeriodLater,
            ..EngineOptions::default()
        });
        let later = engine.evaluate(&default_config()).unwrap();
        let horizon = GrowthFadeValuationEngine::new()
            .evaluate(&default_config())
            .unwrap();

        assert!(later.intrinsic_pe < horizon.intrinsic_pe);
        assert!(
            (later.projection.terminal.discounted_value * 1.12
                - horizon.projection.terminal.discounted_value)
                .abs()
                < 1e-9
        );
        assert!((later.intrinsic_pe - 14.287196889478).abs() < 1e-6);
    }

    #[test]
    fn test_fade_ends_at_terminal_rate() {
        let result = GrowthFadeValuationEngine::new()
            .evaluate(&default_config())
            .unwrap();
        let last = result.projection.last_year().unwrap();
        assert_eq!(last.phase, ProjectionPhase::Fade);
        assert!((last.growth_rate - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_rising_fade_when_terminal_above_explicit() {
        let config = ValuationConfig {
            explicit_growth_rate: 0.02,
            terminal_growth_rate: 0.06,
            ..default_config()
        };
        let result = GrowthFadeValuationEngine::new().evaluate(&config).unwrap();
        let fade: Vec<f64> = result
            .projection
            .phase(ProjectionPhase::Fade)
            .map(|y| y.growth_rate)
            .collect();
        assert!(fade.windows(2).all(|w| w[1] > w[0]));
        assert!(result.intrinsic_pe.is_finite());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ValuationConfig {
            terminal_growth_rate: 0.15,
            ..default_config()
        };
        let err = GrowthFadeValuationEngine::new().evaluate(&config).unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn test_overflowing_projection_is_an_error() {
        // capital compounds at 1001x a year and overflows well before year 150
        let config = ValuationConfig {
            explicit_growth_rate: 1000.0,
            explicit_growth_years: 150,
            ..default_config()
        };
        let err = GrowthFadeValuationEngine::new().evaluate(&config).unwrap_err();
        assert!(
            matches!(err, ValuationError::NonFiniteResult { .. }),
            "{}",
            err
        );
        assert!(!err.is_invalid_configuration());
    }

    #[test]
    fn test_horizon_beyond_limit_rejected_before_projection() {
        let config = ValuationConfig {
            explicit_growth_rate: 0.2,
            cost_of_capital: 0.16,
            explicit_growth_years: 8000,
            ..default_config()
        };
        let err = GrowthFadeValuationEngine::new().evaluate(&config).unwrap_err();
        assert!(matches!(
            err,
            ValuationError::InvalidConfiguration { field: "explicit_growth_years", .. }
        ));

        let config = ValuationConfig {
            explicit_growth_years: u32::MAX,
            fade_period_years: 2,
            ..default_config()
        };
        assert!(GrowthFadeValuationEngine::new()
            .evaluate(&config)
            .unwrap_err()
            .is_invalid_configuration());
    }

    #[test]
    fn test_engine_options_from_config() {
        let defaults = ValuationDefaultsConfig {
            round_explicit_cash_flows: false,
            terminal_discounting: TerminalDiscounting::OnePeriodLater,
            ..ValuationDefaultsConfig::default()
        };
        let options = EngineOptions::from(&defaults);
        assert!(!options.round_explicit_cash_flows);
        assert_eq!(options.terminal_discounting, TerminalDiscounting::OnePeriodLater);
    }
}
