//! Configuration validation.
//!
//! Checks that configured values are present and within valid ranges
//! before the service starts.

use thiserror::Error;

use crate::config::{
    Config, MarketDataConfig, ObservabilityConfig, ServiceConfig, ValuationDefaultsConfig,
    MAX_HORIZON_YEARS,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 4] = [
            &self.service,
            &self.observability,
            &self.valuation,
            &self.market_data,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if self.network.bind.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "network.bind".into(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(port) = self.port {
            if port == 0 {
                return Err(ValidationError::InvalidPort {
                    port,
                    field: "service.port".into(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ValuationDefaultsConfig {
    fn validate(&self) -> ValidationResult<()> {
        let rates = [
            ("valuation.cost_of_capital_pct", self.cost_of_capital_pct),
            ("valuation.pre_tax_roce_pct", self.pre_tax_roce_pct),
            ("valuation.explicit_growth_pct", self.explicit_growth_pct),
            ("valuation.terminal_growth_pct", self.terminal_growth_pct),
        ];
        for (field, value) in rates {
            if !value.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: "must be a finite number".into(),
                });
            }
        }

        if self.cost_of_capital_pct <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "valuation.cost_of_capital_pct".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.pre_tax_roce_pct <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "valuation.pre_tax_roce_pct".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.explicit_growth_years == 0 {
            return Err(ValidationError::InvalidValue {
                field: "valuation.explicit_growth_years".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.fade_period_years == 0 {
            return Err(ValidationError::InvalidValue {
                field: "valuation.fade_period_years".into(),
                reason: "must be at least 1".into(),
            });
        }

        let horizon = self
            .explicit_growth_years
            .checked_add(self.fade_period_years);
        if horizon.map_or(true, |years| years > MAX_HORIZON_YEARS) {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "valuation.explicit_growth_years + valuation.fade_period_years must not exceed {}",
                    MAX_HORIZON_YEARS
                ),
            });
        }

        if self.cost_of_capital_pct <= self.terminal_growth_pct {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "valuation.cost_of_capital_pct ({}) must exceed valuation.terminal_growth_pct ({})",
                    self.cost_of_capital_pct, self.terminal_growth_pct
                ),
            });
        }

        Ok(())
    }
}

impl Validate for MarketDataConfig {
    fn validate(&self) -> ValidationResult<()> {
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ValidationError::InvalidValue {
                    field: "market_data.base_url".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ValidationError::InvalidValue {
                    field: "market_data.base_url".into(),
                    reason: e.to_string(),
                });
            }
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "market_data.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.user_agent.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "market_data.user_agent".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.observability.log_level = "invalid".into();
        let result = config.validate();
        assert!(result.is_err());
        if let Err(ValidationError::InvalidValue { field, .. }) = result {
            assert_eq!(field, "observability.log_level");
        }
    }

    #[test]
    fn test_zero_port() {
        let mut config = Config::default();
        config.service.port = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidPort { port: 0, .. })
        ));
    }

    #[test]
    fn test_terminal_growth_must_be_below_cost_of_capital() {
        let mut config = Config::default();
        config.valuation.terminal_growth_pct = 12.0;
        let result = config.validate();
        if let Err(ValidationError::Conflict { reason }) = result {
            assert!(reason.contains("terminal_growth_pct"));
        } else {
            panic!("expected conflict, got {:?}", result);
        }
    }

    #[test]
    fn test_zero_fade_period() {
        let mut config = Config::default();
        config.valuation.fade_period_years = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_horizon_bound() {
        let mut config = Config::default();
        config.valuation.explicit_growth_years = u32::MAX;
        assert!(config.validate().is_err());

        config.valuation.explicit_growth_years = MAX_HORIZON_YEARS - config.valuation.fade_period_years;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_market_data_url() {
        let mut config = Config::default();
        config.market_data.base_url = "not a url".into();
        assert!(config.validate().is_err());

        config.market_data.base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiple_errors_collected() {
        let mut config = Config::default();
        config.observability.log_format = "xml".into();
        config.market_data.timeout_secs = 0;
        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }
}
