//! rdcf-common - Shared configuration, validation, and logging for the reverse DCF service.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod validation;

pub use config::{
    Config, MarketDataConfig, NetworkConfig, ObservabilityConfig, ServiceConfig,
    TerminalDiscounting, ValuationDefaultsConfig,
};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, TerminalDiscounting};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
