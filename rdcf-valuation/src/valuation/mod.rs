//! Valuation Module.
//!
//! Derives an intrinsic PE from capital-efficiency and growth assumptions and
//! compares it with observed market multiples.
//!
//! # Components
//!
//! 1. **GrowthFadeValuationEngine**: explicit growth → linear fade → terminal
//!    perpetuity, over a normalized capital base
//! 2. **OvervaluationScorer**: lower of current / forward PE versus intrinsic PE
//!
//! Both are pure and synchronous; re-run them from scratch on every input change.
//!
//! # Usage
//!
//! ```ignore
//! use rdcf_valuation::valuation::{GrowthFadeValuationEngine, OvervaluationScorer, ValuationParams};
//!
//! let config = ValuationParams::default().to_config();
//! let result = GrowthFadeValuationEngine::new().evaluate(&config)?;
//! let score = OvervaluationScorer::new().score(72.4, 65.1, result.intrinsic_pe)?;
//!
//! println!("Intrinsic PE: {:.2}", result.intrinsic_pe);
//! println!("Overvaluation: {}%", score.truncated_percent());
//! ```

pub mod engine;
pub mod error;
pub mod scorer;
pub mod types;

pub use engine::{EngineOptions, GrowthFadeValuationEngine};
pub use error::ValuationError;
pub use scorer::{reference_multiple, OvervaluationScorer};
pub use types::{
    OvervaluationResult, ParameterRange, Projection, ProjectionPhase, ProjectionYear,
    ReferenceMultiple, TerminalValue, ValuationConfig, ValuationParams, ValuationResult,
    MAX_HORIZON_YEARS, PARAMETER_RANGES, STARTING_NORMALIZED_CAPITAL, TAX_RATE,
};
