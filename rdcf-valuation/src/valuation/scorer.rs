//! Overvaluation Scorer.
//!
//! Compares the lower of the observed multiples against the intrinsic PE.

use super::error::ValuationError;
use super::types::{OvervaluationResult, ReferenceMultiple};

/// Scores observed market multiples against an intrinsic PE.
#[derive(Debug, Clone, Copy, Default)]
pub struct OvervaluationScorer;

impl OvervaluationScorer {
    pub fn new() -> Self {
        Self
    }

    /// Degree of overvaluation in percent.
    ///
    /// The benchmark is the forward PE when the current PE is higher,
    /// otherwise the current PE.
    pub fn score(
        &self,
        current_pe: f64,
        forward_pe: f64,
        intrinsic_pe: f64,
    ) -> Result<OvervaluationResult, ValuationError> {
        for (name, value) in [
            ("current_pe", current_pe),
            ("forward_pe", forward_pe),
            ("intrinsic_pe", intrinsic_pe),
        ] {
            if !value.is_finite() {
                return Err(ValuationError::InvalidMultiple { name, value });
            }
        }

        if intrinsic_pe == 0.0 {
            return Err(ValuationError::DivisionByZero("intrinsic_pe"));
        }

        let (reference_multiple, reference) = reference_multiple(current_pe, forward_pe);
        let percent_overvalued = (reference_multiple / intrinsic_pe - 1.0) * 100.0;

        Ok(OvervaluationResult {
            percent_overvalued,
            reference_multiple,
            reference,
        })
    }
}

/// Pick the lower of the two observed multiples.
pub fn reference_multiple(current_pe: f64, forward_pe: f64) -> (f64, ReferenceMultiple) {
    if current_pe > forward_pe {
        (forward_pe, ReferenceMultiple::Forward)
    } else {
        (current_pe, ReferenceMultiple::Current)
    }
}
