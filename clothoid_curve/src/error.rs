//! Error types shared by the clothoid constructors and solvers.

use thiserror::Error;

use crate::Float;

/// Errors produced by clothoid construction, transforms and solvers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClothoidError {
    /// Malformed parameters: non-finite values, negative length, reversed trim range.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// An iterative solver hit its iteration cap without meeting its tolerance.
    #[error("{solver} did not converge after {iterations} iterations (residual {residual:e})")]
    Nonconvergence {
        /// Which solver gave up.
        solver: &'static str,
        /// Iterations performed.
        iterations: usize,
        /// Residual at the last iterate.
        residual: Float,
    },

    /// Ill-conditioned configuration, e.g. coincident end points.
    #[error("numerically degenerate configuration: {reason}")]
    NumericalDegeneracy {
        /// Description of the degeneracy.
        reason: String,
    },
}

pub type Result<T> = core::result::Result<T, ClothoidError>;

impl ClothoidError {
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn nonconvergence(solver: &'static str, iterations: usize, residual: Float) -> Self {
        Self::Nonconvergence {
            solver,
            iterations,
            residual,
        }
    }

    #[must_use]
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::NumericalDegeneracy {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    #[must_use]
    pub fn is_nonconvergence(&self) -> bool {
        matches!(self, Self::Nonconvergence { .. })
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::NumericalDegeneracy { .. })
    }
}

/// Reject NaN and infinities with a message naming the offending argument.
pub(crate) fn check_finite(name: &str, value: Float) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ClothoidError::invalid_input(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ClothoidError::invalid_input("s_begin > s_end");
        assert!(err.to_string().contains("s_begin > s_end"));

        let err = ClothoidError::nonconvergence("g1", 20, 1.5e-3);
        let msg = err.to_string();
        assert!(msg.contains("g1"));
        assert!(msg.contains("20 iterations"));
    }

    #[test]
    fn error_predicates() {
        assert!(ClothoidError::degenerate("coincident points").is_degenerate());
        assert!(!ClothoidError::degenerate("coincident points").is_nonconvergence());
        assert!(ClothoidError::nonconvergence("g2", 100, 1.0).is_nonconvergence());
        assert!(ClothoidError::invalid_input("nan").is_invalid_input());
    }

    #[test]
    fn finite_check() {
        assert!(check_finite("x0", 1.0).is_ok());
        let err = check_finite("x0", Float::NAN).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("x0"));
        assert!(check_finite("y0", Float::INFINITY).is_err());
    }
}
