use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ridge term added to the normal equations for numerical stability.
const RIDGE_EPSILON: f64 = 1e-6;

/// Incrementally fitted ordinary-least-squares model.
///
/// The accumulators always hold the sums over every batch ever passed to
/// [`LinearModel::fit`], so fitting batches one at a time is exactly
/// equivalent to fitting their concatenation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    theta: DVector<f64>,
    xtx: DMatrix<f64>,
    xty: DVector<f64>,
}

impl LinearModel {
    /// Creates a zero-initialised model for the given feature dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            theta: DVector::zeros(dimension),
            xtx: DMatrix::zeros(dimension, dimension),
            xty: DVector::zeros(dimension),
        }
    }

    /// Returns the configured feature dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.theta.len()
    }

    /// Returns the current parameter vector.
    #[must_use]
    pub fn theta(&self) -> &DVector<f64> {
        &self.theta
    }

    /// Overrides the parameter vector (seeding known-correct parameters).
    ///
    /// The accumulators are left untouched; a later `fit` recomputes theta
    /// from the accumulated data as usual.
    pub fn set_theta(&mut self, theta: DVector<f64>) -> Result<(), ModelError> {
        if theta.len() != self.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dimension(),
                got: theta.len(),
            });
        }
        self.theta = theta;
        Ok(())
    }

    /// Accumulates the batch into the sufficient statistics and refits theta.
    ///
    /// Solves the ridge-regularised normal equations through a pseudo-inverse,
    /// so singular or underdetermined accumulators are not an error. When the
    /// accumulated `XTy` is still exactly zero the fit is skipped and the
    /// zero vector returned, guarding against regulariser-dominated noise.
    pub fn fit(
        &mut self,
        features: &DMatrix<f64>,
        targets: &DVector<f64>,
    ) -> Result<DVector<f64>, ModelError> {
        let dimension = self.dimension();
        if features.ncols() != dimension {
            return Err(ModelError::DimensionMismatch {
                expected: dimension,
                got: features.ncols(),
            });
        }
        if features.nrows() != targets.len() {
            return Err(ModelError::DimensionMismatch {
                expected: features.nrows(),
                got: targets.len(),
            });
        }
        self.xtx += features.transpose() * features;
        self.xty += features.transpose() * targets;
        if self.xty.iter().all(|value| *value == 0.0) {
            return Ok(DVector::zeros(dimension));
        }
        let regularised = &self.xtx + DMatrix::identity(dimension, dimension) * RIDGE_EPSILON;
        let inverse = regularised
            .pseudo_inverse(f64::EPSILON)
            .map_err(ModelError::PseudoInverse)?;
        self.theta = inverse * &self.xty;
        Ok(self.theta.clone())
    }

    /// Computes `X * theta` for a batch of feature rows. Read-only.
    pub fn forward(&self, features: &DMatrix<f64>) -> Result<DVector<f64>, ModelError> {
        if features.ncols() != self.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dimension(),
                got: features.ncols(),
            });
        }
        Ok(features * &self.theta)
    }

    /// Computes `theta . features` for a single feature vector.
    pub fn predict(&self, features: &DVector<f64>) -> Result<f64, ModelError> {
        if features.len() != self.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dimension(),
                got: features.len(),
            });
        }
        Ok(self.theta.dot(features))
    }
}

/// Errors raised by the correction model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Feature/target shapes inconsistent with the configured dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the model or batch requires.
        expected: usize,
        /// Dimension actually supplied.
        got: usize,
    },
    /// Pseudo-inverse computation rejected its input.
    #[error("pseudo-inverse failed: {0}")]
    PseudoInverse(&'static str),
}
