//! Engine configuration

use crate::numeric::DEFAULT_TOLERANCE;

/// Basis factorization configuration
#[derive(Debug, Clone)]
pub struct FactorizationConfig {
    /// Number of accumulated eta matrices beyond which `push_eta` condenses
    /// the stack and refactorizes (when automatic refactorization is enabled)
    pub refactorization_threshold: usize,
    /// Tolerance shared by zero snapping and pivot comparisons
    pub tolerance: f64,
}

impl Default for FactorizationConfig {
    fn default() -> Self {
        Self {
            refactorization_threshold: 20,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl FactorizationConfig {
    /// Create a config with a specific refactorization threshold
    pub fn with_threshold(refactorization_threshold: usize) -> Self {
        Self {
            refactorization_threshold,
            ..Default::default()
        }
    }
}
