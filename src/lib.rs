//! Basis factorization for the revised simplex method
//!
//! In a revised simplex solver the m×m basis matrix B changes by exactly one
//! column per pivot. This library maintains B implicitly as the product
//! `B = B0 · E1 · … · En`, where B0 is a factored reference matrix and each
//! Ei is an eta matrix recording one column replacement. The engine solves
//! the forward (`B·x = y`) and backward (`x·B = y`) transformations against
//! that product, periodically folds the accumulated updates into B0 and
//! refactorizes it by partial-pivot Gaussian elimination, and supports
//! checkpointing a clean reference basis between engines.
//!
//! The engine is dense, `f64`-only, and single-threaded; each instance owns
//! its buffers exclusively.
//!
//! # Example
//!
//! ```
//! use ndarray::{array, Array1};
//! use simplex_basis::BasisFactorization;
//!
//! let mut basis = BasisFactorization::new(3);
//! // Replace column 1 of the basis: B = [[1,1,0],[0,2,0],[0,0,1]].
//! basis.push_eta(1, &array![1.0, 2.0, 0.0]).unwrap();
//!
//! let mut x = Array1::zeros(3);
//! basis.forward_transform(&array![1.0, 4.0, 5.0], &mut x);
//! assert_eq!(x, array![-1.0, 2.0, 5.0]);
//! ```

mod config;
mod eta;
mod factorization;
mod lp;
pub mod numeric;

pub use config::FactorizationConfig;
pub use eta::EtaMatrix;
pub use factorization::BasisFactorization;
pub use lp::LpElement;

/// Error types for basis factorization operations
#[derive(Debug, thiserror::Error)]
pub enum BasisError {
    #[error("no pivot candidate in column {column}: matrix is numerically singular")]
    SingularMatrix { column: usize },

    #[error("operation requires an empty eta stack ({pending} updates pending)")]
    EtasPending { pending: usize },
}

pub type Result<T> = std::result::Result<T, BasisError>;
