//! Steps of the row-operation sequence produced by factorization

use crate::eta::EtaMatrix;

/// One step of the row-operation sequence `Ln Pn … L1 P1` that reduces the
/// reference basis to the upper triangular factor.
///
/// The sequence is stored oldest-first: applying the elements in storage
/// order as left multiplications to the reference basis yields U.
#[derive(Debug, Clone)]
pub enum LpElement {
    /// Swap two rows; `first < second`.
    RowSwap { first: usize, second: usize },
    /// Lower-triangular eta step: `1/pivot` at the pivot position and the
    /// negated elimination multipliers below it.
    Eta(EtaMatrix),
}
