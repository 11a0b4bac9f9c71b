//! Eta matrices: identity with one column replaced
//!
//! An eta matrix records a rank-one column update to the basis. Both the
//! engine's update stack and the lower-triangular steps of the factorization
//! are stored in this form, so the two in-place vector products here are the
//! innermost kernels of both transformations.

use crate::numeric::snap;
use ndarray::{Array1, Array2};

/// An m×m identity matrix whose column `column_index` is replaced by
/// `column`.
///
/// The entry `column[column_index]` acts as a divisor during solves and must
/// be nonzero.
#[derive(Debug, Clone)]
pub struct EtaMatrix {
    /// Index of the replaced column
    pub column_index: usize,
    /// The replacement column, length m
    pub column: Array1<f64>,
}

impl EtaMatrix {
    /// Create an eta matrix from the replaced column index and its contents.
    pub fn new(column_index: usize, column: Array1<f64>) -> Self {
        debug_assert!(column_index < column.len());
        Self {
            column_index,
            column,
        }
    }

    /// Dimension m of the matrix.
    pub fn dim(&self) -> usize {
        self.column.len()
    }

    /// In-place left multiplication `x ← E·x`.
    ///
    /// Row `column_index` of the product is scaled by the stored diagonal
    /// entry; every other row accumulates its share of the old
    /// `x[column_index]`, which is read once up front.
    pub fn multiply_left(&self, x: &mut Array1<f64>, tol: f64) {
        let k = self.column_index;
        let xk = x[k];
        for i in 0..x.len() {
            if i == k {
                x[i] *= self.column[k];
            } else {
                x[i] += xk * self.column[i];
            }
            x[i] = snap(x[i], tol);
        }
    }

    /// In-place right multiplication `x ← x·E` for a row vector.
    ///
    /// Only entry `column_index` changes: it collapses to the weighted sum
    /// of `x` against the stored column.
    pub fn multiply_right(&self, x: &mut Array1<f64>, tol: f64) {
        let mut sum = 0.0;
        for i in 0..x.len() {
            sum += self.column[i] * x[i];
        }
        x[self.column_index] = snap(sum, tol);
    }

    /// Expand to a dense m×m matrix.
    pub fn dense(&self) -> Array2<f64> {
        let m = self.dim();
        let mut matrix = Array2::eye(m);
        for i in 0..m {
            matrix[[i, self.column_index]] = self.column[i];
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::DEFAULT_TOLERANCE;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_dense_expansion() {
        let eta = EtaMatrix::new(1, array![1.0, 2.0, 0.5]);
        let dense = eta.dense();
        let expected = array![[1.0, 1.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.5, 1.0]];
        assert_eq!(dense, expected);
    }

    #[test]
    fn test_multiply_left_matches_dense_product() {
        let eta = EtaMatrix::new(1, array![1.0, 2.0, 0.5]);
        let mut x = array![3.0, -1.0, 4.0];
        let expected = eta.dense().dot(&x);

        eta.multiply_left(&mut x, DEFAULT_TOLERANCE);
        for i in 0..3 {
            assert_relative_eq!(x[i], expected[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_multiply_right_matches_dense_product() {
        let eta = EtaMatrix::new(2, array![-1.0, 0.25, 2.0]);
        let mut x = array![3.0, -1.0, 4.0];
        let expected = x.dot(&eta.dense());

        eta.multiply_right(&mut x, DEFAULT_TOLERANCE);
        for i in 0..3 {
            assert_relative_eq!(x[i], expected[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_multiply_snaps_cancellation_to_zero() {
        // Column chosen so that row 0 cancels: x[0] + x[1] * (-1.5) = 0.
        let eta = EtaMatrix::new(1, array![-1.5, 2.0]);
        let mut x = array![3.0, 2.0];
        eta.multiply_left(&mut x, DEFAULT_TOLERANCE);
        assert_eq!(x[0].to_bits(), 0.0_f64.to_bits());
        assert_eq!(x[1], 4.0);
    }
}
