//! The basis factorization engine
//!
//! Maintains the simplex basis implicitly as the product
//! `B = B0 · E1 · … · En`: a factored reference matrix followed by the eta
//! updates accumulated since the last refactorization. The reference matrix
//! itself is held as a row-operation sequence and an upper triangular
//! factor, `(Ln Pn … L1 P1) · B0 = U`, produced by Gaussian elimination
//! with partial pivoting. U carries a unit diagonal: each lower-triangular
//! step stores `1/pivot` on its diagonal, which trades a scaling during
//! factorization for division-free triangular substitutions.

use crate::config::FactorizationConfig;
use crate::eta::EtaMatrix;
use crate::lp::LpElement;
use crate::numeric::{gt, is_zero, snap};
use crate::{BasisError, Result};
use ndarray::{Array1, Array2};

/// LU basis factorization with eta-file updates.
///
/// Created at a fixed dimension m with the identity as reference basis.
/// Column updates arrive through [`push_eta`](Self::push_eta); the forward
/// and backward transformations solve against the implicit product without
/// ever forming it. Once the update stack grows past the configured
/// threshold, the updates are folded into the reference basis and a fresh
/// factorization is computed.
///
/// The transformations share one scratch vector, so they take `&mut self`;
/// two engines never share state and may live on different threads.
#[derive(Debug, Clone)]
pub struct BasisFactorization {
    /// Dimension m; every vector has length m, every matrix is m×m
    m: usize,
    /// Reference basis B0
    b0: Array2<f64>,
    /// Upper triangular factor with unit diagonal; meaningful only while
    /// `lp` is non-empty
    u: Array2<f64>,
    /// Row-operation sequence, oldest first
    lp: Vec<LpElement>,
    /// Eta updates accumulated since the last refactorization, oldest first
    etas: Vec<EtaMatrix>,
    /// When false, `push_eta` never triggers automatic refactorization
    factorization_enabled: bool,
    config: FactorizationConfig,
    /// Scratch right-hand side shared by the transformations
    work: Array1<f64>,
}

impl BasisFactorization {
    /// Create an engine of dimension `m` with `B0 = I` and no updates.
    pub fn new(m: usize) -> Self {
        Self::with_config(m, FactorizationConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(m: usize, config: FactorizationConfig) -> Self {
        assert!(m > 0, "basis dimension must be positive");
        Self {
            m,
            b0: Array2::eye(m),
            u: Array2::zeros((m, m)),
            lp: Vec::new(),
            etas: Vec::new(),
            factorization_enabled: true,
            config,
            work: Array1::zeros(m),
        }
    }

    /// Dimension m of the basis.
    pub fn dim(&self) -> usize {
        self.m
    }

    /// The reference basis B0.
    pub fn basis(&self) -> &Array2<f64> {
        &self.b0
    }

    /// The upper triangular factor U. Meaningful only while
    /// [`lp_elements`](Self::lp_elements) is non-empty; an empty sequence
    /// means B0 is the identity and U holds no data.
    pub fn upper(&self) -> &Array2<f64> {
        &self.u
    }

    /// The row-operation sequence, oldest first.
    pub fn lp_elements(&self) -> &[LpElement] {
        &self.lp
    }

    /// The pending eta updates, oldest first.
    pub fn etas(&self) -> &[EtaMatrix] {
        &self.etas
    }

    /// Whether `push_eta` refactorizes automatically past the threshold.
    pub fn factorization_enabled(&self) -> bool {
        self.factorization_enabled
    }

    /// Enable or disable automatic refactorization. While disabled the
    /// engine behaves as a pure product: updates accumulate without bound
    /// and the stored factors stay as they were.
    pub fn set_factorization_enabled(&mut self, enabled: bool) {
        self.factorization_enabled = enabled;
    }

    /// Record the column update `B ← B · E(column_index, column)`.
    ///
    /// `column[column_index]` must be nonzero; it becomes a divisor in the
    /// transformations. When the accumulated updates exceed the configured
    /// threshold and automatic refactorization is enabled, the updates are
    /// folded into B0 and a fresh factorization is computed, which can fail
    /// with [`BasisError::SingularMatrix`].
    pub fn push_eta(&mut self, column_index: usize, column: &Array1<f64>) -> Result<()> {
        assert_eq!(column.len(), self.m, "eta column length must match basis dimension");
        assert!(column_index < self.m, "eta column index out of range");
        debug_assert!(
            !is_zero(column[column_index], self.config.tolerance),
            "eta pivot entry must be nonzero"
        );

        self.etas.push(EtaMatrix::new(column_index, column.clone()));

        if self.etas.len() > self.config.refactorization_threshold && self.factorization_enabled {
            log::debug!(
                "eta stack size {} exceeds threshold {}; condensing and refactorizing",
                self.etas.len(),
                self.config.refactorization_threshold
            );
            self.condense_etas();
            self.refactorize()?;
        }
        Ok(())
    }

    /// Overwrite the reference basis with `basis` and factorize it
    /// immediately. The eta stack must be empty.
    pub fn set_basis(&mut self, basis: &Array2<f64>) -> Result<()> {
        assert_eq!(basis.dim(), (self.m, self.m), "basis dimensions must match");
        assert!(
            self.etas.is_empty(),
            "cannot replace the reference basis while eta updates are pending"
        );
        self.b0.assign(basis);
        self.refactorize()
    }

    /// Fold the accumulated eta updates into B0, leaving the eta stack empty
    /// and the factors cleared.
    ///
    /// Multiplying on the right by `E(k, v)` replaces column k of B0 with
    /// `B0 · v`, a linear combination of B0's columns weighted by v. Each
    /// update therefore rewrites a single column in place.
    ///
    /// The factors must be rebuilt with [`refactorize`](Self::refactorize)
    /// before the transformations are used again; an empty row-operation
    /// sequence is otherwise read as "B0 is the identity".
    pub fn condense_etas(&mut self) {
        let tol = self.config.tolerance;
        for eta in &self.etas {
            let k = eta.column_index;
            for i in 0..self.m {
                let mut sum = 0.0;
                for j in 0..self.m {
                    sum += self.b0[[i, j]] * eta.column[j];
                }
                self.b0[[i, k]] = snap(sum, tol);
            }
        }
        self.etas.clear();
        self.clear_factors();
    }

    /// Recompute the row-operation sequence and U for the current B0 by
    /// Gaussian elimination with partial pivoting.
    ///
    /// At stage i the candidate rows `i..m` of column i are scanned for the
    /// entry of largest magnitude; ties keep the earlier row. Fails with
    /// [`BasisError::SingularMatrix`] when every candidate is numerically
    /// zero, leaving the factors cleared.
    pub fn refactorize(&mut self) -> Result<()> {
        let tol = self.config.tolerance;
        self.clear_factors();
        self.u.assign(&self.b0);

        for i in 0..self.m {
            let mut largest = self.u[[i, i]].abs();
            let mut pivot_row = i;
            for j in (i + 1)..self.m {
                let contender = self.u[[j, i]].abs();
                if gt(contender, largest, tol) {
                    largest = contender;
                    pivot_row = j;
                }
            }
            if is_zero(largest, tol) {
                self.clear_factors();
                return Err(BasisError::SingularMatrix { column: i });
            }

            if pivot_row != i {
                swap_rows(&mut self.u, i, pivot_row);
                self.lp.push(LpElement::RowSwap {
                    first: i,
                    second: pivot_row,
                });
            }

            // Lower-triangular step: 1/pivot on the diagonal, negated
            // elimination multipliers below it.
            let pivot = self.u[[i, i]];
            let mut column = Array1::zeros(self.m);
            column[i] = 1.0 / pivot;
            for j in (i + 1)..self.m {
                column[j] = -self.u[[j, i]] / pivot;
            }
            let l = EtaMatrix::new(i, column);
            self.eliminate_column(&l, tol);
            self.lp.push(LpElement::Eta(l));
        }
        Ok(())
    }

    /// Apply a lower-triangular step to U in place.
    fn eliminate_column(&mut self, l: &EtaMatrix, tol: f64) {
        let k = l.column_index;
        for row in (k + 1)..self.m {
            self.u[[row, k]] = 0.0;
            for col in (k + 1)..self.m {
                self.u[[row, col]] = snap(self.u[[row, col]] + l.column[row] * self.u[[k, col]], tol);
            }
        }
        // The pivot row is scaled last: every other row's update reads it.
        for col in (k + 1)..self.m {
            self.u[[k, col]] *= l.column[k];
        }
        self.u[[k, k]] = 1.0;
    }

    fn clear_factors(&mut self) {
        self.lp.clear();
        self.u.fill(0.0);
    }

    /// Solve `B · x = y` against the implicit basis (the forward
    /// transformation, FTRAN).
    pub fn forward_transform(&mut self, y: &Array1<f64>, x: &mut Array1<f64>) {
        assert_eq!(y.len(), self.m, "right-hand side length must match basis dimension");
        assert_eq!(x.len(), self.m, "solution length must match basis dimension");

        // With no factorization and no updates the basis is the identity.
        if self.lp.is_empty() && self.etas.is_empty() {
            x.assign(y);
            return;
        }

        let tol = self.config.tolerance;
        let m = self.m;
        self.work.assign(y);

        // B = inv(Ln Pn … L1 P1) · U · E1 … En. Multiplying both sides of
        // B·x = y by the row operations oldest-first strips the inverted
        // prefix, leaving U · E1 … En · x on the left.
        for element in &self.lp {
            match element {
                LpElement::RowSwap { first, second } => self.work.swap(*first, *second),
                LpElement::Eta(l) => l.multiply_left(&mut self.work, tol),
            }
        }

        // Back substitution against the unit-diagonal U.
        if !self.lp.is_empty() {
            x[m - 1] = self.work[m - 1];
            for i in (0..m - 1).rev() {
                let mut sum = 0.0;
                for j in (i + 1)..m {
                    sum += self.u[[i, j]] * x[j];
                }
                x[i] = snap(self.work[i] - sum, tol);
            }
            self.work.assign(x);
        }

        // Peel the eta updates off oldest-first. Each changes a single
        // column, so every entry except the eta's own column comes straight
        // from the running right-hand side.
        for eta in &self.etas {
            let k = eta.column_index;
            x[k] = snap(self.work[k] / eta.column[k], tol);
            for i in 0..m {
                if i != k {
                    x[i] = snap(self.work[i] - x[k] * eta.column[i], tol);
                }
            }
            self.work.assign(x);
        }
    }

    /// Solve `x · B = y` against the implicit basis (the backward
    /// transformation, BTRAN).
    pub fn backward_transform(&mut self, y: &Array1<f64>, x: &mut Array1<f64>) {
        assert_eq!(y.len(), self.m, "right-hand side length must match basis dimension");
        assert_eq!(x.len(), self.m, "solution length must match basis dimension");

        if self.lp.is_empty() && self.etas.is_empty() {
            x.assign(y);
            return;
        }

        let tol = self.config.tolerance;
        let m = self.m;
        self.work.assign(y);

        // Right-multiplying a row vector by an eta changes one entry, so
        // each update is removed newest-first by re-solving that entry from
        // its column equation; the rest of x equals the running right-hand
        // side.
        for eta in self.etas.iter().rev() {
            x.assign(&self.work);
            let k = eta.column_index;
            let mut sum = self.work[k];
            for i in 0..m {
                if i != k {
                    sum -= x[i] * eta.column[i];
                }
            }
            x[k] = snap(sum / eta.column[k], tol);
            self.work.assign(x);
        }

        // Forward substitution for x'·U = t with x' = x·inv(Ln Pn … L1 P1).
        // U is read by columns: entry (j, i) multiplies x'[j] in column i's
        // equation.
        if !self.lp.is_empty() {
            x[0] = self.work[0];
            for i in 1..m {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += self.u[[j, i]] * x[j];
                }
                x[i] = snap(self.work[i] - sum, tol);
            }
        }

        // x now holds x·inv(Ln Pn … L1 P1); undo the row operations
        // newest-first as right multiplications.
        for element in self.lp.iter().rev() {
            match element {
                LpElement::RowSwap { first, second } => x.swap(*first, *second),
                LpElement::Eta(l) => l.multiply_right(x, tol),
            }
        }
    }

    /// Compute the dense inverse of the reference basis B0 into `result`.
    ///
    /// Fails with [`BasisError::EtasPending`] while updates are
    /// outstanding. An empty row-operation sequence means B0 is the
    /// identity; the identity is returned without consulting U.
    pub fn invert_basis(&self, result: &mut Array2<f64>) -> Result<()> {
        if !self.etas.is_empty() {
            return Err(BasisError::EtasPending {
                pending: self.etas.len(),
            });
        }
        assert_eq!(result.dim(), (self.m, self.m), "result dimensions must match");

        result.fill(0.0);
        for i in 0..self.m {
            result[[i, i]] = 1.0;
        }
        if self.lp.is_empty() {
            return Ok(());
        }

        let tol = self.config.tolerance;

        // Apply the row operations oldest-first to the identity: this forms
        // (Ln Pn … L1 P1) · I, the inverse of B0 up to the U factor.
        for element in &self.lp {
            match element {
                LpElement::RowSwap { first, second } => swap_rows(result, *first, *second),
                LpElement::Eta(l) => {
                    let k = l.column_index;
                    for row in (k + 1)..self.m {
                        for col in 0..self.m {
                            result[[row, col]] += l.column[row] * result[[k, col]];
                        }
                    }
                    // Pivot row last; the rows below read it.
                    for col in 0..self.m {
                        result[[k, col]] *= l.column[k];
                    }
                }
            }
        }

        // Back substitution with U across all columns of the result.
        for col in (1..self.m).rev() {
            for row in (0..col).rev() {
                let factor = self.u[[row, col]];
                if is_zero(factor, tol) {
                    continue;
                }
                for j in 0..self.m {
                    result[[row, j]] -= factor * result[[col, j]];
                }
            }
        }
        Ok(())
    }

    /// Condense and refactorize, then hand the resulting reference basis to
    /// `dest`, which factorizes it on receipt. `dest` must have the same
    /// dimension and an empty eta stack.
    pub fn store_factorization(&mut self, dest: &mut BasisFactorization) -> Result<()> {
        assert_eq!(self.m, dest.m, "checkpoint dimensions must match");
        assert!(
            dest.etas.is_empty(),
            "checkpoint destination must have an empty eta stack"
        );

        // Condensing first keeps the snapshot down to a single matrix.
        self.condense_etas();
        self.refactorize()?;
        dest.set_basis(&self.b0)
    }

    /// Discard local state and mirror `src`'s reference basis. `src` must
    /// have the same dimension and an empty eta stack.
    pub fn restore_factorization(&mut self, src: &BasisFactorization) -> Result<()> {
        assert_eq!(self.m, src.m, "checkpoint dimensions must match");
        assert!(
            src.etas.is_empty(),
            "checkpoint source must have an empty eta stack"
        );

        self.etas.clear();
        self.clear_factors();
        self.set_basis(&src.b0)
    }
}

fn swap_rows(matrix: &mut Array2<f64>, first: usize, second: usize) {
    for col in 0..matrix.ncols() {
        matrix.swap([first, col], [second, col]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_fresh_engine_is_identity() {
        let mut basis = BasisFactorization::new(3);
        let y = array![1.0, 2.0, 3.0];
        let mut x = Array1::zeros(3);

        basis.forward_transform(&y, &mut x);
        assert_eq!(x, y);

        basis.backward_transform(&y, &mut x);
        assert_eq!(x, y);
    }

    #[test]
    fn test_single_eta_forward() {
        let mut basis = BasisFactorization::new(3);
        basis.push_eta(1, &array![1.0, 2.0, 0.0]).unwrap();

        // Implicit basis: [[1,1,0],[0,2,0],[0,0,1]].
        let mut x = Array1::zeros(3);
        basis.forward_transform(&array![1.0, 4.0, 5.0], &mut x);
        assert_eq!(x, array![-1.0, 2.0, 5.0]);
    }

    #[test]
    fn test_single_eta_backward() {
        let mut basis = BasisFactorization::new(3);
        basis.push_eta(1, &array![1.0, 2.0, 0.0]).unwrap();

        let mut x = Array1::zeros(3);
        basis.backward_transform(&array![1.0, 4.0, 5.0], &mut x);
        assert_eq!(x, array![1.0, 1.5, 5.0]);
    }

    #[test]
    fn test_factorization_yields_unit_upper_triangular() {
        let mut basis = BasisFactorization::new(3);
        basis
            .set_basis(&array![[2.0, 4.0, -2.0], [4.0, 9.0, -3.0], [-2.0, -3.0, 7.0]])
            .unwrap();

        let u = basis.upper();
        for i in 0..3 {
            assert_relative_eq!(u[[i, i]], 1.0, epsilon = 1e-12);
            for j in 0..i {
                assert_relative_eq!(u[[i, j]], 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_permutation_recorded_when_pivoting() {
        let mut basis = BasisFactorization::new(3);
        basis
            .set_basis(&array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]])
            .unwrap();

        let swaps: Vec<_> = basis
            .lp_elements()
            .iter()
            .filter_map(|element| match element {
                LpElement::RowSwap { first, second } => Some((*first, *second)),
                LpElement::Eta(_) => None,
            })
            .collect();
        assert_eq!(swaps, vec![(0, 1)]);
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let mut basis = BasisFactorization::new(3);
        let result =
            basis.set_basis(&array![[0.0, 1.0, 2.0], [0.0, 3.0, 4.0], [0.0, 5.0, 6.0]]);

        assert!(matches!(result, Err(BasisError::SingularMatrix { column: 0 })));
        // A failed factorization leaves the factors cleared.
        assert!(basis.lp_elements().is_empty());
        assert!(basis.upper().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_invert_identity_basis() {
        let basis = BasisFactorization::new(3);
        let mut inverse = Array2::zeros((3, 3));
        basis.invert_basis(&mut inverse).unwrap();
        assert_eq!(inverse, Array2::eye(3));
    }

    #[test]
    fn test_invert_rejects_pending_etas() {
        let mut basis = BasisFactorization::new(3);
        basis.push_eta(0, &array![2.0, 0.0, 0.0]).unwrap();

        let mut inverse = Array2::zeros((3, 3));
        let result = basis.invert_basis(&mut inverse);
        assert!(matches!(result, Err(BasisError::EtasPending { pending: 1 })));
    }

    #[test]
    fn test_disabled_factorization_accumulates_etas() {
        let mut basis =
            BasisFactorization::with_config(3, FactorizationConfig::with_threshold(2));
        basis.set_factorization_enabled(false);

        for _ in 0..5 {
            basis.push_eta(0, &array![2.0, 0.0, 0.0]).unwrap();
        }
        assert_eq!(basis.etas().len(), 5);
        assert!(basis.lp_elements().is_empty());

        // Solves still work as a pure product: B = diag(32, 1, 1).
        let mut x = Array1::zeros(3);
        basis.forward_transform(&array![64.0, 1.0, 1.0], &mut x);
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[2], 1.0, epsilon = 1e-12);
    }
}
