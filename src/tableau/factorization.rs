//! Dense partial-pivoting LU factorization of the current basis matrix.
//!
//! The teacher crate factorizes sparse systems via `faer`'s simplicial LU
//! (`src/linalg/lu.rs`), threading `MemBuffer`/`MemStack` scratch through
//! `analyze`/`factorize`/`solve`. The basis here is small and dense (one
//! column per active equality row) and is rebuilt from scratch on every
//! `refresh` rather than updated incrementally, so a hand-rolled dense
//! partial-pivoting LU over `faer::Mat<E>` is used instead of the sparse
//! machinery — see DESIGN.md for the tradeoff.

use derive_more::{Display, Error};
use faer::Mat;

use crate::E;

#[derive(Debug, Display, Error, PartialEq)]
pub enum FactorizationError {
    #[display("basis matrix is singular to working precision")]
    Singular,
    #[display("basis matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

/// An `m x m` basis factorization `F = P L U`, used to solve `F x = b` and
/// `F^T x = b` (the two systems the tableau needs: computing the basic
/// assignment, and pricing out reduced costs).
#[derive(Debug, Clone)]
pub struct BasisFactorization {
    m: usize,
    lu: Mat<E>,
    perm: Vec<usize>,
}

impl BasisFactorization {
    /// Factorizes `basis` (an `m x m` dense matrix, one column per basic
    /// variable) in place, combining `L` (unit lower triangular) and `U`
    /// (upper triangular) into a single matrix and recording the row
    /// permutation from partial pivoting.
    pub fn factorize(basis: Mat<E>) -> Result<Self, FactorizationError> {
        let m = basis.nrows();
        if basis.ncols() != m {
            return Err(FactorizationError::NotSquare {
                rows: m,
                cols: basis.ncols(),
            });
        }

        let mut lu = basis;
        let mut perm: Vec<usize> = (0..m).collect();

        for k in 0..m {
            let (mut pivot_row, mut pivot_val) = (k, lu[(k, k)].abs());
            for i in (k + 1)..m {
                let v = lu[(i, k)].abs();
                if v > pivot_val {
                    pivot_row = i;
                    pivot_val = v;
                }
            }
            if pivot_val < 1e-13 {
                return Err(FactorizationError::Singular);
            }
            if pivot_row != k {
                for j in 0..m {
                    let tmp = lu[(k, j)];
                    lu[(k, j)] = lu[(pivot_row, j)];
                    lu[(pivot_row, j)] = tmp;
                }
                perm.swap(k, pivot_row);
            }

            let pivot = lu[(k, k)];
            for i in (k + 1)..m {
                let factor = lu[(i, k)] / pivot;
                lu[(i, k)] = factor;
                for j in (k + 1)..m {
                    let delta = factor * lu[(k, j)];
                    lu[(i, j)] -= delta;
                }
            }
        }

        Ok(Self { m, lu, perm })
    }

    pub fn dim(&self) -> usize {
        self.m
    }

    /// Solves `F x = b` in place, i.e. `b` holds the right-hand side on
    /// entry and the solution on return.
    pub fn solve(&self, b: &[E]) -> Vec<E> {
        let m = self.m;
        let mut permuted = vec![0.0; m];
        for i in 0..m {
            permuted[i] = b[self.perm[i]];
        }

        // Forward substitution: L y = Pb.
        for i in 0..m {
            let mut sum = permuted[i];
            for j in 0..i {
                sum -= self.lu[(i, j)] * permuted[j];
            }
            permuted[i] = sum;
        }

        // Back substitution: U x = y.
        for i in (0..m).rev() {
            let mut sum = permuted[i];
            for j in (i + 1)..m {
                sum -= self.lu[(i, j)] * permuted[j];
            }
            permuted[i] = sum / self.lu[(i, i)];
        }

        permuted
    }

    /// Solves `F^T x = b` in place (used by the cost manager to price out
    /// reduced costs without materializing `F^-1`).
    pub fn solve_transpose(&self, b: &[E]) -> Vec<E> {
        let m = self.m;
        let mut y = b.to_vec();

        // Forward substitution against U^T.
        for i in 0..m {
            let mut sum = y[i];
            for j in 0..i {
                sum -= self.lu[(j, i)] * y[j];
            }
            y[i] = sum / self.lu[(i, i)];
        }

        // Back substitution against L^T.
        for i in (0..m).rev() {
            let mut sum = y[i];
            for j in (i + 1)..m {
                sum -= self.lu[(j, i)] * y[j];
            }
            y[i] = sum;
        }

        let mut out = vec![0.0; m];
        for i in 0..m {
            out[self.perm[i]] = y[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat(rows: &[&[E]]) -> Mat<E> {
        let m = rows.len();
        Mat::from_fn(m, m, |i, j| rows[i][j])
    }

    #[test]
    fn solves_identity() {
        let f = BasisFactorization::factorize(mat(&[&[1.0, 0.0], &[0.0, 1.0]])).unwrap();
        let x = f.solve(&[3.0, 4.0]);
        assert!((x[0] - 3.0).abs() < 1e-9);
        assert!((x[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn solves_with_pivoting() {
        let f = BasisFactorization::factorize(mat(&[&[0.0, 1.0], &[1.0, 1.0]])).unwrap();
        let x = f.solve(&[2.0, 3.0]);
        // [0 1; 1 1] x = [2, 3] => x1 = 2, x0 + x1 = 3 => x0 = 1.
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!((x[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn singular_basis_rejected() {
        let res = BasisFactorization::factorize(mat(&[&[1.0, 1.0], &[1.0, 1.0]]));
        assert!(res.is_err());
    }

    #[test]
    fn transpose_solve_matches_normal_equations() {
        let f = BasisFactorization::factorize(mat(&[&[2.0, 0.0], &[1.0, 3.0]])).unwrap();
        let x = f.solve_transpose(&[2.0, 9.0]);
        // F^T = [2 1; 0 3]; F^T x = b => 3 x1 = 9 => x1 = 3; 2x0 + 3 = 2 => x0 = -0.5
        assert!((x[1] - 3.0).abs() < 1e-9);
        assert!((x[0] + 0.5).abs() < 1e-9);
    }
}
