//! Linear least squares via SVD.
//!
//! Used by the Levenberg–Marquardt loop when the damped normal equations are not
//! positive definite (Cholesky fails), e.g. when a series is flat and the decay
//! rate column of the Jacobian collapses to zero.
//!
//! ```text
//! minimize ‖X β − y‖²
//! ```

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve, or if the
/// solution contains non-finite entries.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser singular value cut-offs.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
