//! One-sided (Hestenes) Jacobi SVD.
//!
//! Jacobi iteration is slower than bidiagonalisation but keeps full relative
//! accuracy in the small singular values, which is what the kernel matrices
//! need: their spectra decay over many decades and a backward-stable-only
//! method loses the tail. The implementation is generic over [`Scalar`] and is
//! run at `f64` for the bootstrap discretisation and at [`crate::MpReal`] for
//! the production solve.

use std::fmt;

use ndarray::{Array1, Array2};

use crate::scalar::Scalar;

const MAX_SWEEPS: usize = 60;

/// Thin SVD `A = U · diag(σ) · Vᵀ` with σ non-increasing and U, V
/// column-orthonormal.
#[derive(Debug, Clone)]
pub struct SvdResult<T> {
    pub u: Array2<T>,
    pub s: Array1<T>,
    pub v: Array2<T>,
}

/// Raised when the cyclic sweeps fail to converge.
#[derive(Debug, Clone)]
pub struct SvdError {
    pub message: String,
}

impl fmt::Display for SvdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SVD failed: {}", self.message)
    }
}

impl std::error::Error for SvdError {}

/// Compute the thin SVD of `matrix`.
///
/// Wide matrices are handled by factoring the transpose and swapping the
/// singular-vector roles.
pub fn jacobi_svd<T: Scalar>(matrix: &Array2<T>) -> Result<SvdResult<T>, SvdError> {
    let m = matrix.nrows();
    let n = matrix.ncols();
    if m == 0 || n == 0 {
        return Err(SvdError {
            message: "empty matrix".to_string(),
        });
    }
    if m < n {
        let transposed = matrix.t().to_owned();
        let result = jacobi_svd(&transposed)?;
        return Ok(SvdResult {
            u: result.v,
            s: result.s,
            v: result.u,
        });
    }

    let mut b = matrix.clone();
    let mut v: Array2<T> = Array2::eye(n);
    let eps = T::epsilon();

    let mut converged = false;
    for _sweep in 0..MAX_SWEEPS {
        let mut rotated = false;
        for p in 0..n - 1 {
            for q in p + 1..n {
                let mut alpha = T::zero();
                let mut beta = T::zero();
                let mut gamma = T::zero();
                for i in 0..m {
                    let bip = b[[i, p]].clone();
                    let biq = b[[i, q]].clone();
                    alpha = alpha + bip.clone() * bip.clone();
                    beta = beta + biq.clone() * biq.clone();
                    gamma = gamma + bip * biq;
                }
                if alpha.is_zero() || beta.is_zero() {
                    continue;
                }
                let threshold = eps.clone() * (alpha.clone() * beta.clone()).sqrt();
                if gamma.abs() <= threshold {
                    continue;
                }
                rotated = true;

                let two = T::from_f64(2.0);
                let one = T::from_f64(1.0);
                let zeta = (beta - alpha) / (two * gamma.clone());
                let t = {
                    let denom = zeta.abs() + (one.clone() + zeta.clone() * zeta.clone()).sqrt();
                    let unsigned = one.clone() / denom;
                    if zeta < T::zero() {
                        -unsigned
                    } else {
                        unsigned
                    }
                };
                let c = one / (T::from_f64(1.0) + t.clone() * t.clone()).sqrt();
                let s = c.clone() * t;

                for i in 0..m {
                    let bip = b[[i, p]].clone();
                    let biq = b[[i, q]].clone();
                    b[[i, p]] = c.clone() * bip.clone() - s.clone() * biq.clone();
                    b[[i, q]] = s.clone() * bip + c.clone() * biq;
                }
                for i in 0..n {
                    let vip = v[[i, p]].clone();
                    let viq = v[[i, q]].clone();
                    v[[i, p]] = c.clone() * vip.clone() - s.clone() * viq.clone();
                    v[[i, q]] = s.clone() * vip + c.clone() * viq;
                }
            }
        }
        if !rotated {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(SvdError {
            message: format!("no convergence within {MAX_SWEEPS} sweeps"),
        });
    }

    // Column norms are the singular values; the normalised columns are U.
    let mut sigma: Vec<T> = Vec::with_capacity(n);
    for j in 0..n {
        let mut sum = T::zero();
        for i in 0..m {
            let bij = b[[i, j]].clone();
            sum = sum + bij.clone() * bij;
        }
        sigma.push(sum.sqrt());
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &c| {
        sigma[c]
            .partial_cmp(&sigma[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut u_sorted: Array2<T> = Array2::zeros((m, n));
    let mut v_sorted: Array2<T> = Array2::zeros((n, n));
    let mut s_sorted: Array1<T> = Array1::zeros(n);
    for (new_idx, &old_idx) in order.iter().enumerate() {
        let sj = sigma[old_idx].clone();
        if !sj.is_zero() {
            for i in 0..m {
                u_sorted[[i, new_idx]] = b[[i, old_idx]].clone() / sj.clone();
            }
        }
        for i in 0..n {
            v_sorted[[i, new_idx]] = v[[i, old_idx]].clone();
        }
        s_sorted[new_idx] = sj;
    }

    Ok(SvdResult {
        u: u_sorted,
        s: s_sorted,
        v: v_sorted,
    })
}

/// Plain triple-loop matrix product; `ndarray::dot` requires `Copy` scalars.
pub fn matmul<T: Scalar>(a: &Array2<T>, b: &Array2<T>) -> Array2<T> {
    assert_eq!(a.ncols(), b.nrows(), "inner dimensions must agree");
    let mut out: Array2<T> = Array2::zeros((a.nrows(), b.ncols()));
    for i in 0..a.nrows() {
        for k in 0..a.ncols() {
            let aik = a[[i, k]].clone();
            if aik.is_zero() {
                continue;
            }
            for j in 0..b.ncols() {
                out[[i, j]] = out[[i, j]].clone() + aik.clone() * b[[k, j]].clone();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::real::{with_precision, MpReal};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn reconstruct(result: &SvdResult<f64>) -> Array2<f64> {
        let k = result.s.len();
        let mut scaled = result.u.clone();
        for j in 0..k {
            for i in 0..scaled.nrows() {
                scaled[[i, j]] *= result.s[j];
            }
        }
        matmul(&scaled, &result.v.t().to_owned())
    }

    #[test]
    fn identity() {
        let a: Array2<f64> = Array2::eye(4);
        let result = jacobi_svd(&a).unwrap();
        for &s in result.s.iter() {
            assert_abs_diff_eq!(s, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn rank_one() {
        let a = array![[1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0]];
        let result = jacobi_svd(&a).unwrap();
        assert_abs_diff_eq!(result.s[0], 3.0, epsilon = 1e-13);
        assert_abs_diff_eq!(result.s[1], 0.0, epsilon = 1e-13);
        assert_abs_diff_eq!(result.s[2], 0.0, epsilon = 1e-13);
    }

    #[test]
    fn rectangular_tall_and_wide() {
        let a = array![[2.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let result = jacobi_svd(&a).unwrap();
        let back = reconstruct(&result);
        for i in 0..3 {
            for j in 0..2 {
                assert_abs_diff_eq!(back[[i, j]], a[[i, j]], epsilon = 1e-13);
            }
        }
        assert!(result.s[0] >= result.s[1]);

        let wide = a.t().to_owned();
        let result = jacobi_svd(&wide).unwrap();
        let back = reconstruct(&result);
        for i in 0..2 {
            for j in 0..3 {
                assert_abs_diff_eq!(back[[i, j]], wide[[i, j]], epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn columns_are_orthonormal() {
        let a = array![
            [4.0, 1.0, 0.5],
            [1.0, 3.0, 0.2],
            [0.5, 0.2, 1.0],
            [0.1, 0.4, 0.9]
        ];
        let result = jacobi_svd(&a).unwrap();
        for p in 0..3 {
            for q in 0..3 {
                let mut dot_u = 0.0;
                for i in 0..4 {
                    dot_u += result.u[[i, p]] * result.u[[i, q]];
                }
                let expected = if p == q { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(dot_u, expected, epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn hilbert_in_extended_precision() {
        // The 8×8 Hilbert matrix: κ ≈ 1e10, far beyond what a double-only
        // factorisation resolves in its smallest singular value.
        with_precision(167, || {
            let n = 8;
            let h = Array2::from_shape_fn((n, n), |(i, j)| {
                MpReal::from_f64(1.0) / MpReal::from_f64((i + j + 1) as f64)
            });
            let result = jacobi_svd(&h).unwrap();
            for j in 1..n {
                assert!(result.s[j - 1] >= result.s[j]);
            }
            // Known value of σ₀ for the 8×8 Hilbert matrix.
            assert_abs_diff_eq!(result.s[0].to_f64(), 1.6959389, epsilon = 1e-6);
            assert!(result.s[n - 1].to_f64() > 0.0);
            assert!(result.s[n - 1].to_f64() < 1e-9);
        });
    }
}
