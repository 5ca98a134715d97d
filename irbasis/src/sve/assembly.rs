//! Galerkin discretisation of a reduced kernel sector.
//!
//! The matrix representation is Φ_x · K_nn · Φ_yᵀ, where the block rows of
//! Φ hold the local orthonormal Legendre basis √(2/Δxₛ)·P̃ₗ(ξ) sampled at the
//! composite Gauss-Legendre nodes and pre-multiplied by the composite
//! weights, and K_nn holds the raw kernel samples. Because the local basis is
//! orthonormal in L², singular vectors of the assembled matrix are directly
//! the per-section expansion coefficients of the singular functions.

use mpnum::MpReal;
use ndarray::{Array2, ArrayView1};

use crate::error::Result;
use crate::gauss::legendre_mpreal;
use crate::kernel::{KernelBase, ReducedKernel};
use crate::poly::PiecewisePolynomial;
use crate::special_functions::normalized_legendre_p;

/// One sector's discretisation, kept around for the residual estimators.
pub(crate) struct SectorDiscretization {
    /// Assembled Galerkin matrix of shape (n_sx·n_p, n_sy·n_p).
    pub a: Array2<MpReal>,
    /// Raw kernel samples at the composite nodes.
    pub knn: Array2<MpReal>,
    pub xs: Vec<MpReal>,
    pub wx: Vec<MpReal>,
    pub ys: Vec<MpReal>,
    pub wy: Vec<MpReal>,
}

/// Per-section block of Φ: entries √(2/Δxₛ)·P̃ₗ(ξₙ)·wₙ.
fn phi_blocks(
    mesh: &[MpReal],
    weights: &[MpReal],
    legendre_at_nodes: &Array2<MpReal>,
    n_p: usize,
    n_q: usize,
) -> Vec<Array2<MpReal>> {
    let two = MpReal::from_f64(2.0);
    let mut blocks = Vec::with_capacity(mesh.len() - 1);
    for s in 0..mesh.len() - 1 {
        let dx = &mesh[s + 1] - &mesh[s];
        let factor = (&two / &dx).sqrt();
        let mut block: Array2<MpReal> = Array2::zeros((n_p, n_q));
        for l in 0..n_p {
            for n in 0..n_q {
                block[[l, n]] =
                    &(&factor * &legendre_at_nodes[[l, n]]) * &weights[s * n_q + n];
            }
        }
        blocks.push(block);
    }
    blocks
}

pub(crate) fn discretize<K: KernelBase>(
    kernel: &ReducedKernel<'_, K>,
    mesh_x: &[MpReal],
    mesh_y: &[MpReal],
    n_p: usize,
    n_q: usize,
) -> SectorDiscretization {
    let rule = legendre_mpreal(n_q);
    let composite_x = rule.piecewise(mesh_x);
    let composite_y = rule.piecewise(mesh_y);
    let n_sx = mesh_x.len() - 1;
    let n_sy = mesh_y.len() - 1;
    let nx = composite_x.len();
    let ny = composite_y.len();

    // P̃ₗ at the local nodes is section independent.
    let mut legendre_at_nodes: Array2<MpReal> = Array2::zeros((n_p, n_q));
    for l in 0..n_p {
        for n in 0..n_q {
            legendre_at_nodes[[l, n]] = normalized_legendre_p(l, &rule.x[n]);
        }
    }

    let phi_x = phi_blocks(mesh_x, &composite_x.w, &legendre_at_nodes, n_p, n_q);
    let phi_y = phi_blocks(mesh_y, &composite_y.w, &legendre_at_nodes, n_p, n_q);

    let mut knn: Array2<MpReal> = Array2::zeros((nx, ny));
    for i in 0..nx {
        for j in 0..ny {
            knn[[i, j]] = kernel.eval(&composite_x.x[i], &composite_y.x[j]);
        }
    }

    // T = Φ_x · K, exploiting the block-diagonal structure of Φ_x.
    let mut t: Array2<MpReal> = Array2::zeros((n_sx * n_p, ny));
    for sx in 0..n_sx {
        let block = &phi_x[sx];
        for l in 0..n_p {
            for j in 0..ny {
                let mut sum = MpReal::from_f64(0.0);
                for n in 0..n_q {
                    sum = &sum + &(&block[[l, n]] * &knn[[sx * n_q + n, j]]);
                }
                t[[sx * n_p + l, j]] = sum;
            }
        }
    }

    // A = T · Φ_yᵀ.
    let mut a: Array2<MpReal> = Array2::zeros((n_sx * n_p, n_sy * n_p));
    for sy in 0..n_sy {
        let block = &phi_y[sy];
        for row in 0..n_sx * n_p {
            for l in 0..n_p {
                let mut sum = MpReal::from_f64(0.0);
                for n in 0..n_q {
                    sum = &sum + &(&t[[row, sy * n_q + n]] * &block[[l, n]]);
                }
                a[[row, sy * n_p + l]] = sum;
            }
        }
    }

    SectorDiscretization {
        a,
        knn,
        xs: composite_x.x,
        wx: composite_x.w,
        ys: composite_y.x,
        wy: composite_y.w,
    }
}

/// Convert a singular vector of the assembled matrix into a piecewise
/// polynomial on its mesh.
///
/// The vector stacks per-section coefficients in the orthonormal Legendre
/// basis; the monomial coefficients about the left section edge follow from
/// the derivatives of P̃ₗ at ξ = −1:
///   a[s,d] = (1/d!)·√(2/Δxₛ)·(2/Δxₛ)ᵈ·Σₗ c[s·n_p+l]·P̃ₗ^{(d)}(−1).
pub(crate) fn vector_to_poly(
    column: ArrayView1<'_, MpReal>,
    mesh: &[MpReal],
    n_p: usize,
    deriv_at_left: &Array2<MpReal>,
) -> Result<PiecewisePolynomial<MpReal>> {
    let n_s = mesh.len() - 1;
    debug_assert_eq!(column.len(), n_s * n_p);
    let two = MpReal::from_f64(2.0);
    let mut factorial = vec![MpReal::from_f64(1.0)];
    for d in 1..n_p {
        let prev = factorial[d - 1].clone();
        factorial.push(prev * MpReal::from_f64(d as f64));
    }
    let mut coeff: Array2<MpReal> = Array2::zeros((n_s, n_p));
    for s in 0..n_s {
        let dx = &mesh[s + 1] - &mesh[s];
        let two_over_dx = &two / &dx;
        let norm = two_over_dx.sqrt();
        let mut scale_power = MpReal::from_f64(1.0);
        for d in 0..n_p {
            let mut sum = MpReal::from_f64(0.0);
            for l in 0..n_p {
                sum = &sum + &(&column[s * n_p + l] * &deriv_at_left[[l, d]]);
            }
            coeff[[s, d]] = &(&(&norm * &scale_power) * &sum) / &factorial[d];
            scale_power = &scale_power * &two_over_dx;
        }
    }
    PiecewisePolynomial::new(mesh.to_vec(), coeff)
}
