//! Double-precision bootstrap of the initial meshes.
//!
//! The kernel's singular functions oscillate like orthogonal polynomials:
//! the vector of rank r has r sign changes. Discretising K_even on a dense
//! double-exponential grid and reading off the sign-change positions of the
//! relevant singular vectors therefore seeds the x and y meshes close to
//! their converged shape, which keeps the expensive arbitrary-precision
//! refinement loop short.

use mpnum::jacobi_svd;
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::kernel::{KernelBase, Parity, ReducedKernel};

/// Upper end of the t grid: x(t) = tanh(½π·sinh t) is within ~1e-13 of 1
/// there, close enough for node detection.
const T_MAX: f64 = 3.0;

fn de_transform(t: f64) -> f64 {
    (0.5 * std::f64::consts::PI * t.sinh()).tanh()
}

fn de_weight(t: f64) -> f64 {
    let u = 0.5 * std::f64::consts::PI * t.sinh();
    0.5 * std::f64::consts::PI * t.cosh() / u.cosh().powi(2)
}

fn sign_change_positions(column: &[f64], x: &[f64]) -> Vec<f64> {
    let mut positions = Vec::new();
    for i in 0..column.len() - 1 {
        if column[i] != 0.0 && column[i + 1] != 0.0 && column[i].signum() != column[i + 1].signum()
        {
            positions.push(0.5 * (x[i] + x[i + 1]));
        }
    }
    positions
}

fn mesh_from_positions(mut positions: Vec<f64>) -> Vec<f64> {
    positions.retain(|&p| p > 0.0 && p < 1.0);
    positions.sort_by(|a, b| a.partial_cmp(b).unwrap());
    positions.dedup();
    let mut mesh = Vec::with_capacity(positions.len() + 2);
    mesh.push(0.0);
    mesh.extend(positions);
    mesh.push(1.0);
    mesh
}

/// Seed meshes for x and y from the zero crossings of the even-sector
/// singular vectors at the sector rank implied by `max_dim`.
pub(crate) fn bootstrap_meshes<K: KernelBase>(
    kernel: &K,
    max_dim: usize,
    n: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if n < 8 {
        return Err(Error::InvalidArgument(format!(
            "bootstrap discretisation needs at least 8 points, got {n}"
        )));
    }
    let reduced = ReducedKernel::new(kernel, Parity::Even);

    let dt = T_MAX / n as f64;
    let mut x = Vec::with_capacity(n);
    let mut w = Vec::with_capacity(n);
    for i in 0..n {
        let t = dt * (i as f64 + 0.5);
        x.push(de_transform(t));
        w.push(de_weight(t) * dt);
    }

    let matrix = Array2::from_shape_fn((n, n), |(i, j)| {
        reduced.eval_f64(x[i], x[j]) * (w[i] * w[j]).sqrt()
    });
    let svd = jacobi_svd(&matrix).map_err(|e| Error::NumericalFailure(e.to_string()))?;

    // Even-sector rank: indices 0, 2, 4, … of the interleaved basis.
    let rank = ((max_dim + 1) / 2).min(n - 1);
    let u_column: Vec<f64> = (0..n).map(|i| svd.u[[i, rank]]).collect();
    let v_column: Vec<f64> = (0..n).map(|i| svd.v[[i, rank]]).collect();

    let mesh_x = mesh_from_positions(sign_change_positions(&u_column, &x));
    let mesh_y = mesh_from_positions(sign_change_positions(&v_column, &x));
    Ok((mesh_x, mesh_y))
}
