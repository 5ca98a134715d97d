//! Normalized Legendre polynomials.
//!
//! P̃ₗ = √(l + ½)·Pₗ has unit L² norm on [−1, 1]. The local expansion basis
//! inside each mesh section is √(2/Δx)·P̃ₗ(ξ(x)), so these polynomials and
//! their derivatives at the left section edge (ξ = −1) are what the matrix
//! assembly and the basis-function reconstruction consume.

use mpnum::Scalar;
use ndarray::Array2;

/// Value of the normalized Legendre polynomial P̃ₗ(x).
pub fn normalized_legendre_p<T: Scalar>(l: usize, x: &T) -> T {
    let norm = T::from_f64((l as f64 + 0.5).sqrt());
    if l == 0 {
        return norm;
    }
    if l == 1 {
        return norm * x.clone();
    }
    let mut p_prev = T::from_f64(1.0);
    let mut p = x.clone();
    for k in 2..=l {
        let kf = T::from_f64(k as f64);
        let a = T::from_f64((2 * k - 1) as f64);
        let b = T::from_f64((k - 1) as f64);
        let p_next = (a * x.clone() * p.clone() - b * p_prev) / kf;
        p_prev = p;
        p = p_next;
    }
    norm * p
}

/// All derivatives P̃ₗ^{(d)}(x0) for l, d = 0..=k_max.
///
/// Row l, column d of the result holds the d-th derivative of P̃ₗ at x0,
/// computed from the d-times differentiated Bonnet recurrence
/// (l+1)·Pₗ₊₁^{(d)} = (2l+1)·(x·Pₗ^{(d)} + d·Pₗ^{(d−1)}) − l·Pₗ₋₁^{(d)}.
pub fn normalized_legendre_p_derivatives<T: Scalar>(k_max: usize, x0: &T) -> Array2<T> {
    let n = k_max + 1;
    let mut table: Array2<T> = Array2::zeros((n, n));
    table[[0, 0]] = T::from_f64(1.0);
    if k_max >= 1 {
        table[[1, 0]] = x0.clone();
        table[[1, 1]] = T::from_f64(1.0);
    }
    for l in 1..k_max {
        let lf = T::from_f64(l as f64);
        let a = T::from_f64((2 * l + 1) as f64);
        let inv = T::from_f64(1.0) / T::from_f64((l + 1) as f64);
        for d in 0..n {
            let lower = if d == 0 {
                T::zero()
            } else {
                T::from_f64(d as f64) * table[[l, d - 1]].clone()
            };
            let value = (a.clone() * (x0.clone() * table[[l, d]].clone() + lower)
                - lf.clone() * table[[l - 1, d]].clone())
                * inv.clone();
            table[[l + 1, d]] = value;
        }
    }
    for l in 0..n {
        let norm = T::from_f64((l as f64 + 0.5).sqrt());
        for d in 0..n {
            table[[l, d]] = norm.clone() * table[[l, d]].clone();
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use mpnum::{with_precision, MpReal};

    fn factorial(n: usize) -> f64 {
        (1..=n).map(|k| k as f64).product()
    }

    #[test]
    fn low_order_values() {
        let x = 0.3_f64;
        assert_abs_diff_eq!(normalized_legendre_p(0, &x), 0.5_f64.sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(normalized_legendre_p(1, &x), 1.5_f64.sqrt() * x, epsilon = 1e-15);
        let p2 = 2.5_f64.sqrt() * 0.5 * (3.0 * x * x - 1.0);
        assert_abs_diff_eq!(normalized_legendre_p(2, &x), p2, epsilon = 1e-15);
    }

    #[test]
    fn unit_norm_by_quadrature() {
        // Trapezoidal check of ∫ P̃ₗ² over [-1, 1] for a few orders.
        let n = 20_000;
        for l in [0, 1, 3, 6] {
            let mut total = 0.0;
            for i in 0..n {
                let x = -1.0 + 2.0 * (i as f64 + 0.5) / n as f64;
                let p = normalized_legendre_p(l, &x);
                total += p * p * 2.0 / n as f64;
            }
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn derivative_table_against_closed_form_at_minus_one() {
        // P̃ₗ^{(d)}(−1) = (−1)^{l+d}·√(l+½)·(l+d)!/(2^d·d!·(l−d)!)
        let k_max = 7;
        let table = normalized_legendre_p_derivatives(k_max, &(-1.0));
        for l in 0..=k_max {
            for d in 0..=k_max {
                let expected = if d > l {
                    0.0
                } else {
                    let sign = if (l + d) % 2 == 0 { 1.0 } else { -1.0 };
                    sign * (l as f64 + 0.5).sqrt() * factorial(l + d)
                        / (2.0_f64.powi(d as i32) * factorial(d) * factorial(l - d))
                };
                assert_abs_diff_eq!(table[[l, d]], expected, epsilon = 1e-10 * expected.abs().max(1.0));
            }
        }
    }

    #[test]
    fn zeroth_column_matches_values() {
        let x0 = 0.42_f64;
        let table = normalized_legendre_p_derivatives(5, &x0);
        for l in 0..=5 {
            assert_abs_diff_eq!(table[[l, 0]], normalized_legendre_p(l, &x0), epsilon = 1e-14);
        }
    }

    #[test]
    fn extended_precision_agrees_with_double() {
        with_precision(167, || {
            let x = MpReal::from_f64(-0.25);
            for l in 0..8 {
                let hp = normalized_legendre_p(l, &x).to_f64();
                let lp = normalized_legendre_p(l, &(-0.25_f64));
                assert_abs_diff_eq!(hp, lp, epsilon = 1e-14);
            }
        });
    }
}
