//! Gauss-Legendre quadrature rules.
//!
//! A [`Rule`] approximates ∫f by Σ f(xᵢ)·wᵢ. Rules are generated on [−1, 1]
//! by Newton iteration on Pₙ and mapped onto arbitrary intervals or whole
//! meshes by affine reseating. The arbitrary-precision rules are memoised per
//! (n, precision); the cache is purely additive and never invalidated.

use std::collections::HashMap;
use std::sync::Mutex;

use mpnum::{current_precision, MpReal, Scalar};
use once_cell::sync::Lazy;

/// Quadrature rule on the interval [a, b].
#[derive(Debug, Clone)]
pub struct Rule<T> {
    pub x: Vec<T>,
    pub w: Vec<T>,
    pub a: T,
    pub b: T,
}

impl<T: Scalar> Rule<T> {
    pub fn new(x: Vec<T>, w: Vec<T>, a: T, b: T) -> Self {
        assert_eq!(x.len(), w.len(), "nodes and weights must have the same length");
        Rule { x, w, a, b }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Affinely map the rule onto [a, b].
    pub fn reseat(&self, a: T, b: T) -> Self {
        let scaling = (b.clone() - a.clone()) / (self.b.clone() - self.a.clone());
        let half = T::from_f64(0.5);
        let mid_old = (self.b.clone() + self.a.clone()) * half.clone();
        let mid_new = (b.clone() + a.clone()) * half;
        let x = self
            .x
            .iter()
            .map(|xi| scaling.clone() * (xi.clone() - mid_old.clone()) + mid_new.clone())
            .collect();
        let w = self.w.iter().map(|wi| wi.clone() * scaling.clone()).collect();
        Rule { x, w, a, b }
    }

    /// Composite rule over the mesh given by `edges`.
    pub fn piecewise(&self, edges: &[T]) -> Self {
        assert!(edges.len() >= 2, "a mesh needs at least two edges");
        for pair in edges.windows(2) {
            assert!(pair[0] < pair[1], "mesh edges must be strictly increasing");
        }
        let mut x = Vec::with_capacity(self.len() * (edges.len() - 1));
        let mut w = Vec::with_capacity(self.len() * (edges.len() - 1));
        for pair in edges.windows(2) {
            let local = self.reseat(pair[0].clone(), pair[1].clone());
            x.extend(local.x);
            w.extend(local.w);
        }
        Rule {
            x,
            w,
            a: edges[0].clone(),
            b: edges[edges.len() - 1].clone(),
        }
    }
}

/// Pₙ(x) and Pₙ'(x) by the Bonnet recurrence, differentiated alongside.
fn legendre_p_and_derivative<T: Scalar>(n: usize, x: &T) -> (T, T) {
    if n == 0 {
        return (T::from_f64(1.0), T::from_f64(0.0));
    }
    let mut p_prev = T::from_f64(1.0);
    let mut p = x.clone();
    let mut dp_prev = T::from_f64(0.0);
    let mut dp = T::from_f64(1.0);
    for k in 2..=n {
        let kf = T::from_f64(k as f64);
        let a = T::from_f64((2 * k - 1) as f64);
        let b = T::from_f64((k - 1) as f64);
        let p_next = (a.clone() * x.clone() * p.clone() - b.clone() * p_prev.clone()) / kf.clone();
        let dp_next =
            (a * (p.clone() + x.clone() * dp.clone()) - b * dp_prev.clone()) / kf;
        p_prev = p;
        p = p_next;
        dp_prev = dp;
        dp = dp_next;
    }
    (p, dp)
}

/// n-point Gauss-Legendre rule on [−1, 1] at the scalar's working precision.
///
/// Roots start from the Chebyshev estimate in double precision and are
/// polished by Newton iteration, which roughly doubles the correct bits per
/// step, so a handful of iterations reach any requested precision.
pub fn legendre<T: Scalar>(n: usize) -> Rule<T> {
    assert!(n >= 1, "a quadrature rule needs at least one node");
    if n == 1 {
        return Rule::new(
            vec![T::from_f64(0.0)],
            vec![T::from_f64(2.0)],
            T::from_f64(-1.0),
            T::from_f64(1.0),
        );
    }
    let mut x = vec![T::zero(); n];
    let mut w = vec![T::zero(); n];
    let m = (n + 1) / 2;
    let eps = T::epsilon();
    for i in 0..m {
        let guess =
            (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut z = T::from_f64(guess);
        for _ in 0..100 {
            let (p, dp) = legendre_p_and_derivative(n, &z);
            let dz = p / dp;
            z = z - dz.clone();
            if dz.abs() <= eps {
                break;
            }
        }
        let (_, dp) = legendre_p_and_derivative(n, &z);
        let one = T::from_f64(1.0);
        let weight =
            T::from_f64(2.0) / ((one - z.clone() * z.clone()) * dp.clone() * dp);
        x[i] = -z.clone();
        x[n - 1 - i] = z;
        w[i] = weight.clone();
        w[n - 1 - i] = weight;
    }
    Rule::new(x, w, T::from_f64(-1.0), T::from_f64(1.0))
}

type NodeTable = (Vec<MpReal>, Vec<MpReal>);

static GAUSS_CACHE: Lazy<Mutex<HashMap<(usize, usize), NodeTable>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Memoised arbitrary-precision rule at the current default precision.
pub fn legendre_mpreal(n: usize) -> Rule<MpReal> {
    let key = (n, current_precision());
    {
        let cache = GAUSS_CACHE.lock().unwrap();
        if let Some((x, w)) = cache.get(&key) {
            return Rule::new(
                x.clone(),
                w.clone(),
                MpReal::from_f64(-1.0),
                MpReal::from_f64(1.0),
            );
        }
    }
    let rule = legendre::<MpReal>(n);
    let mut cache = GAUSS_CACHE.lock().unwrap();
    cache.insert(key, (rule.x.clone(), rule.w.clone()));
    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use mpnum::with_precision;

    #[test]
    fn weights_sum_to_interval_length() {
        for n in [1, 2, 5, 16, 24] {
            let rule = legendre::<f64>(n);
            let total: f64 = rule.w.iter().sum();
            assert_abs_diff_eq!(total, 2.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn nodes_are_sorted_and_symmetric() {
        let rule = legendre::<f64>(12);
        for pair in rule.x.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for i in 0..12 {
            assert_abs_diff_eq!(rule.x[i], -rule.x[11 - i], epsilon = 1e-15);
        }
    }

    #[test]
    fn integrates_polynomials_exactly() {
        // n points are exact through degree 2n−1.
        let rule = legendre::<f64>(6);
        let value: f64 = rule
            .x
            .iter()
            .zip(&rule.w)
            .map(|(x, w)| w * x.powi(10))
            .sum();
        assert_abs_diff_eq!(value, 2.0 / 11.0, epsilon = 1e-14);
    }

    #[test]
    fn reseat_preserves_integrals() {
        let rule = legendre::<f64>(8).reseat(0.0, 0.5);
        let value: f64 = rule.x.iter().zip(&rule.w).map(|(x, w)| w * x * x).sum();
        assert_abs_diff_eq!(value, 0.5_f64.powi(3) / 3.0, epsilon = 1e-15);
    }

    #[test]
    fn piecewise_matches_single_interval() {
        let base = legendre::<f64>(10);
        let composite = base.piecewise(&[0.0, 0.3, 0.7, 1.0]);
        assert_eq!(composite.len(), 30);
        let value: f64 = composite
            .x
            .iter()
            .zip(&composite.w)
            .map(|(x, w)| w * (3.0 * x).sin())
            .sum();
        let exact = (1.0 - (3.0_f64).cos()) / 3.0;
        assert_abs_diff_eq!(value, exact, epsilon = 1e-13);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn piecewise_rejects_unsorted_edges() {
        legendre::<f64>(4).piecewise(&[0.0, 0.7, 0.3, 1.0]);
    }

    #[test]
    fn mpreal_rule_refines_beyond_double() {
        with_precision(167, || {
            let rule = legendre_mpreal(24);
            let total = rule
                .w
                .iter()
                .fold(MpReal::from_f64(0.0), |acc, w| &acc + w);
            let err = (&total - &MpReal::from_f64(2.0)).abs().to_f64();
            assert!(err < 1e-45, "weight sum error {err}");
        });
    }

    #[test]
    fn cache_is_keyed_by_precision() {
        let coarse = with_precision(64, || legendre_mpreal(8));
        let fine = with_precision(167, || legendre_mpreal(8));
        assert_eq!(coarse.x[0].precision(), 64);
        assert_eq!(fine.x[0].precision(), 167);
        let again = with_precision(64, || legendre_mpreal(8));
        assert_eq!(again.x[3], coarse.x[3]);
    }
}
