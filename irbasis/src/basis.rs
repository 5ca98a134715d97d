//! The computed IR basis: singular values and singular functions.
//!
//! A [`BasisSet`] owns the identity of its kernel (statistics and Λ), the
//! admitted singular values and the left/right singular functions on the
//! half-interval mesh, normalised to unit overlap on [0, 1]. Evaluation on
//! the full domain [−1, 1] extends each function by its parity,
//! uₗ(−x) = (−1)ˡ·uₗ(x).

use std::fmt;
use std::str::FromStr;

use mpnum::MpReal;
use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{Error, Result};
use crate::kernel::KernelBase;
use crate::matsubara::compute_transformation_to_matsubara;
use crate::poly::{next_token, parse_usize, PiecewisePolynomial};
use crate::sve::{compute_sve, SveParams};
use crate::traits::Statistics;

#[derive(Debug, Clone)]
pub struct BasisSet {
    statistics: Statistics,
    lambda: f64,
    s: Vec<MpReal>,
    u: Vec<PiecewisePolynomial<MpReal>>,
    v: Vec<PiecewisePolynomial<MpReal>>,
}

/// Compute the IR basis of `kernel`, truncated at `max_dim` functions or at
/// singular values below `cutoff`·s₀, whichever comes first.
pub fn compute_basis<K: KernelBase>(
    kernel: &K,
    max_dim: usize,
    cutoff: f64,
    params: &SveParams,
) -> Result<BasisSet> {
    let sve = compute_sve(kernel, max_dim, cutoff, params)?;
    Ok(BasisSet {
        statistics: kernel.statistics(),
        lambda: kernel.lambda(),
        s: sve.s,
        u: sve.u,
        v: sve.v,
    })
}

impl BasisSet {
    /// Number of admitted basis functions.
    pub fn dim(&self) -> usize {
        self.s.len()
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    fn check_index(&self, l: usize) -> Result<()> {
        if l >= self.dim() {
            return Err(Error::InvalidArgument(format!(
                "basis function index {l} out of range for dimension {}",
                self.dim()
            )));
        }
        Ok(())
    }

    pub fn singular_value(&self, l: usize) -> Result<f64> {
        self.check_index(l)?;
        Ok(self.s[l].to_f64())
    }

    pub fn singular_values(&self) -> Vec<f64> {
        self.s.iter().map(|s| s.to_f64()).collect()
    }

    /// l-th left singular function on the half-interval mesh.
    pub fn ulx(&self, l: usize) -> Result<&PiecewisePolynomial<MpReal>> {
        self.check_index(l)?;
        Ok(&self.u[l])
    }

    /// l-th right singular function on the half-interval mesh.
    pub fn vly(&self, l: usize) -> Result<&PiecewisePolynomial<MpReal>> {
        self.check_index(l)?;
        Ok(&self.v[l])
    }

    /// uₗ(x) for x ∈ [−1, 1], using the parity extension on the negative
    /// half-axis.
    pub fn value(&self, x: f64, l: usize) -> Result<f64> {
        self.check_index(l)?;
        if !(-1.0..=1.0).contains(&x) {
            return Err(Error::OutOfDomain(x));
        }
        let prec = self.u[l].section_edge(0).precision();
        let positive = MpReal::from_f64_prec(x.abs(), prec);
        let magnitude = self.u[l].value(&positive)?.to_f64();
        if x < 0.0 && l % 2 == 1 {
            Ok(-magnitude)
        } else {
            Ok(magnitude)
        }
    }

    /// All uₗ(x) at once.
    pub fn values(&self, x: f64) -> Result<Vec<f64>> {
        (0..self.dim()).map(|l| self.value(x, l)).collect()
    }

    /// Transformation matrix to Matsubara frequencies indexed by n.
    ///
    /// `n_vec` must be strictly ascending and non-negative; the statistics
    /// offset is applied internally (o = 2n + 1 for fermions, 2n for bosons).
    pub fn compute_tnl(&self, n_vec: &[i64]) -> Result<Array2<Complex64>> {
        if n_vec.iter().any(|&n| n < 0) {
            return Err(Error::InvalidArgument(
                "Matsubara indices must be non-negative".into(),
            ));
        }
        for pair in n_vec.windows(2) {
            if pair[0] >= pair[1] {
                return Err(Error::InvalidArgument(
                    "Matsubara indices must be strictly ascending".into(),
                ));
            }
        }
        let zeta = self.statistics.zeta();
        let o_vec: Vec<i64> = n_vec.iter().map(|&n| 2 * n + zeta).collect();
        compute_transformation_to_matsubara(&o_vec, self.statistics, &self.u)
    }

    /// Transformation matrix for raw frequency integers that already include
    /// the statistics offset.
    pub fn compute_tbar_ol(&self, o_vec: &[i64]) -> Result<Array2<Complex64>> {
        compute_transformation_to_matsubara(o_vec, self.statistics, &self.u)
    }
}

/// Text form of a whole basis: statistics, Λ, dimension, the precision of
/// the singular values, the singular values, then each uₗ and vₗ in the
/// piecewise-polynomial format.
impl fmt::Display for BasisSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.statistics.as_str())?;
        writeln!(f, "{:e}", self.lambda)?;
        writeln!(f, "{}", self.dim())?;
        let prec = self.s.first().map(|s| s.precision()).unwrap_or(53);
        writeln!(f, "{prec}")?;
        for s in &self.s {
            writeln!(f, "{}", s.with_prec(prec))?;
        }
        for u in &self.u {
            write!(f, "{u}")?;
        }
        for v in &self.v {
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl FromStr for BasisSet {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let statistics = match next_token(&mut tokens, "statistics")? {
            "fermionic" => Statistics::Fermionic,
            "bosonic" => Statistics::Bosonic,
            other => {
                return Err(Error::Io(format!("unknown statistics tag {other:?}")));
            }
        };
        let lambda: f64 = next_token(&mut tokens, "lambda")?
            .parse()
            .map_err(|e| Error::Io(format!("bad lambda: {e}")))?;
        let dim = parse_usize(&mut tokens, "dimension")?;
        let prec = parse_usize(&mut tokens, "precision")?;
        let mut s = Vec::with_capacity(dim);
        for _ in 0..dim {
            s.push(MpReal::from_decimal_str(
                next_token(&mut tokens, "singular value")?,
                prec,
            )?);
        }
        let mut u = Vec::with_capacity(dim);
        for _ in 0..dim {
            u.push(PiecewisePolynomial::read_tokens(&mut tokens)?);
        }
        let mut v = Vec::with_capacity(dim);
        for _ in 0..dim {
            v.push(PiecewisePolynomial::read_tokens(&mut tokens)?);
        }
        Ok(BasisSet {
            statistics,
            lambda,
            s,
            u,
            v,
        })
    }
}
