//! Piecewise polynomials on an ordered break-point sequence.
//!
//! A function is represented on each section [xₛ, xₛ₊₁) by the monomial
//! expansion Σₚ a[s,p]·(x − xₛ)ᵖ. The coefficient matrix has one row per
//! section and order+1 columns. All mesh-sensitive operations (addition,
//! subtraction, multiplication, overlap) require identical break points and
//! fail with [`Error::MeshMismatch`] otherwise.

use std::fmt;
use std::str::FromStr;

use mpnum::{MpReal, Scalar};
use ndarray::Array2;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PiecewisePolynomial<T> {
    order: usize,
    section_edges: Vec<T>,
    coeff: Array2<T>,
}

impl<T: Scalar> PiecewisePolynomial<T> {
    /// Construct from break points and a coefficient matrix of shape
    /// (num_sections, order + 1).
    pub fn new(section_edges: Vec<T>, coeff: Array2<T>) -> Result<Self> {
        if section_edges.len() < 2 {
            return Err(Error::InvalidArgument(
                "a piecewise polynomial needs at least two section edges".into(),
            ));
        }
        if coeff.ncols() == 0 {
            return Err(Error::InvalidArgument(
                "coefficient matrix must have at least one column".into(),
            ));
        }
        if coeff.nrows() != section_edges.len() - 1 {
            return Err(Error::InvalidArgument(format!(
                "coefficient matrix has {} rows for {} sections",
                coeff.nrows(),
                section_edges.len() - 1
            )));
        }
        for pair in section_edges.windows(2) {
            if pair[0] >= pair[1] {
                return Err(Error::InvalidArgument(
                    "section edges must be strictly increasing".into(),
                ));
            }
        }
        Ok(PiecewisePolynomial {
            order: coeff.ncols() - 1,
            section_edges,
            coeff,
        })
    }

    /// Zero function of the given order on the given mesh.
    pub fn zero(order: usize, section_edges: Vec<T>) -> Result<Self> {
        let n_s = section_edges.len().saturating_sub(1);
        Self::new(section_edges, Array2::zeros((n_s, order + 1)))
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_sections(&self) -> usize {
        self.section_edges.len() - 1
    }

    pub fn section_edge(&self, i: usize) -> &T {
        &self.section_edges[i]
    }

    pub fn section_edges(&self) -> &[T] {
        &self.section_edges
    }

    pub fn coefficient(&self, s: usize, p: usize) -> &T {
        &self.coeff[[s, p]]
    }

    pub fn coefficients(&self) -> &Array2<T> {
        &self.coeff
    }

    fn section_width(&self, s: usize) -> T {
        self.section_edges[s + 1].clone() - self.section_edges[s].clone()
    }

    /// Section containing `x`; both domain endpoints resolve to the adjacent
    /// terminal section.
    pub fn find_section(&self, x: &T) -> Result<usize> {
        let first = &self.section_edges[0];
        let last = &self.section_edges[self.section_edges.len() - 1];
        if x < first || x > last {
            return Err(Error::OutOfDomain(x.to_f64()));
        }
        if x == first {
            return Ok(0);
        }
        if x == last {
            return Ok(self.num_sections() - 1);
        }
        Ok(self.section_edges.partition_point(|edge| edge <= x) - 1)
    }

    /// Value at `x`.
    pub fn value(&self, x: &T) -> Result<T> {
        let s = self.find_section(x)?;
        Ok(self.value_in_section(x, s))
    }

    /// Value at `x`, which must lie in section `s`.
    pub fn value_in_section(&self, x: &T, s: usize) -> T {
        let dx = x.clone() - self.section_edges[s].clone();
        let mut result = self.coeff[[s, self.order]].clone();
        for p in (0..self.order).rev() {
            result = result * dx.clone() + self.coeff[[s, p]].clone();
        }
        result
    }

    /// m-th derivative at `x` by coefficient shifting. `section` overrides
    /// the lookup, which callers use to pick a side at a break point.
    pub fn derivative(&self, x: &T, m: usize, section: Option<usize>) -> Result<T> {
        let s = match section {
            Some(s) => {
                if s >= self.num_sections() {
                    return Err(Error::InvalidArgument(format!(
                        "section index {s} out of range"
                    )));
                }
                s
            }
            None => self.find_section(x)?,
        };
        let mut shifted: Vec<T> = (0..=self.order).map(|p| self.coeff[[s, p]].clone()).collect();
        for _ in 0..m {
            for p in 0..self.order {
                shifted[p] = T::from_f64((p + 1) as f64) * shifted[p + 1].clone();
            }
            shifted[self.order] = T::zero();
        }
        let dx = x.clone() - self.section_edges[s].clone();
        let mut result = shifted[self.order].clone();
        for p in (0..self.order).rev() {
            result = result * dx.clone() + shifted[p].clone();
        }
        Ok(result)
    }

    fn check_same_mesh(&self, other: &Self) -> Result<()> {
        if self.section_edges != other.section_edges {
            return Err(Error::MeshMismatch);
        }
        Ok(())
    }

    fn element_wise(&self, other: &Self, minus: bool) -> Result<Self> {
        self.check_same_mesh(other)?;
        let order = self.order.max(other.order);
        let n_s = self.num_sections();
        let mut coeff: Array2<T> = Array2::zeros((n_s, order + 1));
        for s in 0..n_s {
            for p in 0..=order {
                let a = if p <= self.order {
                    self.coeff[[s, p]].clone()
                } else {
                    T::zero()
                };
                let b = if p <= other.order {
                    other.coeff[[s, p]].clone()
                } else {
                    T::zero()
                };
                coeff[[s, p]] = if minus { a - b } else { a + b };
            }
        }
        Self::new(self.section_edges.clone(), coeff)
    }

    /// f + g on a shared mesh; the shorter coefficient rows are zero-padded
    /// up to order max(k₁, k₂).
    pub fn try_add(&self, other: &Self) -> Result<Self> {
        self.element_wise(other, false)
    }

    /// f − g on a shared mesh.
    pub fn try_sub(&self, other: &Self) -> Result<Self> {
        self.element_wise(other, true)
    }

    pub fn scale(&self, factor: &T) -> Self {
        let mut coeff = self.coeff.clone();
        for value in coeff.iter_mut() {
            *value = value.clone() * factor.clone();
        }
        PiecewisePolynomial {
            order: self.order,
            section_edges: self.section_edges.clone(),
            coeff,
        }
    }

    /// Product f·g of order k₁ + k₂ on a shared mesh.
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        self.check_same_mesh(other)?;
        let order = self.order + other.order;
        let n_s = self.num_sections();
        let mut coeff: Array2<T> = Array2::zeros((n_s, order + 1));
        for s in 0..n_s {
            for p1 in 0..=self.order {
                for p2 in 0..=other.order {
                    coeff[[s, p1 + p2]] = coeff[[s, p1 + p2]].clone()
                        + self.coeff[[s, p1]].clone() * other.coeff[[s, p2]].clone();
                }
            }
        }
        Self::new(self.section_edges.clone(), coeff)
    }

    /// Bilinear overlap ⟨f|g⟩ = Σₛ Σₚ,q aₛₚ·bₛq·Δxₛ^{p+q+1}/(p+q+1); the
    /// L² inner product for real scalars.
    pub fn overlap(&self, other: &Self) -> Result<T> {
        self.check_same_mesh(other)?;
        let mut total = T::zero();
        for s in 0..self.num_sections() {
            let dx = self.section_width(s);
            // Powers Δx^{p+q+1} for p+q up to k₁+k₂.
            let max_power = self.order + other.order + 1;
            let mut dx_power = Vec::with_capacity(max_power + 1);
            dx_power.push(T::from_f64(1.0));
            for p in 1..=max_power {
                let prev = dx_power[p - 1].clone();
                dx_power.push(prev * dx.clone());
            }
            for p in 0..=self.order {
                for q in 0..=other.order {
                    let weight = dx_power[p + q + 1].clone() / T::from_f64((p + q + 1) as f64);
                    total = total + self.coeff[[s, p]].clone() * other.coeff[[s, q]].clone() * weight;
                }
            }
        }
        Ok(total)
    }

    pub fn squared_norm(&self) -> T {
        self.overlap(self).expect("overlap with itself cannot mismatch")
    }

    /// Definite integral over the full mesh.
    pub fn integrate(&self) -> T {
        let mut total = T::zero();
        for s in 0..self.num_sections() {
            let dx = self.section_width(s);
            let mut dx_power = dx.clone();
            for p in 0..=self.order {
                total = total
                    + self.coeff[[s, p]].clone() * dx_power.clone() / T::from_f64((p + 1) as f64);
                dx_power = dx_power * dx.clone();
            }
        }
        total
    }
}

impl<T: Scalar> PartialEq for PiecewisePolynomial<T> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self.section_edges == other.section_edges
            && self.coeff == other.coeff
    }
}

/// Gram–Schmidt orthonormalization against the overlap form.
pub fn orthonormalize<T: Scalar>(polys: &mut [PiecewisePolynomial<T>]) -> Result<()> {
    for l in 0..polys.len() {
        let mut current = polys[l].clone();
        for l2 in 0..l {
            let projection = polys[l2].overlap(&polys[l])?;
            current = current.try_sub(&polys[l2].scale(&projection))?;
        }
        let norm = current.squared_norm().sqrt();
        if norm.is_zero() {
            return Err(Error::NumericalFailure(
                "orthonormalization hit a linearly dependent function".into(),
            ));
        }
        polys[l] = current.scale(&(T::from_f64(1.0) / norm));
    }
    Ok(())
}

/// Text form: precision, order, number of sections, the break points, then
/// the coefficients section by section, one token per line, all reals at
/// `bits2digits(precision)` decimal digits.
impl fmt::Display for PiecewisePolynomial<MpReal> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = self.section_edges[0].precision();
        writeln!(f, "{prec}")?;
        writeln!(f, "{}", self.order)?;
        writeln!(f, "{}", self.num_sections())?;
        for edge in &self.section_edges {
            writeln!(f, "{}", edge.with_prec(prec))?;
        }
        for s in 0..self.num_sections() {
            for p in 0..=self.order {
                writeln!(f, "{}", self.coeff[[s, p]].with_prec(prec))?;
            }
        }
        Ok(())
    }
}

pub(crate) fn next_token<'a>(
    tokens: &mut std::str::SplitWhitespace<'a>,
    what: &str,
) -> Result<&'a str> {
    tokens
        .next()
        .ok_or_else(|| Error::Io(format!("unexpected end of input, expected {what}")))
}

pub(crate) fn parse_usize(tokens: &mut std::str::SplitWhitespace<'_>, what: &str) -> Result<usize> {
    next_token(tokens, what)?
        .parse()
        .map_err(|e| Error::Io(format!("bad {what}: {e}")))
}

impl PiecewisePolynomial<MpReal> {
    /// Parse the serialized form from a token stream; used by the basis-level
    /// reader, which embeds several polynomials in one file.
    pub(crate) fn read_tokens(tokens: &mut std::str::SplitWhitespace<'_>) -> Result<Self> {
        let prec = parse_usize(tokens, "precision")?;
        let order = parse_usize(tokens, "order")?;
        let n_s = parse_usize(tokens, "num_sections")?;
        let mut edges = Vec::with_capacity(n_s + 1);
        for _ in 0..=n_s {
            edges.push(MpReal::from_decimal_str(next_token(tokens, "section edge")?, prec)?);
        }
        let mut coeff: Array2<MpReal> = Array2::zeros((n_s, order + 1));
        for s in 0..n_s {
            for p in 0..=order {
                coeff[[s, p]] =
                    MpReal::from_decimal_str(next_token(tokens, "coefficient")?, prec)?;
            }
        }
        PiecewisePolynomial::new(edges, coeff)
    }
}

impl FromStr for PiecewisePolynomial<MpReal> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split_whitespace();
        Self::read_tokens(&mut tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use mpnum::with_precision;

    fn sample(edges: &[f64], rows: &[&[f64]]) -> PiecewisePolynomial<f64> {
        let k = rows[0].len() - 1;
        let mut coeff = Array2::zeros((rows.len(), k + 1));
        for (s, row) in rows.iter().enumerate() {
            for (p, &value) in row.iter().enumerate() {
                coeff[[s, p]] = value;
            }
        }
        PiecewisePolynomial::new(edges.to_vec(), coeff).unwrap()
    }

    #[test]
    fn construction_validates_shape_and_mesh() {
        let coeff = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            PiecewisePolynomial::new(vec![0.0, 1.0], coeff.clone()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            PiecewisePolynomial::new(vec![0.0, 0.6, 0.4], coeff),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn find_section_boundaries() {
        let f = sample(&[0.0, 0.25, 0.5, 1.0], &[&[1.0], &[2.0], &[3.0]]);
        assert_eq!(f.find_section(&0.0).unwrap(), 0);
        assert_eq!(f.find_section(&1.0).unwrap(), 2);
        assert_eq!(f.find_section(&0.25).unwrap(), 1);
        assert_eq!(f.find_section(&0.3).unwrap(), 1);
        assert!(matches!(f.find_section(&1.5), Err(Error::OutOfDomain(_))));
    }

    #[test]
    fn evaluation_uses_local_offset() {
        // f(x) = 2 + 3(x − 0.5) on [0.5, 1].
        let f = sample(&[0.0, 0.5, 1.0], &[&[0.0, 1.0], &[2.0, 3.0]]);
        assert_abs_diff_eq!(f.value(&0.25).unwrap(), 0.25, epsilon = 1e-15);
        assert_abs_diff_eq!(f.value(&0.75).unwrap(), 2.75, epsilon = 1e-15);
        // Terminal endpoint evaluates in the last section with dx = Δx.
        assert_abs_diff_eq!(f.value(&1.0).unwrap(), 3.5, epsilon = 1e-15);
    }

    #[test]
    fn derivative_by_coefficient_shifting() {
        // f(x) = 1 + 2dx + 3dx² on a single section.
        let f = sample(&[0.0, 1.0], &[&[1.0, 2.0, 3.0]]);
        assert_abs_diff_eq!(f.derivative(&0.5, 1, None).unwrap(), 2.0 + 6.0 * 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(f.derivative(&0.5, 2, None).unwrap(), 6.0, epsilon = 1e-15);
        assert_abs_diff_eq!(f.derivative(&0.5, 3, None).unwrap(), 0.0, epsilon = 1e-15);
        // Section override wins over the lookup.
        let g = sample(&[0.0, 0.5, 1.0], &[&[0.0, 1.0], &[0.5, 2.0]]);
        assert_abs_diff_eq!(g.derivative(&0.5, 1, Some(0)).unwrap(), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(g.derivative(&0.5, 1, Some(1)).unwrap(), 2.0, epsilon = 1e-15);
    }

    #[test]
    fn arithmetic_laws() {
        let f = sample(&[0.0, 0.5, 1.0], &[&[1.0, 2.0, 0.5], &[0.0, 1.0, 1.5]]);
        let g = sample(&[0.0, 0.5, 1.0], &[&[2.0, -1.0], &[1.0, 0.0]]);
        let alpha = 1.75;

        // (α·f) + g == α·f + g pointwise, and the order is max(k₁, k₂).
        let lhs = f.scale(&alpha).try_add(&g).unwrap();
        assert_eq!(lhs.order(), 2);
        for &x in &[0.1, 0.45, 0.5, 0.77, 1.0] {
            let expected = alpha * f.value(&x).unwrap() + g.value(&x).unwrap();
            assert_abs_diff_eq!(lhs.value(&x).unwrap(), expected, epsilon = 1e-13);
        }

        // (f + g) − g == f, including f's higher coefficients.
        let back = f.try_add(&g).unwrap().try_sub(&g).unwrap();
        for &x in &[0.0, 0.3, 0.5, 0.9, 1.0] {
            assert_abs_diff_eq!(back.value(&x).unwrap(), f.value(&x).unwrap(), epsilon = 1e-13);
        }

        // The zero function is the additive identity.
        let zero = PiecewisePolynomial::zero(f.order(), vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(f.try_add(&zero).unwrap(), f);

        // Product order adds.
        let product = f.multiply(&g).unwrap();
        assert_eq!(product.order(), f.order() + g.order());
        assert_abs_diff_eq!(
            product.value(&0.3).unwrap(),
            f.value(&0.3).unwrap() * g.value(&0.3).unwrap(),
            epsilon = 1e-13
        );
    }

    #[test]
    fn mesh_mismatch_is_an_error() {
        let f = sample(&[0.0, 0.5, 1.0], &[&[1.0], &[2.0]]);
        let g = sample(&[0.0, 0.6, 1.0], &[&[1.0], &[2.0]]);
        assert!(matches!(f.try_add(&g), Err(Error::MeshMismatch)));
        assert!(matches!(f.try_sub(&g), Err(Error::MeshMismatch)));
        assert!(matches!(f.multiply(&g), Err(Error::MeshMismatch)));
        assert!(matches!(f.overlap(&g), Err(Error::MeshMismatch)));
    }

    #[test]
    fn overlap_is_the_l2_inner_product() {
        // ∫₀¹ x·x² dx = 1/4 with f, g on a two-section mesh.
        let f = sample(&[0.0, 0.5, 1.0], &[&[0.0, 1.0], &[0.5, 1.0]]);
        let g = f.multiply(&f).unwrap();
        assert_abs_diff_eq!(f.overlap(&g).unwrap(), 0.25, epsilon = 1e-14);
        assert_abs_diff_eq!(f.squared_norm(), 1.0 / 3.0, epsilon = 1e-14);
        assert_abs_diff_eq!(f.integrate(), 0.5, epsilon = 1e-14);
    }

    #[test]
    fn gram_schmidt_orthonormalizes() {
        let edges = vec![0.0, 0.5, 1.0];
        let mut polys = vec![
            sample(&edges, &[&[1.0, 0.0], &[1.0, 0.0]]),
            sample(&edges, &[&[0.0, 1.0], &[0.5, 1.0]]),
            sample(&edges, &[&[0.1, 0.3], &[0.7, -0.2]]),
        ];
        orthonormalize(&mut polys).unwrap();
        for i in 0..3 {
            for j in 0..=i {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(polys[i].overlap(&polys[j]).unwrap(), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn serialization_round_trip_is_structural_equality() {
        with_precision(128, || {
            let edges = vec![
                MpReal::from_f64(0.0),
                MpReal::from_f64(0.375),
                MpReal::from_f64(1.0),
            ];
            let mut coeff: Array2<MpReal> = Array2::zeros((2, 3));
            let values = [[0.25, -1.5, 0.125], [1.0 / 3.0, 0.75, -2.0]];
            for s in 0..2 {
                for p in 0..3 {
                    coeff[[s, p]] = MpReal::from_f64(values[s][p]);
                }
            }
            let f = PiecewisePolynomial::new(edges, coeff).unwrap();
            let text = f.to_string();
            let g: PiecewisePolynomial<MpReal> = text.parse().unwrap();
            assert_eq!(g.order(), f.order());
            assert_eq!(g.num_sections(), f.num_sections());
            let x = MpReal::from_f64(0.5);
            let diff = (&f.value(&x).unwrap() - &g.value(&x).unwrap()).abs().to_f64();
            assert!(diff < 1e-36, "round-trip drift {diff}");
        });
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "128\n2\nnot_a_number\n".parse::<PiecewisePolynomial<MpReal>>();
        assert!(matches!(err, Err(Error::Io(_))));
        let err = "128\n2\n".parse::<PiecewisePolynomial<MpReal>>();
        assert!(matches!(err, Err(Error::Io(_))));
    }
}
