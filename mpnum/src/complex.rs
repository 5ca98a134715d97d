//! Complex pair of [`MpReal`] values with standard complex algebra.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_complex::Complex64;

use crate::real::MpReal;

/// Arbitrary-precision complex number.
#[derive(Debug, Clone, PartialEq)]
pub struct MpComplex {
    pub re: MpReal,
    pub im: MpReal,
}

impl MpComplex {
    pub fn new(re: MpReal, im: MpReal) -> Self {
        MpComplex { re, im }
    }

    pub fn from_f64(re: f64, im: f64) -> Self {
        MpComplex {
            re: MpReal::from_f64(re),
            im: MpReal::from_f64(im),
        }
    }

    pub fn zero() -> Self {
        MpComplex::from_f64(0.0, 0.0)
    }

    /// e^{iθ} = cos θ + i sin θ.
    pub fn exp_i(theta: &MpReal) -> Self {
        let (s, c) = theta.sin_cos();
        MpComplex { re: c, im: s }
    }

    pub fn conj(&self) -> Self {
        MpComplex {
            re: self.re.clone(),
            im: -&self.im,
        }
    }

    pub fn norm_sqr(&self) -> MpReal {
        &(&self.re * &self.re) + &(&self.im * &self.im)
    }

    pub fn scale(&self, factor: &MpReal) -> Self {
        MpComplex {
            re: &self.re * factor,
            im: &self.im * factor,
        }
    }

    pub fn to_complex64(&self) -> Complex64 {
        Complex64::new(self.re.to_f64(), self.im.to_f64())
    }
}

impl fmt::Display for MpComplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.re, self.im)
    }
}

impl Add for MpComplex {
    type Output = MpComplex;
    fn add(self, rhs: MpComplex) -> MpComplex {
        MpComplex {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl<'a> Add<&'a MpComplex> for &'a MpComplex {
    type Output = MpComplex;
    fn add(self, rhs: &'a MpComplex) -> MpComplex {
        MpComplex {
            re: &self.re + &rhs.re,
            im: &self.im + &rhs.im,
        }
    }
}

impl Sub for MpComplex {
    type Output = MpComplex;
    fn sub(self, rhs: MpComplex) -> MpComplex {
        MpComplex {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl<'a> Sub<&'a MpComplex> for &'a MpComplex {
    type Output = MpComplex;
    fn sub(self, rhs: &'a MpComplex) -> MpComplex {
        MpComplex {
            re: &self.re - &rhs.re,
            im: &self.im - &rhs.im,
        }
    }
}

impl Mul for MpComplex {
    type Output = MpComplex;
    fn mul(self, rhs: MpComplex) -> MpComplex {
        (&self).mul(&rhs)
    }
}

impl<'a> Mul<&'a MpComplex> for &'a MpComplex {
    type Output = MpComplex;
    fn mul(self, rhs: &'a MpComplex) -> MpComplex {
        MpComplex {
            re: &(&self.re * &rhs.re) - &(&self.im * &rhs.im),
            im: &(&self.re * &rhs.im) + &(&self.im * &rhs.re),
        }
    }
}

impl Div for MpComplex {
    type Output = MpComplex;
    fn div(self, rhs: MpComplex) -> MpComplex {
        (&self).div(&rhs)
    }
}

impl<'a> Div<&'a MpComplex> for &'a MpComplex {
    type Output = MpComplex;
    fn div(self, rhs: &'a MpComplex) -> MpComplex {
        let denom = rhs.norm_sqr();
        let num = self.mul(&rhs.conj());
        MpComplex {
            re: &num.re / &denom,
            im: &num.im / &denom,
        }
    }
}

impl Neg for MpComplex {
    type Output = MpComplex;
    fn neg(self) -> MpComplex {
        MpComplex {
            re: -self.re,
            im: -self.im,
        }
    }
}

impl Neg for &MpComplex {
    type Output = MpComplex;
    fn neg(self) -> MpComplex {
        MpComplex {
            re: -&self.re,
            im: -&self.im,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::real::PrecisionGuard;
    use approx::assert_abs_diff_eq;

    #[test]
    fn complex_algebra() {
        let _guard = PrecisionGuard::new(128);
        let a = MpComplex::from_f64(1.0, 2.0);
        let b = MpComplex::from_f64(3.0, -1.0);
        let p = (&a * &b).to_complex64();
        assert_abs_diff_eq!(p.re, 5.0, epsilon = 1e-30);
        assert_abs_diff_eq!(p.im, 5.0, epsilon = 1e-30);

        let q = (&a / &b).to_complex64();
        let expected = Complex64::new(1.0, 2.0) / Complex64::new(3.0, -1.0);
        assert_abs_diff_eq!(q.re, expected.re, epsilon = 1e-15);
        assert_abs_diff_eq!(q.im, expected.im, epsilon = 1e-15);
    }

    #[test]
    fn unit_phase() {
        let _guard = PrecisionGuard::new(160);
        let theta = MpReal::from_f64(2.3);
        let z = MpComplex::exp_i(&theta);
        assert_abs_diff_eq!(z.norm_sqr().to_f64(), 1.0, epsilon = 1e-30);
        assert_abs_diff_eq!(z.to_complex64().re, 2.3_f64.cos(), epsilon = 1e-15);
        assert_abs_diff_eq!(z.to_complex64().im, 2.3_f64.sin(), epsilon = 1e-15);
    }
}
