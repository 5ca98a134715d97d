//! Scalar abstraction shared by the quadrature, assembly and SVD code.
//!
//! Bounded by `Clone` rather than `Copy` so the arbitrary-precision scalar
//! can implement it alongside `f64`.

use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::real::{current_precision, MpReal};

pub trait Scalar:
    Clone
    + Debug
    + Display
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Zero
    + One
{
    fn from_f64(x: f64) -> Self;
    fn to_f64(&self) -> f64;
    fn abs(&self) -> Self;
    fn sqrt(&self) -> Self;
    /// Machine epsilon at the scalar's working precision.
    fn epsilon() -> Self;
    fn pi() -> Self;
}

impl Scalar for f64 {
    fn from_f64(x: f64) -> Self {
        x
    }

    fn to_f64(&self) -> f64 {
        *self
    }

    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }

    fn epsilon() -> Self {
        f64::EPSILON
    }

    fn pi() -> Self {
        std::f64::consts::PI
    }
}

impl Scalar for MpReal {
    fn from_f64(x: f64) -> Self {
        MpReal::from_f64(x)
    }

    fn to_f64(&self) -> f64 {
        MpReal::to_f64(self)
    }

    fn abs(&self) -> Self {
        MpReal::abs(self)
    }

    fn sqrt(&self) -> Self {
        MpReal::sqrt(self)
    }

    fn epsilon() -> Self {
        let bits = current_precision();
        MpReal::from_f64(0.5).powi(bits as i64 - 1)
    }

    fn pi() -> Self {
        MpReal::pi(current_precision())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::real::with_precision;

    #[test]
    fn epsilon_tracks_scope_precision() {
        assert_eq!(<f64 as Scalar>::epsilon(), f64::EPSILON);
        with_precision(100, || {
            let eps = <MpReal as Scalar>::epsilon();
            assert!(eps > MpReal::from_f64(0.0));
            assert!(eps < MpReal::from_f64(1e-29));
        });
    }

    #[test]
    fn generic_pi() {
        fn circumference<T: Scalar>(r: f64) -> f64 {
            (T::pi() * T::from_f64(2.0 * r)).to_f64()
        }
        assert!((circumference::<f64>(1.0) - 2.0 * std::f64::consts::PI).abs() < 1e-15);
        assert!((circumference::<MpReal>(1.0) - 2.0 * std::f64::consts::PI).abs() < 1e-14);
    }
}
