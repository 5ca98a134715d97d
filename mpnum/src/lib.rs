//! # mpnum: arbitrary-precision scalars and a Jacobi SVD
//!
//! Support crate for the IR-basis pipeline: an arbitrary-precision real
//! scalar with scoped default precision, its complex pair, and a one-sided
//! Jacobi SVD that runs over any scalar implementing [`Scalar`].

pub mod complex;
pub mod real;
pub mod scalar;
pub mod svd;

pub use complex::MpComplex;
pub use real::{
    bits2digits, current_precision, with_precision, MpReal, ParseRealError, PrecisionGuard,
    BASE_PRECISION,
};
pub use scalar::Scalar;
pub use svd::{jacobi_svd, matmul, SvdError, SvdResult};
