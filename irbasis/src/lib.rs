//! # irbasis: intermediate representation basis of analytic-continuation kernels
//!
//! Computes the leading singular triplets {sₗ, uₗ(x), vₗ(y)} of the
//! fermionic and bosonic analytic-continuation kernels on [−1, 1]², as
//! piecewise polynomials at arbitrary precision, and their transform to
//! Matsubara frequencies.
//!
//! The pipeline: a kernel is split into even and odd parity sectors on the
//! half domain, discretised with a local Legendre basis and composite
//! Gauss-Legendre quadrature on adaptive meshes, factorised by an
//! arbitrary-precision Jacobi SVD, and the meshes are refined until the
//! coefficient tail of the last admitted singular vector is below tolerance.

pub mod basis;
pub mod error;
pub mod gauss;
pub mod kernel;
pub mod matsubara;
pub mod poly;
pub mod special_functions;
pub mod sve;
pub mod traits;

pub use basis::{compute_basis, BasisSet};
pub use error::{Error, Result};
pub use gauss::{legendre, legendre_mpreal, Rule};
pub use kernel::{BosonicKernel, FermionicKernel, KernelBase, Parity, ReducedKernel};
pub use matsubara::compute_transformation_to_matsubara;
pub use poly::{orthonormalize, PiecewisePolynomial};
pub use special_functions::{normalized_legendre_p, normalized_legendre_p_derivatives};
pub use sve::{compute_sve, SveParams, SveResult};
pub use traits::Statistics;

// Re-export the scalar types callers interact with.
pub use mpnum::{bits2digits, with_precision, MpComplex, MpReal, PrecisionGuard};
