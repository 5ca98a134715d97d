//! Analytic-continuation kernels on [−1, 1] × [−1, 1].
//!
//! Both kernels are evaluated with branch cuts that keep the exponentials
//! bounded for large |Λy|, so they stay numerically stable over the whole
//! coupling range. `eval` runs at arbitrary precision for matrix assembly;
//! `eval_f64` is the cheap double-precision path used by the bootstrap
//! discretisation, where underflow to zero is harmless.

use mpnum::MpReal;

use crate::traits::Statistics;

/// Threshold on Λ·y beyond which the cosh/sinh denominators are replaced by
/// their dominant exponential.
const BRANCH_LIMIT: f64 = 100.0;

/// Callable kernel with its statistics and coupling as side channels.
pub trait KernelBase {
    fn eval(&self, x: &MpReal, y: &MpReal) -> MpReal;
    fn eval_f64(&self, x: f64, y: f64) -> f64;
    fn statistics(&self) -> Statistics;
    fn lambda(&self) -> f64;
}

/// Fermionic kernel K(x, y) = exp(−½Λxy) / (2·cosh(½Λy)).
#[derive(Debug, Clone, Copy)]
pub struct FermionicKernel {
    lambda: f64,
}

impl FermionicKernel {
    pub fn new(lambda: f64) -> Self {
        assert!(lambda > 0.0, "lambda must be positive");
        FermionicKernel { lambda }
    }
}

impl KernelBase for FermionicKernel {
    fn eval(&self, x: &MpReal, y: &MpReal) -> MpReal {
        let half_lambda = MpReal::from_f64(0.5 * self.lambda);
        let minus_half_lxy = -(&half_lambda * &(x * y));
        let ly = self.lambda * y.to_f64();
        if ly > BRANCH_LIMIT {
            (minus_half_lxy - &half_lambda * y).exp()
        } else if ly < -BRANCH_LIMIT {
            (minus_half_lxy + &half_lambda * y).exp()
        } else {
            let denom = MpReal::from_f64(2.0) * (&half_lambda * y).cosh();
            minus_half_lxy.exp() / denom
        }
    }

    fn eval_f64(&self, x: f64, y: f64) -> f64 {
        let ly = self.lambda * y;
        if ly > BRANCH_LIMIT {
            (-0.5 * self.lambda * x * y - 0.5 * self.lambda * y).exp()
        } else if ly < -BRANCH_LIMIT {
            (-0.5 * self.lambda * x * y + 0.5 * self.lambda * y).exp()
        } else {
            (-0.5 * self.lambda * x * y).exp() / (2.0 * (0.5 * self.lambda * y).cosh())
        }
    }

    fn statistics(&self) -> Statistics {
        Statistics::Fermionic
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }
}

/// Bosonic kernel K(x, y) = y·exp(−½Λxy) / (2·sinh(½Λy)).
#[derive(Debug, Clone, Copy)]
pub struct BosonicKernel {
    lambda: f64,
}

impl BosonicKernel {
    pub fn new(lambda: f64) -> Self {
        assert!(lambda > 0.0, "lambda must be positive");
        BosonicKernel { lambda }
    }
}

impl KernelBase for BosonicKernel {
    fn eval(&self, x: &MpReal, y: &MpReal) -> MpReal {
        let half_lambda = MpReal::from_f64(0.5 * self.lambda);
        let minus_half_lxy = -(&half_lambda * &(x * y));
        let ly = self.lambda * y.to_f64();
        if ly.abs() < 1e-10 {
            // y/(2 sinh(½Λy)) → 1/Λ
            minus_half_lxy.exp() / MpReal::from_f64(self.lambda)
        } else if ly > BRANCH_LIMIT {
            y * (minus_half_lxy - &half_lambda * y).exp()
        } else if ly < -BRANCH_LIMIT {
            -(y * (minus_half_lxy + &half_lambda * y).exp())
        } else {
            let denom = MpReal::from_f64(2.0) * (&half_lambda * y).sinh();
            y * minus_half_lxy.exp() / denom
        }
    }

    fn eval_f64(&self, x: f64, y: f64) -> f64 {
        let ly = self.lambda * y;
        if ly.abs() < 1e-10 {
            (-0.5 * self.lambda * x * y).exp() / self.lambda
        } else if ly > BRANCH_LIMIT {
            y * (-0.5 * self.lambda * x * y - 0.5 * self.lambda * y).exp()
        } else if ly < -BRANCH_LIMIT {
            -y * (-0.5 * self.lambda * x * y + 0.5 * self.lambda * y).exp()
        } else {
            y * (-0.5 * self.lambda * x * y).exp() / (2.0 * (0.5 * self.lambda * y).sinh())
        }
    }

    fn statistics(&self) -> Statistics {
        Statistics::Bosonic
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }
}

/// Parity sector of the even/odd decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn sign(self) -> f64 {
        match self {
            Parity::Even => 1.0,
            Parity::Odd => -1.0,
        }
    }

    /// Sector a basis index l belongs to.
    pub fn of_index(l: usize) -> Parity {
        if l % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// View of a kernel restricted to the half-domain y ∈ [0, 1]:
/// K_red(x, y) = K(x, y) ± K(x, −y).
#[derive(Debug, Clone, Copy)]
pub struct ReducedKernel<'a, K> {
    inner: &'a K,
    parity: Parity,
}

impl<'a, K: KernelBase> ReducedKernel<'a, K> {
    pub fn new(inner: &'a K, parity: Parity) -> Self {
        ReducedKernel { inner, parity }
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn eval(&self, x: &MpReal, y: &MpReal) -> MpReal {
        let plus = self.inner.eval(x, y);
        let minus = self.inner.eval(x, &-y);
        match self.parity {
            Parity::Even => plus + minus,
            Parity::Odd => plus - minus,
        }
    }

    pub fn eval_f64(&self, x: f64, y: f64) -> f64 {
        let plus = self.inner.eval_f64(x, y);
        let minus = self.inner.eval_f64(x, -y);
        plus + self.parity.sign() * minus
    }
}
