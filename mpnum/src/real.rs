//! Arbitrary-precision real scalar backed by `dashu-float`.
//!
//! `MpReal` wraps a binary `FBig` and carries its precision (in bits) as a
//! per-value attribute. Mixed-precision arithmetic adopts the larger operand
//! precision, which is dashu's native behaviour. The default precision for
//! newly created values is controlled by a thread-local scope stack: entering
//! a scope pushes a precision, dropping the guard pops it, so the previous
//! default is restored on every exit path, including unwinding.
//!
//! dashu provides exp/ln/sqrt but no trigonometric or hyperbolic functions,
//! so sin/cos are summed from their Taylor series after argument reduction
//! modulo 2π, the hyperbolics are derived from exp, and π comes from
//! Machin's formula, memoised per precision.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;
use std::sync::Mutex;

use dashu_base::Abs;
use dashu_float::round::mode;
use dashu_float::FBig;
use once_cell::sync::Lazy;

/// Decimal companion of the binary [`FBig`], sharing its rounding mode so
/// base conversions keep the type parameters aligned.
type Decimal = FBig<mode::Zero, 10>;

/// Base default precision when no scope is active.
pub const BASE_PRECISION: usize = 53;

/// Guard bits used internally by the elementary functions.
const GUARD_BITS: usize = 32;

thread_local! {
    static PRECISION_STACK: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Current default precision in bits for newly created values.
pub fn current_precision() -> usize {
    PRECISION_STACK.with(|stack| stack.borrow().last().copied().unwrap_or(BASE_PRECISION))
}

/// Scope handle for the default precision.
///
/// Construction pushes `bits` onto the thread-local stack; dropping the guard
/// pops it again. Because the pop lives in `Drop`, the previous default is
/// restored even when the scope is left by a panic.
#[derive(Debug)]
pub struct PrecisionGuard {
    _private: (),
}

impl PrecisionGuard {
    pub fn new(bits: usize) -> Self {
        assert!(bits >= 2, "precision must be at least 2 bits");
        PRECISION_STACK.with(|stack| stack.borrow_mut().push(bits));
        PrecisionGuard { _private: () }
    }
}

impl Drop for PrecisionGuard {
    fn drop(&mut self) {
        PRECISION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `f` with `bits` as the default precision.
pub fn with_precision<R>(bits: usize, f: impl FnOnce() -> R) -> R {
    let _guard = PrecisionGuard::new(bits);
    f()
}

/// Number of reliable decimal digits for a binary precision.
pub fn bits2digits(bits: usize) -> usize {
    (bits as f64 * std::f64::consts::LOG10_2).floor() as usize
}

/// Error produced when parsing a decimal string into an [`MpReal`].
#[derive(Debug, Clone)]
pub struct ParseRealError {
    pub message: String,
}

impl fmt::Display for ParseRealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid real literal: {}", self.message)
    }
}

impl std::error::Error for ParseRealError {}

/// Arbitrary-precision real number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MpReal(FBig);

static PI_CACHE: Lazy<Mutex<HashMap<usize, FBig>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn fbig_from_f64(x: f64, bits: usize) -> FBig {
    if !x.is_finite() {
        panic!("cannot represent non-finite value {x} as MpReal");
    }
    match FBig::try_from(x) {
        Ok(v) => v.with_precision(bits).value(),
        Err(_) => panic!("cannot represent {x} as MpReal"),
    }
}

/// arctan(1/k) by its Taylor series, at `bits` working precision.
fn atan_inv(k: u64, bits: usize) -> FBig {
    let one = fbig_from_f64(1.0, bits);
    let kf = fbig_from_f64(k as f64, bits);
    let x = &one / &kf;
    let x2 = &x * &x;
    let mut power = x.clone();
    let mut sum = x;
    let mut j = 1u64;
    loop {
        power = &power * &x2;
        let term = &power / fbig_from_f64((2 * j + 1) as f64, bits);
        let next = if j % 2 == 1 { &sum - &term } else { &sum + &term };
        if next == sum {
            break;
        }
        sum = next;
        j += 1;
    }
    sum
}

fn pi_fbig(bits: usize) -> FBig {
    let mut cache = PI_CACHE.lock().unwrap();
    if let Some(value) = cache.get(&bits) {
        return value.clone();
    }
    // Machin: π = 16·atan(1/5) − 4·atan(1/239).
    let wp = bits + GUARD_BITS;
    let pi = (atan_inv(5, wp) * fbig_from_f64(16.0, wp)
        - atan_inv(239, wp) * fbig_from_f64(4.0, wp))
    .with_precision(bits)
    .value();
    cache.insert(bits, pi.clone());
    pi
}

impl MpReal {
    /// Create a value at the current default precision.
    pub fn from_f64(x: f64) -> Self {
        MpReal(fbig_from_f64(x, current_precision()))
    }

    /// Create a value at an explicit precision.
    pub fn from_f64_prec(x: f64, bits: usize) -> Self {
        MpReal(fbig_from_f64(x, bits))
    }

    /// π at the given precision.
    pub fn pi(bits: usize) -> Self {
        MpReal(pi_fbig(bits))
    }

    /// Precision of this value in bits.
    pub fn precision(&self) -> usize {
        self.0.precision()
    }

    /// Round or extend this value to `bits` bits.
    pub fn with_prec(&self, bits: usize) -> Self {
        MpReal(self.0.clone().with_precision(bits).value())
    }

    /// Nearest double.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().value()
    }

    pub fn is_zero_value(&self) -> bool {
        self.0 == FBig::<mode::Zero>::ZERO
    }

    pub fn abs(&self) -> Self {
        MpReal(self.0.clone().abs())
    }

    pub fn sqrt(&self) -> Self {
        MpReal(dashu_base::SquareRoot::sqrt(&self.0))
    }

    pub fn exp(&self) -> Self {
        MpReal(self.0.exp())
    }

    /// Integer power by binary exponentiation.
    pub fn powi(&self, mut n: i64) -> Self {
        let bits = self.precision();
        let negative = n < 0;
        if negative {
            n = -n;
        }
        let mut result = fbig_from_f64(1.0, bits);
        let mut base = self.0.clone();
        let mut e = n as u64;
        while e > 0 {
            if e & 1 == 1 {
                result = &result * &base;
            }
            base = &base * &base;
            e >>= 1;
        }
        if negative {
            result = fbig_from_f64(1.0, bits) / result;
        }
        MpReal(result)
    }

    pub fn sin(&self) -> Self {
        let (s, _) = self.sin_cos();
        s
    }

    pub fn cos(&self) -> Self {
        let (_, c) = self.sin_cos();
        c
    }

    /// Simultaneous sine and cosine.
    pub fn sin_cos(&self) -> (Self, Self) {
        let bits = self.precision();
        let wp = bits + GUARD_BITS;
        let x = self.0.clone().with_precision(wp).value();
        let two_pi = pi_fbig(wp) * fbig_from_f64(2.0, wp);
        // Reduce modulo 2π; the quotient fits comfortably in a double for any
        // argument this crate produces.
        let q = (&x / &two_pi).to_f64().value().round();
        let r = if q == 0.0 {
            x
        } else {
            x - &two_pi * fbig_from_f64(q, wp)
        };
        let r2 = &r * &r;

        // sin: Σ (−1)^k r^{2k+1}/(2k+1)!
        let mut term = r.clone();
        let mut sum_sin = r.clone();
        let mut k = 1u64;
        loop {
            term = &term * &r2 / fbig_from_f64((2 * k * (2 * k + 1)) as f64, wp);
            let next = if k % 2 == 1 { &sum_sin - &term } else { &sum_sin + &term };
            if next == sum_sin {
                break;
            }
            sum_sin = next;
            k += 1;
        }

        // cos: Σ (−1)^k r^{2k}/(2k)!
        let mut term = fbig_from_f64(1.0, wp);
        let mut sum_cos = term.clone();
        let mut k = 1u64;
        loop {
            term = &term * &r2 / fbig_from_f64((2 * k * (2 * k - 1)) as f64, wp);
            let next = if k % 2 == 1 { &sum_cos - &term } else { &sum_cos + &term };
            if next == sum_cos {
                break;
            }
            sum_cos = next;
            k += 1;
        }

        (
            MpReal(sum_sin.with_precision(bits).value()),
            MpReal(sum_cos.with_precision(bits).value()),
        )
    }

    pub fn cosh(&self) -> Self {
        let bits = self.precision();
        let wp = bits + GUARD_BITS;
        let e = self.0.clone().with_precision(wp).value().exp();
        let inv = fbig_from_f64(1.0, wp) / &e;
        MpReal(((e + inv) / fbig_from_f64(2.0, wp)).with_precision(bits).value())
    }

    pub fn sinh(&self) -> Self {
        let bits = self.precision();
        let wp = bits + GUARD_BITS;
        let x = self.0.clone().with_precision(wp).value();
        // Cancellation near zero; sum the series there instead.
        if self.abs().to_f64() < 9.765625e-4 {
            let x2 = &x * &x;
            let mut term = x.clone();
            let mut sum = x;
            let mut k = 1u64;
            loop {
                term = &term * &x2 / fbig_from_f64((2 * k * (2 * k + 1)) as f64, wp);
                let next = &sum + &term;
                if next == sum {
                    break;
                }
                sum = next;
                k += 1;
            }
            return MpReal(sum.with_precision(bits).value());
        }
        let e = x.exp();
        let inv = fbig_from_f64(1.0, wp) / &e;
        MpReal(((e - inv) / fbig_from_f64(2.0, wp)).with_precision(bits).value())
    }

    pub fn tanh(&self) -> Self {
        let bits = self.precision();
        // exp(2x) saturates every representable bit well before this point.
        if self.to_f64().abs() > (bits + GUARD_BITS) as f64 {
            let one = MpReal::from_f64_prec(1.0, bits);
            return if self.to_f64() > 0.0 { one } else { -one };
        }
        let wp = bits + GUARD_BITS;
        let two_x = self.0.clone().with_precision(wp).value() * fbig_from_f64(2.0, wp);
        let e2 = two_x.exp();
        let one = fbig_from_f64(1.0, wp);
        MpReal(((&e2 - &one) / (&e2 + &one)).with_precision(bits).value())
    }

    /// Decimal rendering at `bits2digits(precision)` significant digits.
    pub fn to_decimal_string(&self) -> String {
        let digits = bits2digits(self.precision()).max(1);
        let decimal = self
            .0
            .to_decimal()
            .value()
            .with_precision(digits)
            .value();
        decimal.to_string()
    }

    /// Parse a decimal literal at the given binary precision.
    pub fn from_decimal_str(s: &str, bits: usize) -> Result<Self, ParseRealError> {
        let decimal = Decimal::from_str(s.trim()).map_err(|e| ParseRealError {
            message: format!("{e} in {s:?}"),
        })?;
        Ok(MpReal(decimal.to_binary().value().with_precision(bits).value()))
    }
}

impl fmt::Display for MpReal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident) => {
        impl $trait for MpReal {
            type Output = MpReal;
            fn $method(self, rhs: MpReal) -> MpReal {
                MpReal(self.0.$method(rhs.0))
            }
        }

        impl<'a> $trait<&'a MpReal> for &'a MpReal {
            type Output = MpReal;
            fn $method(self, rhs: &'a MpReal) -> MpReal {
                MpReal((&self.0).$method(&rhs.0))
            }
        }

        impl<'a> $trait<&'a MpReal> for MpReal {
            type Output = MpReal;
            fn $method(self, rhs: &'a MpReal) -> MpReal {
                MpReal(self.0.$method(&rhs.0))
            }
        }

        impl<'a> $trait<MpReal> for &'a MpReal {
            type Output = MpReal;
            fn $method(self, rhs: MpReal) -> MpReal {
                MpReal((&self.0).$method(rhs.0))
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);
forward_binop!(Div, div);

impl Neg for MpReal {
    type Output = MpReal;
    fn neg(self) -> MpReal {
        MpReal(-self.0)
    }
}

impl Neg for &MpReal {
    type Output = MpReal;
    fn neg(self) -> MpReal {
        MpReal(-self.0.clone())
    }
}

impl num_traits::Zero for MpReal {
    fn zero() -> Self {
        MpReal::from_f64(0.0)
    }

    fn is_zero(&self) -> bool {
        self.0 == FBig::<mode::Zero>::ZERO
    }
}

impl num_traits::One for MpReal {
    fn one() -> Self {
        MpReal::from_f64(1.0)
    }
}
