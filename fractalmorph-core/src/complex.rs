use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// A complex number represented as two `f64` components.
///
/// This is a lightweight, `Copy` type optimized for the tight iteration loop.
/// We roll our own instead of using `num::Complex` to keep the dependency graph
/// minimal and retain full control over the arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

    #[inline]
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Returns `re² + im²` without taking the square root.
    #[inline]
    pub fn norm_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    /// Returns `√(re² + im²)`.
    #[inline]
    pub fn norm(self) -> f64 {
        self.norm_sq().sqrt()
    }

    #[inline]
    pub fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    /// Principal square root, with a non-negative real part.
    pub fn sqrt(self) -> Self {
        let r = self.norm();
        if r == 0.0 {
            return Self::ZERO;
        }
        let re = ((r + self.re) / 2.0).sqrt();
        let im = ((r - self.re) / 2.0).sqrt();
        Self::new(re, if self.im < 0.0 { -im } else { im })
    }

    /// Raises `self` to a non-negative integer power by repeated squaring.
    pub fn powi(self, n: u32) -> Self {
        let mut base = self;
        let mut acc = Self::new(1.0, 0.0);
        let mut exp = n;
        while exp > 0 {
            if exp & 1 == 1 {
                acc *= base;
            }
            base *= base;
            exp >>= 1;
        }
        acc
    }

    /// Raises `self` to a real power via the principal branch of `exp(p * ln(self))`.
    pub fn powf(self, p: f64) -> Self {
        if self.re == 0.0 && self.im == 0.0 {
            return Self::ZERO;
        }
        (self.ln() * p).exp()
    }

    /// Principal complex logarithm, with `im` in `(-pi, pi]`.
    pub fn ln(self) -> Self {
        Self::new(self.norm().ln(), self.im.atan2(self.re))
    }

    pub fn exp(self) -> Self {
        let mag = self.re.exp();
        Self::new(mag * self.im.cos(), mag * self.im.sin())
    }

    pub fn cos(self) -> Self {
        Self::new(
            self.re.cos() * self.im.cosh(),
            -self.re.sin() * self.im.sinh(),
        )
    }
}

// -- Arithmetic operators --

impl Add for Complex {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl AddAssign for Complex {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.re += rhs.re;
        self.im += rhs.im;
    }
}

impl Sub for Complex {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl SubAssign for Complex {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.re -= rhs.re;
        self.im -= rhs.im;
    }
}

impl Mul for Complex {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

impl MulAssign for Complex {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Div for Complex {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.norm_sq();
        let numer = self * rhs.conj();
        Self {
            re: numer.re / denom,
            im: numer.im / denom,
        }
    }
}

impl Neg for Complex {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            re: -self.re,
            im: -self.im,
        }
    }
}

/// Scalar multiplication: `Complex * f64`.
impl Mul<f64> for Complex {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self {
            re: self.re * rhs,
            im: self.im * rhs,
        }
    }
}

impl std::fmt::Display for Complex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.im >= 0.0 {
            write!(f, "{} + {}i", self.re, self.im)
        } else {
            write!(f, "{} - {}i", self.re, -self.im)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn zero_constant() {
        let z = Complex::ZERO;
        assert_eq!(z.re, 0.0);
        assert_eq!(z.im, 0.0);
    }

    #[test]
    fn addition() {
        let a = Complex::new(1.0, 2.0);
        let b = Complex::new(3.0, 4.0);
        let c = a + b;
        assert!(approx_eq(c.re, 4.0));
        assert!(approx_eq(c.im, 6.0));
    }

    #[test]
    fn subtraction() {
        let a = Complex::new(5.0, 3.0);
        let b = Complex::new(2.0, 1.0);
        let c = a - b;
        assert!(approx_eq(c.re, 3.0));
        assert!(approx_eq(c.im, 2.0));
    }

    #[test]
    fn multiplication() {
        // (1 + 2i)(3 + 4i) = 3 + 4i + 6i + 8i² = 3 + 10i - 8 = -5 + 10i
        let a = Complex::new(1.0, 2.0);
        let b = Complex::new(3.0, 4.0);
        let c = a * b;
        assert!(approx_eq(c.re, -5.0));
        assert!(approx_eq(c.im, 10.0));
    }

    #[test]
    fn scalar_multiplication() {
        let a = Complex::new(2.0, 3.0);
        let c = a * 4.0;
        assert!(approx_eq(c.re, 8.0));
        assert!(approx_eq(c.im, 12.0));
    }

    #[test]
    fn negation() {
        let a = Complex::new(1.0, -2.0);
        let b = -a;
        assert!(approx_eq(b.re, -1.0));
        assert!(approx_eq(b.im, 2.0));
    }

    #[test]
    fn norm_sq() {
        let a = Complex::new(3.0, 4.0);
        assert!(approx_eq(a.norm_sq(), 25.0));
    }

    #[test]
    fn norm() {
        let a = Complex::new(3.0, 4.0);
        assert!(approx_eq(a.norm(), 5.0));
    }

    #[test]
    fn squaring() {
        // z² where z = 1 + i → (1+i)(1+i) = 1 + 2i - 1 = 0 + 2i
        let z = Complex::new(1.0, 1.0);
        let z2 = z * z;
        assert!(approx_eq(z2.re, 0.0));
        assert!(approx_eq(z2.im, 2.0));
    }

    #[test]
    fn division_is_inverse_of_multiplication() {
        let a = Complex::new(3.0, -2.0);
        let b = Complex::new(1.5, 0.5);
        let c = (a * b) / b;
        assert!(approx_eq(c.re, a.re));
        assert!(approx_eq(c.im, a.im));
    }

    #[test]
    fn sqrt_has_nonnegative_real_part() {
        let z = Complex::new(-4.0, 0.0);
        let root = z.sqrt();
        assert!(root.re >= 0.0);
        assert!(approx_eq(root.re, 0.0));
        assert!(approx_eq(root.im, 2.0));
    }

    #[test]
    fn sqrt_squared_recovers_input() {
        let z = Complex::new(3.0, -5.0);
        let root = z.sqrt();
        let back = root * root;
        assert!(approx_eq(back.re, z.re));
        assert!(approx_eq(back.im, z.im));
    }

    #[test]
    fn powi_matches_repeated_multiplication() {
        let z = Complex::new(1.1, -0.4);
        let by_pow = z.powi(4);
        let by_mul = z * z * z * z;
        assert!(approx_eq(by_pow.re, by_mul.re));
        assert!(approx_eq(by_pow.im, by_mul.im));
    }

    #[test]
    fn ln_then_exp_is_identity() {
        let z = Complex::new(1.7, -2.3);
        let back = z.ln().exp();
        assert!(approx_eq(back.re, z.re));
        assert!(approx_eq(back.im, z.im));
    }

    #[test]
    fn cos_of_real_matches_real_cos() {
        let z = Complex::new(0.5, 0.0);
        let c = z.cos();
        assert!(approx_eq(c.re, 0.5f64.cos()));
        assert!(approx_eq(c.im, 0.0));
    }
}
