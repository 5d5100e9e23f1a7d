//! Arithmetic modulo a prime, the field all shares and gate outputs live in.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by field construction and inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The modulus must be a prime for Fermat inversion to be sound.
    #[error("{0} is not a prime")]
    NotPrime(u64),
    /// Zero has no multiplicative inverse.
    #[error("zero has no multiplicative inverse")]
    ZeroInverse,
}

/// An element of a prime field, always normalized into `[0, P)`.
///
/// Elements can only be created through a [`Field`], which guarantees the normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldElement(u64);

impl FieldElement {
    /// The canonical representative of the element.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The prime field `Z/PZ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    prime: u64,
}

impl Field {
    /// Creates the field for the given modulus, which must be prime.
    pub fn new(prime: u64) -> Result<Self, FieldError> {
        if !is_prime(prime) {
            return Err(FieldError::NotPrime(prime));
        }
        Ok(Self { prime })
    }

    /// The modulus `P`.
    pub fn prime(&self) -> u64 {
        self.prime
    }

    /// Reduces an integer into the field.
    pub fn element(&self, value: u64) -> FieldElement {
        FieldElement(value % self.prime)
    }

    /// Reduces a signed integer into the field, e.g. `-1` becomes `P - 1`.
    pub fn element_from_signed(&self, value: i64) -> FieldElement {
        FieldElement(i128::from(value).rem_euclid(i128::from(self.prime)) as u64)
    }

    /// The additive identity.
    pub fn zero(&self) -> FieldElement {
        FieldElement(0)
    }

    /// The multiplicative identity.
    pub fn one(&self) -> FieldElement {
        FieldElement(1 % self.prime)
    }

    /// `a + b mod P`.
    pub fn add(&self, a: FieldElement, b: FieldElement) -> FieldElement {
        FieldElement(((u128::from(a.0) + u128::from(b.0)) % u128::from(self.prime)) as u64)
    }

    /// `a - b mod P`.
    pub fn sub(&self, a: FieldElement, b: FieldElement) -> FieldElement {
        let p = u128::from(self.prime);
        FieldElement(((u128::from(a.0) + p - u128::from(b.0)) % p) as u64)
    }

    /// `a * b mod P`.
    pub fn mul(&self, a: FieldElement, b: FieldElement) -> FieldElement {
        FieldElement(((u128::from(a.0) * u128::from(b.0)) % u128::from(self.prime)) as u64)
    }

    /// Square-and-multiply exponentiation.
    pub fn pow(&self, base: FieldElement, mut exp: u64) -> FieldElement {
        let mut result = self.one();
        let mut base = base;
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            exp >>= 1;
        }
        result
    }

    /// Multiplicative inverse via Fermat's little theorem, `a^(P-2)`.
    pub fn inverse(&self, a: FieldElement) -> Result<FieldElement, FieldError> {
        if a.0 == 0 {
            return Err(FieldError::ZeroInverse);
        }
        Ok(self.pow(a, self.prime - 2))
    }

    /// `a * b^-1 mod P`, fails for `b = 0`.
    pub fn div(&self, a: FieldElement, b: FieldElement) -> Result<FieldElement, FieldError> {
        Ok(self.mul(a, self.inverse(b)?))
    }

    /// Draws an element uniformly from `[0, P)`.
    pub fn random(&self, rng: &mut impl Rng) -> FieldElement {
        FieldElement(rng.random_range(0..self.prime))
    }

    /// Sum of all elements, `0` for an empty sequence.
    pub fn sum(&self, elements: impl IntoIterator<Item = FieldElement>) -> FieldElement {
        elements
            .into_iter()
            .fold(self.zero(), |acc, x| self.add(acc, x))
    }

    /// Product of all elements, `1` for an empty sequence.
    pub fn product(&self, elements: impl IntoIterator<Item = FieldElement>) -> FieldElement {
        elements
            .into_iter()
            .fold(self.one(), |acc, x| self.mul(acc, x))
    }
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(m)) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// Deterministic Miller-Rabin, exact for all 64-bit integers with these witnesses.
fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for p in WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }
    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn rejects_composite_moduli() {
        for n in [0, 1, 4, 100, 561, 100_001, 1_000_000_006] {
            assert_eq!(Field::new(n), Err(FieldError::NotPrime(n)));
        }
        for p in [2, 11, 101, 1_009, 100_003, 1_000_000_007, 18_446_744_073_709_551_557] {
            assert!(Field::new(p).is_ok(), "{p} should be accepted");
        }
    }

    #[test]
    fn arithmetic_mod_101() -> Result<(), FieldError> {
        let f = Field::new(101)?;
        assert_eq!(f.add(f.element(99), f.element(50)).value(), 48);
        assert_eq!(f.sub(f.element(3), f.element(5)).value(), 99);
        assert_eq!(f.mul(f.element(20), f.element(40)).value(), 93);
        assert_eq!(f.element_from_signed(-1).value(), 100);
        assert_eq!(f.div(f.element(1), f.element(2))?.value(), 51);
        assert_eq!(f.inverse(f.zero()), Err(FieldError::ZeroInverse));
        Ok(())
    }

    #[test]
    fn empty_folds() -> Result<(), FieldError> {
        let f = Field::new(101)?;
        assert_eq!(f.sum(Vec::<FieldElement>::new()), f.zero());
        assert_eq!(f.product(Vec::<FieldElement>::new()), f.one());
        let xs = [99, 50, 55, 10, 13].map(|x| f.element(x));
        assert_eq!(f.sum(xs).value(), 25);
        Ok(())
    }

    #[test]
    fn random_elements_stay_in_range() -> Result<(), FieldError> {
        let f = Field::new(11)?;
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..1_000 {
            assert!(f.random(&mut rng).value() < 11);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn inverse_roundtrip(a in 1u64..1_000_000_007) {
            let f = Field::new(1_000_000_007).unwrap();
            let a = f.element(a);
            prop_assert_eq!(f.mul(a, f.inverse(a).unwrap()), f.one());
        }

        #[test]
        fn sub_undoes_add(a: u64, b: u64) {
            let f = Field::new(18_446_744_073_709_551_557).unwrap();
            let (a, b) = (f.element(a), f.element(b));
            prop_assert_eq!(f.sub(f.add(a, b), b), a);
        }
    }
}
