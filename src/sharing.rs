//! Shamir secret sharing: splitting a value into shares and recovering it by Lagrange
//! interpolation at zero.
//!
//! The shares of party `p` are the evaluations of a random polynomial at `x = p`, so every
//! party id doubles as its evaluation point.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use thiserror::Error;

use crate::{
    circuit::PartyId,
    field::{Field, FieldElement, FieldError},
};

/// The shares of a single value, indexed by the party holding them.
pub type Shares = BTreeMap<PartyId, FieldElement>;

/// Errors raised while interpolating shares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharingError {
    /// A share required for reconstruction was not provided.
    #[error("the share of party {party} is missing")]
    MissingShare {
        /// The party whose share is missing.
        party: PartyId,
    },
    /// Two shares use the same evaluation point.
    #[error("evaluation point {0} is used twice")]
    DuplicatePoint(PartyId),
    /// An evaluation point coincides with the secret at `x = 0`.
    #[error("evaluation point {0} is zero in the field")]
    ZeroPoint(PartyId),
    /// Interpolation needs at least one point.
    #[error("no shares to interpolate")]
    EmptyInterpolationSet,
    /// A field operation failed.
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Splits `value` into shares for parties `1..=parties` using a random polynomial of the given
/// degree, so that any `degree + 1` shares determine the value and fewer reveal nothing.
pub fn split(
    field: &Field,
    value: FieldElement,
    degree: usize,
    parties: usize,
    rng: &mut impl Rng,
) -> Shares {
    let coefficients: Vec<FieldElement> = (0..degree).map(|_| field.random(rng)).collect();
    split_with_coefficients(field, value, &coefficients, parties)
}

/// Splits `value` using the polynomial `value + c[0]·x + c[1]·x² + …`.
pub fn split_with_coefficients(
    field: &Field,
    value: FieldElement,
    coefficients: &[FieldElement],
    parties: usize,
) -> Shares {
    (1..=parties)
        .map(|party| {
            let x = field.element(party as u64);
            let higher = coefficients
                .iter()
                .rev()
                .fold(field.zero(), |acc, &c| field.add(field.mul(acc, x), c));
            (party, field.add(field.mul(higher, x), value))
        })
        .collect()
}

/// The Lagrange basis coefficients for interpolating at `x = 0` from the given points.
///
/// `basis[i] = Π_{j≠i} x_j / (x_j - x_i)`.
pub fn lagrange_basis(
    field: &Field,
    points: &[PartyId],
) -> Result<Vec<FieldElement>, SharingError> {
    if points.is_empty() {
        return Err(SharingError::EmptyInterpolationSet);
    }
    let mut seen = HashSet::new();
    let mut xs = Vec::with_capacity(points.len());
    for &p in points {
        let x = field.element(p as u64);
        if x == field.zero() {
            return Err(SharingError::ZeroPoint(p));
        }
        if !seen.insert(x) {
            return Err(SharingError::DuplicatePoint(p));
        }
        xs.push(x);
    }
    let mut basis = Vec::with_capacity(xs.len());
    for (i, &xi) in xs.iter().enumerate() {
        let mut numerator = field.one();
        let mut denominator = field.one();
        for (j, &xj) in xs.iter().enumerate() {
            if i != j {
                numerator = field.mul(numerator, xj);
                denominator = field.mul(denominator, field.sub(xj, xi));
            }
        }
        basis.push(field.div(numerator, denominator)?);
    }
    Ok(basis)
}

/// Interpolates the polynomial through the given `(point, share)` pairs at `x = 0`.
pub fn interpolate(
    field: &Field,
    shares: &[(PartyId, FieldElement)],
) -> Result<FieldElement, SharingError> {
    let points: Vec<PartyId> = shares.iter().map(|(p, _)| *p).collect();
    let basis = lagrange_basis(field, &points)?;
    Ok(field.sum(
        basis
            .into_iter()
            .zip(shares)
            .map(|(l, (_, share))| field.mul(l, *share)),
    ))
}

/// Reconstructs the shared value from the shares of parties `1..=degree_bound`.
///
/// A sharing of degree `T` needs `degree_bound = T + 1`. Shares of a product of two degree `T`
/// sharings have degree `2T` and need at least `2T + 1` points.
pub fn reconstruct(
    field: &Field,
    shares: &Shares,
    degree_bound: usize,
) -> Result<FieldElement, SharingError> {
    let points = (1..=degree_bound)
        .map(|party| match shares.get(&party) {
            Some(share) => Ok((party, *share)),
            None => Err(SharingError::MissingShare { party }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    interpolate(field, &points)
}
