//! Ready-made circuits together with private values for all of their parties.
//!
//! The numbered fixtures (see [`by_number`]) are the circuits the command line tool can run;
//! the parameterized constructors build larger instances of the same shapes, e.g. for benches.

use std::ops::RangeInclusive;

use thiserror::Error;

use crate::{
    circuit::{Circuit, CircuitError, CircuitParams, Gate, GateId, GateKind, Slot},
    field::{Field, FieldElement, FieldError},
};

use GateKind::{Add, Input, Mul};
use Slot::{Left, Right};

/// The numbers accepted by [`by_number`].
pub const NUMBERS: RangeInclusive<usize> = 1..=8;

/// A circuit and the private value of each of its parties.
#[derive(Debug, Clone)]
pub struct Fixture {
    /// A short human readable description.
    pub name: &'static str,
    /// The circuit, including the expected result.
    pub circuit: Circuit,
    /// `private_values[p - 1]` is the value of party `p`, already reduced into the field.
    pub private_values: Vec<u64>,
}

/// Errors raised when selecting or building a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    /// There is no fixture with this number.
    #[error("there is no circuit {0}, choose one of 1 to 8")]
    Unknown(usize),
    /// The parameters do not describe a circuit.
    #[error("{0}")]
    Circuit(#[from] CircuitError),
    /// The modulus does not describe a field.
    #[error("{0}")]
    Field(#[from] FieldError),
    /// A generated circuit needs at least this many parties.
    #[error("{name} needs at least {min} inputs, got {got}")]
    TooFewInputs {
        /// The circuit family.
        name: &'static str,
        /// The smallest supported number of inputs.
        min: usize,
        /// The requested number of inputs.
        got: usize,
    },
}

/// Selects one of the numbered circuits.
pub fn by_number(n: usize) -> Result<Fixture, FixtureError> {
    match n {
        1 => textbook(),
        2 => factorial_tree(3, 2, 100_003),
        3 => sum_of_five(),
        4 => product_of_three(),
        5 => sum_then_product(),
        6 => sum_to(20, 1, 101),
        7 => power(3, 4, 1, 101),
        8 => squared_error(2),
        n => Err(FixtureError::Unknown(n)),
    }
}

fn fixture(
    name: &'static str,
    gates: Vec<(GateId, Gate)>,
    degree: usize,
    field: Field,
    values: &[FieldElement],
    expected: FieldElement,
) -> Result<Fixture, FixtureError> {
    let params = CircuitParams {
        parties: values.len(),
        degree,
        prime: field.prime(),
        expected: expected.value(),
    };
    Ok(Fixture {
        name,
        circuit: Circuit::new(gates, params)?,
        private_values: values.iter().map(|v| v.value()).collect(),
    })
}

fn elements(field: &Field, values: &[u64]) -> Vec<FieldElement> {
    values.iter().map(|v| field.element(*v)).collect()
}

/// `x1·x2 + x3·x4 + x5·x6` for six parties with `T = 2` over `P = 101`.
pub fn textbook() -> Result<Fixture, FixtureError> {
    let f = Field::new(101)?;
    let x = elements(&f, &[20, 40, 21, 31, 1, 71]);
    let expected = f.sum([f.mul(x[0], x[1]), f.mul(x[2], x[3]), f.mul(x[4], x[5])]);
    let gates = vec![
        (1, Gate::new(Input, [(7, Left)])),
        (2, Gate::new(Input, [(7, Right)])),
        (3, Gate::new(Input, [(8, Left)])),
        (4, Gate::new(Input, [(8, Right)])),
        (5, Gate::new(Input, [(9, Left)])),
        (6, Gate::new(Input, [(9, Right)])),
        (7, Gate::new(Mul, [(10, Left)])),
        (8, Gate::new(Mul, [(10, Right)])),
        (9, Gate::new(Mul, [(11, Left)])),
        (10, Gate::new(Add, [(11, Right)])),
        (11, Gate::new(Add, [(12, Left)])),
    ];
    fixture("x1*x2 + x3*x4 + x5*x6", gates, 2, f, &x, expected)
}

/// The product of `1, 2, …, 2^levels`, multiplied pairwise in a balanced tree.
pub fn factorial_tree(levels: u32, degree: usize, prime: u64) -> Result<Fixture, FixtureError> {
    let f = Field::new(prime)?;
    let inputs = 1usize << levels;
    let x: Vec<FieldElement> = (1..=inputs as u64).map(|v| f.element(v)).collect();
    let expected = f.product(x.iter().copied());
    let mut gates = vec![];
    let mut first = 1;
    let mut width = inputs;
    while width >= 1 {
        let kind = if first == 1 { Input } else { Mul };
        let next = first + width;
        for (i, gate) in (first..next).enumerate() {
            let slot = if i % 2 == 0 { Left } else { Right };
            gates.push((gate, Gate::new(kind, [(next + i / 2, slot)])));
        }
        first = next;
        width /= 2;
    }
    fixture("factorial tree", gates, degree, f, &x, expected)
}

/// The sum of five private values, `99 + 50 + 55 + 10 + 13 = 25 mod 101`, with `T = 1`.
pub fn sum_of_five() -> Result<Fixture, FixtureError> {
    let f = Field::new(101)?;
    let x = elements(&f, &[99, 50, 55, 10, 13]);
    let expected = f.sum(x.iter().copied());
    let gates = vec![
        (1, Gate::new(Input, [(6, Left)])),
        (2, Gate::new(Input, [(6, Right)])),
        (3, Gate::new(Input, [(7, Left)])),
        (4, Gate::new(Input, [(7, Right)])),
        (5, Gate::new(Input, [(9, Left)])),
        (6, Gate::new(Add, [(8, Left)])),
        (7, Gate::new(Add, [(8, Right)])),
        (8, Gate::new(Add, [(9, Right)])),
        (9, Gate::new(Add, [(10, Left)])),
    ];
    fixture("sum of five", gates, 1, f, &x, expected)
}

/// `x1·x2·x3` for three parties.
pub fn product_of_three() -> Result<Fixture, FixtureError> {
    let f = Field::new(101)?;
    let x = elements(&f, &[3, 4, 5]);
    let expected = f.product(x.iter().copied());
    let gates = vec![
        (1, Gate::new(Input, [(4, Left)])),
        (2, Gate::new(Input, [(4, Right)])),
        (3, Gate::new(Input, [(5, Left)])),
        (4, Gate::new(Mul, [(5, Right)])),
        (5, Gate::new(Mul, [(6, Left)])),
    ];
    fixture("x1*x2*x3", gates, 1, f, &x, expected)
}

/// `(x1 + x2)·x3` for three parties.
pub fn sum_then_product() -> Result<Fixture, FixtureError> {
    let f = Field::new(101)?;
    let x = elements(&f, &[3, 4, 5]);
    let expected = f.mul(f.add(x[0], x[1]), x[2]);
    let gates = vec![
        (1, Gate::new(Input, [(4, Left)])),
        (2, Gate::new(Input, [(4, Right)])),
        (3, Gate::new(Input, [(5, Left)])),
        (4, Gate::new(Add, [(5, Right)])),
        (5, Gate::new(Mul, [(6, Left)])),
    ];
    fixture("(x1+x2)*x3", gates, 1, f, &x, expected)
}

/// A chain folding the inputs of all parties into a single gate.
///
/// Gates `n+1 .. 2n-1` combine the running result with the next input, every wire uses slot 1.
fn chain(n: usize, kind: GateKind) -> Vec<(GateId, Gate)> {
    let mut gates = vec![
        (1, Gate::new(Input, [(n + 1, Left)])),
        (2, Gate::new(Input, [(n + 1, Left)])),
    ];
    for i in 3..=n {
        gates.push((i, Gate::new(Input, [(n + i - 1, Left)])));
    }
    for i in n + 1..2 * n {
        gates.push((i, Gate::new(kind, [(i + 1, Left)])));
    }
    gates
}

/// The sum of `1 + 2 + … + n`, each summand being the private value of one party.
pub fn sum_to(n: usize, degree: usize, prime: u64) -> Result<Fixture, FixtureError> {
    if n < 2 {
        return Err(FixtureError::TooFewInputs {
            name: "sum",
            min: 2,
            got: n,
        });
    }
    let f = Field::new(prime)?;
    let x: Vec<FieldElement> = (1..=n as u64).map(|v| f.element(v)).collect();
    let expected = f.element((n * (n + 1) / 2) as u64);
    fixture("sum of 1..n", chain(n, Add), degree, f, &x, expected)
}

/// `base^exp`, with each of the `exp` parties contributing one copy of `base`.
pub fn power(base: u64, exp: usize, degree: usize, prime: u64) -> Result<Fixture, FixtureError> {
    if exp < 2 {
        return Err(FixtureError::TooFewInputs {
            name: "power",
            min: 2,
            got: exp,
        });
    }
    let f = Field::new(prime)?;
    let x = vec![f.element(base); exp];
    let expected = f.pow(f.element(base), exp as u64);
    fixture("base^exp", chain(exp, Mul), degree, f, &x, expected)
}

/// The squared error of the estimate `3x + 9` against the target `2x + 1` for `x = 1..=points`.
///
/// Every point is contributed by three parties: the target, the estimate and `-1`. Input gates
/// fan out to two gates each, so that the difference `target + estimate·(-1)` is computed twice
/// and then squared. The errors of all points are summed up at the end. Uses `T = points`.
pub fn squared_error(points: usize) -> Result<Fixture, FixtureError> {
    if points < 1 {
        return Err(FixtureError::TooFewInputs {
            name: "squared error",
            min: 1,
            got: points,
        });
    }
    let f = Field::new(100_003)?;
    let parties = 3 * points;
    let first_sum = parties + 5 * points + 1;
    let mut x = Vec::with_capacity(parties);
    let mut gates = vec![];
    let mut expected = f.zero();
    for j in 0..points {
        let point = j as i64 + 1;
        let (target, estimate) = (2 * point + 1, 3 * point + 9);
        let (target, estimate) = (f.element_from_signed(target), f.element_from_signed(estimate));
        x.extend([target, estimate, f.element_from_signed(-1)]);
        let error = f.sub(target, estimate);
        expected = f.add(expected, f.mul(error, error));

        let inputs = 3 * j;
        let base = parties + 5 * j;
        let (neg1, diff1, neg2, diff2, square) = (base + 1, base + 2, base + 3, base + 4, base + 5);
        gates.push((inputs + 1, Gate::new(Input, [(diff1, Left), (diff2, Left)])));
        gates.push((inputs + 2, Gate::new(Input, [(neg1, Left), (neg2, Left)])));
        gates.push((inputs + 3, Gate::new(Input, [(neg1, Left), (neg2, Left)])));
        gates.push((neg1, Gate::new(Mul, [(diff1, Left)])));
        gates.push((diff1, Gate::new(Add, [(square, Left)])));
        gates.push((neg2, Gate::new(Mul, [(diff2, Left)])));
        gates.push((diff2, Gate::new(Add, [(square, Left)])));
        let sum = if j < 2 { first_sum } else { first_sum + j - 1 };
        gates.push((square, Gate::new(Mul, [(sum, Left)])));
    }
    for sum in first_sum..first_sum + points - 1 {
        gates.push((sum, Gate::new(Add, [(sum + 1, Left)])));
    }
    fixture("squared error", gates, points, f, &x, expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_fixtures_evaluate_to_their_expected_result() -> Result<(), FixtureError> {
        let expected = [7, 40_320, 25, 60, 35, 8, 81, 181];
        for (n, expected) in NUMBERS.zip(expected) {
            let fixture = by_number(n)?;
            let circuit = &fixture.circuit;
            assert_eq!(circuit.expected().value(), expected, "{}", fixture.name);
            assert_eq!(fixture.private_values.len(), circuit.parties());
            let f = circuit.field();
            let inputs = elements(f, &fixture.private_values);
            assert_eq!(circuit.evaluate_in_clear(&inputs)?, circuit.expected());
        }
        assert_eq!(by_number(9).unwrap_err(), FixtureError::Unknown(9));
        Ok(())
    }

    #[test]
    fn shapes_of_generated_circuits() -> Result<(), FixtureError> {
        let tree = factorial_tree(3, 2, 100_003)?.circuit;
        assert_eq!(tree.final_gate_id(), 16);
        assert_eq!(tree.operands(15), &[13, 14]);

        let sum = sum_to(20, 1, 101)?.circuit;
        assert_eq!(sum.final_gate_id(), 40);
        assert_eq!(sum.operands(21), &[1, 2]);
        assert_eq!(sum.operands(22), &[3, 21]);

        let loss = squared_error(2)?;
        assert_eq!(loss.circuit.final_gate_id(), 18);
        assert_eq!(loss.circuit.operands(17), &[11, 16]);
        assert_eq!(loss.private_values[2], 100_002);
        Ok(())
    }

    #[test]
    fn larger_instances() -> Result<(), FixtureError> {
        for points in 1..=4 {
            let loss = squared_error(points)?;
            let f = loss.circuit.field();
            let inputs = elements(f, &loss.private_values);
            assert_eq!(loss.circuit.evaluate_in_clear(&inputs)?, loss.circuit.expected());
        }
        let tree = factorial_tree(4, 3, 1_000_000_007)?;
        assert_eq!(tree.circuit.expected().value(), 20_922_789_888_000 % 1_000_000_007);
        assert_eq!(
            power(2, 10, 1, 1_009)?.circuit.expected().value(),
            1024 % 1_009
        );
        assert!(matches!(
            sum_to(1, 0, 101),
            Err(FixtureError::TooFewInputs { got: 1, .. })
        ));
        assert!(matches!(
            power(3, 4, 2, 101),
            Err(FixtureError::Circuit(CircuitError::DegreeTooHigh { .. }))
        ));
        Ok(())
    }

    #[test]
    fn composite_moduli_are_rejected() {
        assert_eq!(
            factorial_tree(2, 1, 100).unwrap_err(),
            FixtureError::Field(FieldError::NotPrime(100))
        );
        assert_eq!(
            sum_to(5, 1, 91).unwrap_err(),
            FixtureError::Field(FieldError::NotPrime(91))
        );
    }
}
