//! Arithmetic circuits of INPUT, ADD and MUL gates, wired by gate id and input slot.
//!
//! Gates are identified by positive [`GateId`]s and evaluated in ascending order, which is
//! also the dependency order: every wire points from a smaller to a larger id. Party `p` owns
//! the INPUT gate with id `p`. The gate producing the public result is wired to a sentinel id
//! one past the largest gate id, see [`Circuit::final_gate_id`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::{Field, FieldElement, FieldError};

/// Identifies a gate, starting at 1.
pub type GateId = usize;

/// Identifies a party, starting at 1. Party `p` owns the INPUT gate `p`.
pub type PartyId = usize;

/// The operation performed by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateKind {
    /// The private value of the party whose id equals the gate id.
    Input,
    /// Sum of the two wired inputs, evaluated locally on shares.
    Add,
    /// Product of the two wired inputs, needs a round of degree reduction.
    Mul,
}

/// The input slot of the destination gate a wire is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Slot 1.
    Left,
    /// Slot 2.
    Right,
}

impl TryFrom<u8> for Slot {
    type Error = CircuitError;

    fn try_from(slot: u8) -> Result<Self, Self::Error> {
        match slot {
            1 => Ok(Slot::Left),
            2 => Ok(Slot::Right),
            other => Err(CircuitError::InvalidSlot(other)),
        }
    }
}

/// A connection from a gate's output to an input slot of a later gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    /// The destination gate (or the sentinel for the circuit output).
    pub gate: GateId,
    /// The input slot of the destination gate.
    pub slot: Slot,
}

/// A gate and the (possibly several) destinations its output is wired to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// The gate operation.
    pub kind: GateKind,
    /// Where the output of the gate is needed, in declaration order.
    pub destinations: Vec<Wire>,
}

impl Gate {
    /// Creates a gate wired to the given `(destination, slot)` pairs.
    pub fn new(kind: GateKind, destinations: impl IntoIterator<Item = (GateId, Slot)>) -> Self {
        Self {
            kind,
            destinations: destinations
                .into_iter()
                .map(|(gate, slot)| Wire { gate, slot })
                .collect(),
        }
    }
}

/// The public parameters every party agrees on before the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitParams {
    /// The number of parties `N`.
    pub parties: usize,
    /// The polynomial degree `T` of all sharings.
    pub degree: usize,
    /// The field modulus `P`.
    pub prime: u64,
    /// The plaintext result the circuit is expected to produce, reduced mod `P`.
    pub expected: u64,
}

/// A malformed circuit or inconsistent parameters, detected before any party starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitError {
    /// The field modulus is invalid.
    #[error("invalid field: {0}")]
    Field(#[from] FieldError),
    /// There must be more distinct evaluation points than parties.
    #[error("prime {prime} must be larger than the number of parties {parties}")]
    PrimeTooSmall {
        /// The field modulus.
        prime: u64,
        /// The number of parties.
        parties: usize,
    },
    /// Degree reduction needs an honest majority, `2T < N`.
    #[error("2 * degree {degree} must be smaller than the number of parties {parties}")]
    DegreeTooHigh {
        /// The polynomial degree.
        degree: usize,
        /// The number of parties.
        parties: usize,
    },
    /// Gate ids start at 1.
    #[error("gate ids must be positive")]
    ZeroGateId,
    /// Slots are 1 or 2.
    #[error("{0} is not a valid input slot")]
    InvalidSlot(u8),
    /// No gate with this id exists.
    #[error("gate {0} does not exist")]
    UnknownGate(GateId),
    /// A wire points to a gate that does not exist and is not the output sentinel.
    #[error("gate {from} is wired to non-existent gate {to}")]
    DanglingWire {
        /// The source gate.
        from: GateId,
        /// The missing destination.
        to: GateId,
    },
    /// A wire does not point to a later gate.
    #[error("gate {from} is wired backwards to gate {to}")]
    BackwardWire {
        /// The source gate.
        from: GateId,
        /// The destination gate.
        to: GateId,
    },
    /// INPUT gates have no input slots.
    #[error("gate {from} is wired into input gate {to}")]
    WireIntoInput {
        /// The source gate.
        from: GateId,
        /// The input gate.
        to: GateId,
    },
    /// The output of a gate is not used anywhere.
    #[error("gate {0} has no destinations")]
    UnwiredGate(GateId),
    /// INPUT gate ids must be party ids.
    #[error("input gate {gate} does not belong to any of the {parties} parties")]
    InputOutOfRange {
        /// The input gate.
        gate: GateId,
        /// The number of parties.
        parties: usize,
    },
    /// Every party must own the INPUT gate with its own id.
    #[error("party {0} has no input gate")]
    MissingInputGate(PartyId),
    /// ADD and MUL gates take exactly two inputs.
    #[error("gate {gate} has {found} wired inputs instead of 2")]
    WrongOperandCount {
        /// The ADD/MUL gate.
        gate: GateId,
        /// The number of wires pointing to it.
        found: usize,
    },
    /// Exactly one gate must be wired to the output sentinel.
    #[error("expected exactly one output gate, found {0:?}")]
    OutputGateCount(Vec<GateId>),
}

/// An immutable, validated arithmetic circuit together with its public parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    gates: BTreeMap<GateId, Gate>,
    operands: BTreeMap<GateId, Vec<GateId>>,
    field: Field,
    parties: usize,
    degree: usize,
    expected: FieldElement,
    output_gate: GateId,
}

impl Circuit {
    /// Validates the gates against the parameters and builds the circuit.
    pub fn new(
        gates: impl IntoIterator<Item = (GateId, Gate)>,
        params: CircuitParams,
    ) -> Result<Self, CircuitError> {
        let CircuitParams {
            parties,
            degree,
            prime,
            expected,
        } = params;
        let field = Field::new(prime)?;
        if prime <= parties as u64 {
            return Err(CircuitError::PrimeTooSmall { prime, parties });
        }
        if degree.checked_mul(2).is_none_or(|d| d >= parties) {
            return Err(CircuitError::DegreeTooHigh { degree, parties });
        }
        let gates: BTreeMap<GateId, Gate> = gates.into_iter().collect();
        if gates.contains_key(&0) {
            return Err(CircuitError::ZeroGateId);
        }
        for party in 1..=parties {
            match gates.get(&party) {
                Some(Gate {
                    kind: GateKind::Input,
                    ..
                }) => {}
                _ => return Err(CircuitError::MissingInputGate(party)),
            }
        }
        let sentinel = gates.keys().next_back().map_or(1, |max| max + 1);
        let mut wired: BTreeMap<GateId, Vec<(Slot, GateId)>> = BTreeMap::new();
        for (&id, gate) in &gates {
            if gate.kind == GateKind::Input && id > parties {
                return Err(CircuitError::InputOutOfRange { gate: id, parties });
            }
        }
        let mut outputs = vec![];
        for (&id, gate) in &gates {
            if gate.destinations.is_empty() {
                return Err(CircuitError::UnwiredGate(id));
            }
            for &Wire { gate: to, slot } in &gate.destinations {
                if to == sentinel {
                    outputs.push(id);
                    continue;
                }
                let Some(dest) = gates.get(&to) else {
                    return Err(CircuitError::DanglingWire { from: id, to });
                };
                if to <= id {
                    return Err(CircuitError::BackwardWire { from: id, to });
                }
                if dest.kind == GateKind::Input {
                    return Err(CircuitError::WireIntoInput { from: id, to });
                }
                wired.entry(to).or_default().push((slot, id));
            }
        }
        if outputs.len() != 1 {
            return Err(CircuitError::OutputGateCount(outputs));
        }
        let output_gate = outputs[0];
        let mut operands = BTreeMap::new();
        for (&id, gate) in &gates {
            if gate.kind == GateKind::Input {
                continue;
            }
            let mut sources = wired.remove(&id).unwrap_or_default();
            if sources.len() != 2 {
                return Err(CircuitError::WrongOperandCount {
                    gate: id,
                    found: sources.len(),
                });
            }
            // sources were collected in ascending gate order, so equal slots keep that order
            sources.sort_by_key(|(slot, _)| *slot);
            operands.insert(id, sources.into_iter().map(|(_, src)| src).collect());
        }
        Ok(Self {
            gates,
            operands,
            field,
            parties,
            degree,
            expected: field.element(expected),
            output_gate,
        })
    }

    /// All gates in ascending id order, which is the order the protocol evaluates them in.
    pub fn gates_in_evaluation_order(&self) -> impl Iterator<Item = (GateId, &Gate)> {
        self.gates.iter().map(|(id, gate)| (*id, gate))
    }

    /// Looks up a gate by id.
    pub fn gate(&self, id: GateId) -> Result<&Gate, CircuitError> {
        self.gates.get(&id).ok_or(CircuitError::UnknownGate(id))
    }

    /// The INPUT gate owned by the party, which by convention has the party's id.
    pub fn input_gate_of(&self, party: PartyId) -> Result<GateId, CircuitError> {
        match self.gates.get(&party) {
            Some(Gate {
                kind: GateKind::Input,
                ..
            }) => Ok(party),
            _ => Err(CircuitError::MissingInputGate(party)),
        }
    }

    /// The sentinel id one past the largest gate, used to tag the final reveal.
    pub fn final_gate_id(&self) -> GateId {
        self.gates.keys().next_back().map_or(1, |max| max + 1)
    }

    /// The gate whose output is the public result of the circuit.
    pub fn output_gate(&self) -> GateId {
        self.output_gate
    }

    /// The gates wired into `id`, ordered by input slot.
    pub fn operands(&self, id: GateId) -> &[GateId] {
        self.operands.get(&id).map_or(&[], Vec::as_slice)
    }

    /// The field all values of this circuit live in.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// The number of parties `N`.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// The degree `T` of all sharings.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The result the parties compare their reconstructed output against.
    pub fn expected(&self) -> FieldElement {
        self.expected
    }

    /// Evaluates the circuit on plaintext inputs, `inputs[p - 1]` being the value of party `p`.
    pub fn evaluate_in_clear(&self, inputs: &[FieldElement]) -> Result<FieldElement, CircuitError> {
        let mut values: BTreeMap<GateId, FieldElement> = BTreeMap::new();
        for (id, gate) in self.gates_in_evaluation_order() {
            let value = match gate.kind {
                GateKind::Input => *inputs
                    .get(id - 1)
                    .ok_or(CircuitError::MissingInputGate(id))?,
                GateKind::Add | GateKind::Mul => {
                    let &[x, y] = self.operands(id) else {
                        return Err(CircuitError::WrongOperandCount {
                            gate: id,
                            found: self.operands(id).len(),
                        });
                    };
                    let value_of = |src: GateId| {
                        values
                            .get(&src)
                            .copied()
                            .ok_or(CircuitError::UnknownGate(src))
                    };
                    let (x, y) = (value_of(x)?, value_of(y)?);
                    if gate.kind == GateKind::Add {
                        self.field.add(x, y)
                    } else {
                        self.field.mul(x, y)
                    }
                }
            };
            values.insert(id, value);
        }
        values
            .get(&self.output_gate)
            .copied()
            .ok_or(CircuitError::UnknownGate(self.output_gate))
    }

    /// Builds a circuit without validating it, to exercise the engine's own checks.
    #[cfg(test)]
    pub(crate) fn new_unchecked(
        gates: BTreeMap<GateId, Gate>,
        operands: BTreeMap<GateId, Vec<GateId>>,
        field: Field,
        parties: usize,
        degree: usize,
        output_gate: GateId,
    ) -> Self {
        Self {
            gates,
            operands,
            field,
            parties,
            degree,
            expected: field.zero(),
            output_gate,
        }
    }
}
