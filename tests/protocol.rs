use std::time::Duration;

use bgw::{
    channel::SimpleChannel,
    circuit::{Circuit, CircuitError, CircuitParams, Gate, GateId, GateKind::*, Slot::*},
    config::Config,
    fixtures,
    protocol::{Error, Outcome, mpc, simulate, simulate_mpc},
};
use futures::future::try_join_all;

fn config(seed: u64) -> Config {
    Config {
        seed: Some(seed),
        max_time: Duration::from_secs(10),
    }
}

/// `(x1 + x2) * x3 + x4 * x5` for five parties.
fn mixed_gates() -> Vec<(GateId, Gate)> {
    vec![
        (1, Gate::new(Input, [(6, Left)])),
        (2, Gate::new(Input, [(6, Right)])),
        (3, Gate::new(Input, [(7, Right)])),
        (4, Gate::new(Input, [(8, Left)])),
        (5, Gate::new(Input, [(8, Right)])),
        (6, Gate::new(Add, [(7, Left)])),
        (7, Gate::new(Mul, [(9, Left)])),
        (8, Gate::new(Mul, [(9, Right)])),
        (9, Gate::new(Add, [(10, Left)])),
    ]
}

#[test]
fn eval_mixed_circuits_5pc() -> Result<(), Error> {
    let prime = 1_009;
    for (seed, values) in [
        [0, 0, 0, 0, 0],
        [1, 2, 3, 4, 5],
        [1_008, 1, 17, 1_000, 999],
        [500, 509, 2, 3, 336],
    ]
    .into_iter()
    .enumerate()
    {
        let [x1, x2, x3, x4, x5] = values;
        let expected = ((x1 + x2) * x3 + x4 * x5) % prime;
        let params = CircuitParams {
            parties: 5,
            degree: 2,
            prime,
            expected,
        };
        let circuit = Circuit::new(mixed_gates(), params)?;
        let outcomes = simulate_mpc(&circuit, &values, &config(seed as u64))?;
        assert_eq!(outcomes.len(), 5);
        for outcome in outcomes {
            assert!(outcome.is_success(), "{values:?}: {outcome}");
            assert_eq!(outcome.result().value(), expected);
        }
    }
    Ok(())
}

#[test]
fn eval_numbered_fixtures_with_fresh_randomness() -> Result<(), Box<dyn std::error::Error>> {
    for n in fixtures::NUMBERS {
        let fixture = fixtures::by_number(n)?;
        let outcomes = simulate_mpc(&fixture.circuit, &fixture.private_values, &Config::default())?;
        for outcome in outcomes {
            assert_eq!(
                outcome,
                Outcome::Success {
                    result: fixture.circuit.expected()
                },
                "{}",
                fixture.name
            );
        }
    }
    Ok(())
}

#[test]
fn eval_large_instances() -> Result<(), Box<dyn std::error::Error>> {
    let tree = fixtures::factorial_tree(4, 7, 1_000_000_007)?;
    let outcomes = simulate_mpc(&tree.circuit, &tree.private_values, &config(3))?;
    assert!(outcomes.iter().all(Outcome::is_success));

    let loss = fixtures::squared_error(3)?;
    let outcomes = simulate_mpc(&loss.circuit, &loss.private_values, &config(4))?;
    assert!(outcomes.iter().all(Outcome::is_success));
    Ok(())
}

/// `x1` and `x2` feed `width` parallel additions, whose results are summed up and added to `x3`.
fn wide_sum(width: usize, values: [u64; 3]) -> Result<Circuit, CircuitError> {
    let first_add = 4;
    let first_sum = first_add + width;
    let last_sum = first_sum + width - 1;
    let adds = first_add..first_sum;
    let mut gates = vec![
        (1, Gate::new(Input, adds.clone().map(|g| (g, Left)))),
        (2, Gate::new(Input, adds.clone().map(|g| (g, Right)))),
        (3, Gate::new(Input, [(last_sum, Right)])),
    ];
    for (i, add) in adds.enumerate() {
        let dest = match i {
            0 => (first_sum, Left),
            1 => (first_sum, Right),
            _ => (first_sum + i - 1, Right),
        };
        gates.push((add, Gate::new(Add, [dest])));
    }
    for sum in first_sum..last_sum {
        gates.push((sum, Gate::new(Add, [(sum + 1, Left)])));
    }
    gates.push((last_sum, Gate::new(Add, [(last_sum + 1, Left)])));
    let [x1, x2, x3] = values;
    let params = CircuitParams {
        parties: 3,
        degree: 1,
        prime: 1_000_003,
        expected: width as u64 * (x1 + x2) + x3,
    };
    Circuit::new(gates, params)
}

#[test]
fn eval_wide_circuits_without_blocking_on_own_shares() -> Result<(), Error> {
    let values = [1, 2, 5];
    for width in [2, 1_100, 3_000] {
        let circuit = wide_sum(width, values)?;
        let outcomes = simulate_mpc(&circuit, &values, &config(width as u64))?;
        for outcome in outcomes {
            assert_eq!(outcome.result().value(), width as u64 * 3 + 5);
            assert!(outcome.is_success(), "width {width}: {outcome}");
        }
    }
    Ok(())
}

#[test]
fn wrong_expectation_is_reported_by_every_party() -> Result<(), Error> {
    let params = CircuitParams {
        parties: 5,
        degree: 1,
        prime: 101,
        expected: 42,
    };
    let circuit = Circuit::new(mixed_gates(), params)?;
    let values = [1, 2, 3, 4, 5];
    let outcomes = simulate_mpc(&circuit, &values, &config(0))?;
    for outcome in outcomes {
        let Outcome::Mismatch { result, expected } = outcome else {
            panic!("expected a mismatch, got {outcome}");
        };
        assert_eq!(result.value(), 29);
        assert_eq!(expected.value(), 42);
    }
    Ok(())
}

#[tokio::test]
async fn parties_driven_through_the_entry_point() -> Result<(), Error> {
    let fixture = fixtures::textbook().expect("valid fixture");
    let channels = SimpleChannel::channels(fixture.circuit.parties());
    let config = config(9);
    let parties = channels
        .iter()
        .zip(&fixture.private_values)
        .enumerate()
        .map(|(i, (channel, &value))| {
            let circuit = &fixture.circuit;
            let mut rng = config.party_rng(i + 1);
            async move { mpc(channel, circuit, i + 1, value, &mut rng).await }
        });
    let outcomes = try_join_all(parties).await?;
    assert!(outcomes.iter().all(|o| o.result().value() == 7));
    Ok(())
}

#[tokio::test]
async fn simulation_rejects_missing_private_values() {
    let fixture = fixtures::textbook().expect("valid fixture");
    let err = simulate(&fixture.circuit, &fixture.private_values[1..], &config(0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::WrongInputCount {
            expected: 6,
            actual: 5
        }
    ));
}

#[test]
fn malformed_circuits_are_rejected_before_the_run() {
    let mut gates = mixed_gates();
    gates[5].1 = Gate::new(Add, [(11, Left)]);
    let params = CircuitParams {
        parties: 5,
        degree: 2,
        prime: 101,
        expected: 0,
    };
    assert_eq!(
        Circuit::new(gates, params),
        Err(CircuitError::DanglingWire { from: 6, to: 11 })
    );
    assert_eq!(
        Circuit::new(mixed_gates(), CircuitParams { degree: 3, ..params }),
        Err(CircuitError::DegreeTooHigh {
            degree: 3,
            parties: 5
        })
    );
    assert_eq!(
        Circuit::new(mixed_gates(), CircuitParams { prime: 5, ..params }),
        Err(CircuitError::PrimeTooSmall {
            prime: 5,
            parties: 5
        })
    );
}
