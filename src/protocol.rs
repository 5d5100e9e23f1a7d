//! The [BGW](https://dl.acm.org/doi/10.1145/62212.62213) protocol, implementing semi-honest MPC
//! for arithmetic circuits over Shamir secret shares.
//!
//! Every party runs the same engine on its own copy of the [`Circuit`], walking the gates in
//! ascending id order:
//!
//! 1. Input: the owner of an INPUT gate splits its private value and sends one share to each
//!    party. All other parties skip the gate and pick up their share when it is needed.
//! 2. Addition: shares are added locally, the result is relayed to the party itself.
//! 3. Multiplication: the local product is a share of degree `2T`, so every party re-shares it
//!    at degree `T`, collects the re-shared values of all parties and interpolates them into a
//!    fresh share of degree `T` (degree reduction).
//! 4. Reveal: the share of the output gate is broadcast to all parties, who reconstruct the
//!    result and compare it against the expected value.
//!
//! The main entry point is [`mpc`], which is called by each party with its private value. For
//! tests and development, [`simulate`] and [`simulate_mpc`] run all parties in-process.

use std::{collections::BTreeMap, fmt, time::Duration};

use rand::Rng;
use tokio::{runtime::Builder, task::JoinSet, time::timeout};
use tracing::{Level, debug, info, instrument, warn};

use crate::{
    channel::{self, Channel, SimpleChannel},
    circuit::{Circuit, CircuitError, GateId, GateKind, PartyId},
    config::Config,
    field::FieldElement,
    mailbox::{Mailbox, Retention},
    sharing::{self, Shares, SharingError},
};

/// A custom error type for MPC computation and communication.
#[derive(Debug)]
pub enum Error {
    /// A message could not be sent or received.
    ChannelError(channel::Error),
    /// The specified circuit is invalid (e.g. contains invalid wirings).
    CircuitError(CircuitError),
    /// Shares could not be interpolated.
    SharingError(SharingError),
    /// Caused by the core MPC protocol computation.
    MpcError(MpcError),
    /// The specified party does not exist in the circuit.
    PartyDoesNotExist(PartyId),
    /// The number of provided private values does not match the number of parties.
    WrongInputCount {
        /// The number of parties of the circuit.
        expected: usize,
        /// The number of private values provided by the user.
        actual: usize,
    },
    /// The parties did not finish within the configured time.
    Timeout(Duration),
    /// The runtime executing the parties could not be started.
    Runtime(std::io::Error),
    /// A party task panicked or was cancelled.
    TaskFailed(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ChannelError(e) => write!(f, "Channel error: {e}"),
            Error::CircuitError(e) => write!(f, "Circuit error: {e}"),
            Error::SharingError(e) => write!(f, "Sharing error: {e}"),
            Error::MpcError(e) => write!(f, "MPC error: {e}"),
            Error::PartyDoesNotExist(p) => write!(f, "Party {p} does not exist"),
            Error::WrongInputCount { expected, actual } => {
                write!(f, "Wrong input, expected {expected} private values, found {actual}")
            }
            Error::Timeout(max_time) => {
                write!(f, "The computation did not finish within {max_time:?}")
            }
            Error::Runtime(e) => write!(f, "Could not start the runtime: {e}"),
            Error::TaskFailed(e) => write!(f, "A party task failed: {e}"),
        }
    }
}

impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        Self::ChannelError(e)
    }
}

impl From<CircuitError> for Error {
    fn from(e: CircuitError) -> Self {
        Self::CircuitError(e)
    }
}

impl From<SharingError> for Error {
    fn from(e: SharingError) -> Self {
        Self::SharingError(e)
    }
}

impl From<MpcError> for Error {
    fn from(e: MpcError) -> Self {
        Self::MpcError(e)
    }
}

/// A custom error type for all steps of the main MPC protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpcError {
    /// An ADD or MUL gate does not have exactly two wired inputs.
    WrongOperandCount {
        /// The gate being evaluated.
        gate: GateId,
        /// The number of inputs wired to it.
        found: usize,
    },
}

impl fmt::Display for MpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpcError::WrongOperandCount { gate, found } => {
                write!(f, "Gate {gate} needs 2 inputs, but {found} are wired to it")
            }
        }
    }
}

/// The result of a completed run, as seen by one party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The reconstructed output matches the expected result.
    Success {
        /// The revealed output of the circuit.
        result: FieldElement,
    },
    /// The reconstructed output differs from the expected result.
    Mismatch {
        /// The revealed output of the circuit.
        result: FieldElement,
        /// The result the circuit should have produced.
        expected: FieldElement,
    },
}

impl Outcome {
    /// The revealed output, whether or not it matched.
    pub fn result(&self) -> FieldElement {
        match self {
            Outcome::Success { result } | Outcome::Mismatch { result, .. } => *result,
        }
    }

    /// Whether the revealed output matched the expected result.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { result } => write!(f, "SUCCESS, computed secret is {result}"),
            Outcome::Mismatch { result, expected } => {
                write!(f, "FAIL, computed secret is {result}, expected {expected}")
            }
        }
    }
}

/// Executes the BGW protocol for a single party.
///
/// # Arguments
///
/// * `channel` - Communication channel to interact with the other parties
/// * `circuit` - The arithmetic circuit, identical for all parties
/// * `party` - The id of the party executing this function, between `1` and the number of parties
/// * `private_value` - The party's private input, reduced into the field of the circuit
/// * `rng` - The source of randomness for the sharing polynomials
///
/// # Returns
///
/// The revealed output of the circuit together with whether it matched the expected result. A
/// mismatch is reported as [`Outcome::Mismatch`], not as an error.
///
/// # Errors
///
/// Returns `Error` if:
/// - The party does not exist in the circuit
/// - A gate does not have exactly two wired inputs
/// - Communication with other parties fails
/// - Shares could not be interpolated
///
/// The protocol itself never times out. A party waiting for a message that is never sent blocks
/// until the caller stops it.
#[instrument(level = Level::DEBUG, skip(channel, circuit, private_value, rng), err)]
pub async fn mpc(
    channel: &impl Channel,
    circuit: &Circuit,
    party: PartyId,
    private_value: u64,
    rng: &mut impl Rng,
) -> Result<Outcome, Error> {
    if party == 0 || party > circuit.parties() {
        return Err(Error::PartyDoesNotExist(party));
    }
    let private_value = circuit.field().element(private_value);
    let mut engine = Engine {
        circuit,
        party,
        private_value,
        mailbox: Mailbox::new(channel, party),
        state: State::Idle,
    };
    let outcome = engine.run(rng).await?;
    match &outcome {
        Outcome::Success { .. } => info!("{outcome}"),
        Outcome::Mismatch { .. } => warn!("{outcome}"),
    }
    Ok(outcome)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    ProcessingGate(GateId),
    Revealed,
}

struct Engine<'circ, 'ch, C: Channel> {
    circuit: &'circ Circuit,
    party: PartyId,
    private_value: FieldElement,
    mailbox: Mailbox<'ch, C>,
    state: State,
}

impl<C: Channel> Engine<'_, '_, C> {
    async fn run(&mut self, rng: &mut impl Rng) -> Result<Outcome, Error> {
        let circuit = self.circuit;
        let output_gate = circuit.output_gate();
        let own_input = circuit.input_gate_of(self.party)?;
        let mut output_share = None;
        for (gate, g) in circuit.gates_in_evaluation_order() {
            self.transition(State::ProcessingGate(gate));
            let share = match g.kind {
                GateKind::Input if gate == own_input => {
                    self.share_input(gate, rng).await?;
                    None
                }
                GateKind::Input => None,
                GateKind::Add => {
                    let (x, y) = self.operands(gate).await?;
                    Some(circuit.field().add(x, y))
                }
                GateKind::Mul => {
                    let (x, y) = self.operands(gate).await?;
                    let product = circuit.field().mul(x, y);
                    Some(self.reduce_degree(gate, product, rng).await?)
                }
            };
            if let Some(share) = share {
                if gate == output_gate {
                    output_share = Some(share);
                } else {
                    self.mailbox.send_share(self.party, gate, share).await?;
                }
            }
            debug!(gate, "gate processed");
        }
        let share = match output_share {
            Some(share) => share,
            // a circuit consisting of a single INPUT gate reveals the input itself
            None => self.resolve(output_gate).await?,
        };
        let outcome = self.reveal(share).await?;
        self.transition(State::Revealed);
        Ok(outcome)
    }

    fn transition(&mut self, next: State) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    async fn share_input(&mut self, gate: GateId, rng: &mut impl Rng) -> Result<(), Error> {
        let circuit = self.circuit;
        let shares = sharing::split(
            circuit.field(),
            self.private_value,
            circuit.degree(),
            circuit.parties(),
            rng,
        );
        debug!(gate, "sharing private input");
        self.mailbox.scatter_shares(gate, shares).await?;
        Ok(())
    }

    /// Resolves the two operands of `gate`, in slot order.
    async fn operands(&mut self, gate: GateId) -> Result<(FieldElement, FieldElement), Error> {
        let &[x, y] = self.circuit.operands(gate) else {
            return Err(MpcError::WrongOperandCount {
                gate,
                found: self.circuit.operands(gate).len(),
            }
            .into());
        };
        Ok((self.resolve(x).await?, self.resolve(y).await?))
    }

    /// This party's share of the output of `source`.
    ///
    /// Shares of INPUT gates are sent by their owner, all other shares were kept by the party
    /// itself.
    async fn resolve(&mut self, source: GateId) -> Result<FieldElement, Error> {
        let sender = match self.circuit.gate(source)?.kind {
            GateKind::Input => source,
            GateKind::Add | GateKind::Mul => self.party,
        };
        Ok(self
            .mailbox
            .await_share(sender, source, Retention::Keep)
            .await?)
    }

    /// Turns a share of degree `2T` into a share of degree `T` of the same value.
    async fn reduce_degree(
        &mut self,
        gate: GateId,
        product: FieldElement,
        rng: &mut impl Rng,
    ) -> Result<FieldElement, Error> {
        let circuit = self.circuit;
        let parties = circuit.parties();
        let reshared = sharing::split(circuit.field(), product, circuit.degree(), parties, rng);
        self.mailbox.scatter_shares(gate, reshared).await?;
        let mut received = Shares::new();
        for sender in 1..=parties {
            let share = self
                .mailbox
                .await_share(sender, gate, Retention::Evict)
                .await?;
            received.insert(sender, share);
        }
        let reduced = sharing::reconstruct(circuit.field(), &received, parties)?;
        debug!(gate, %reduced, "degree reduced");
        Ok(reduced)
    }

    async fn reveal(&mut self, share: FieldElement) -> Result<Outcome, Error> {
        let circuit = self.circuit;
        let parties = circuit.parties();
        let tag = circuit.final_gate_id();
        self.mailbox
            .scatter_shares(tag, (1..=parties).map(|p| (p, share)))
            .await?;
        let mut received = Shares::new();
        for sender in 1..=parties {
            let share = self
                .mailbox
                .await_share(sender, tag, Retention::Keep)
                .await?;
            received.insert(sender, share);
        }
        let result = sharing::reconstruct(circuit.field(), &received, circuit.degree() + 1)?;
        debug!(%result, "output revealed");
        let expected = circuit.expected();
        if result == expected {
            Ok(Outcome::Success { result })
        } else {
            Ok(Outcome::Mismatch { result, expected })
        }
    }
}

/// Runs all parties of the circuit as tasks on the current runtime, communicating over
/// [`SimpleChannel`]s, and returns the outcome of each party in party order.
///
/// `private_values[p - 1]` is the private value of party `p`. All parties are aborted if they
/// do not finish within [`Config::max_time`].
pub async fn simulate(
    circuit: &Circuit,
    private_values: &[u64],
    config: &Config,
) -> Result<Vec<Outcome>, Error> {
    let parties = circuit.parties();
    if private_values.len() != parties {
        return Err(Error::WrongInputCount {
            expected: parties,
            actual: private_values.len(),
        });
    }
    let mut tasks = JoinSet::new();
    for (i, (channel, &value)) in SimpleChannel::channels(parties)
        .into_iter()
        .zip(private_values)
        .enumerate()
    {
        let party = i + 1;
        let circuit = circuit.clone();
        let mut rng = config.party_rng(party);
        tasks.spawn(async move {
            let outcome = mpc(&channel, &circuit, party, value, &mut rng).await;
            (party, outcome)
        });
    }
    let join_all = async move {
        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (party, outcome) = joined.map_err(|e| Error::TaskFailed(e.to_string()))?;
            outcomes.insert(party, outcome?);
        }
        let outcomes: Vec<Outcome> = outcomes.into_values().collect();
        Ok::<_, Error>(outcomes)
    };
    // dropping the join set aborts all parties that are still running
    match timeout(config.max_time, join_all).await {
        Ok(outcomes) => outcomes,
        Err(_) => Err(Error::Timeout(config.max_time)),
    }
}

/// Simulates the multi party computation on a fresh single-threaded runtime, see [`simulate`].
pub fn simulate_mpc(
    circuit: &Circuit,
    private_values: &[u64],
    config: &Config,
) -> Result<Vec<Outcome>, Error> {
    let runtime = Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(Error::Runtime)?;
    runtime.block_on(simulate(circuit, private_values, config))
}
