//! Run-time settings shared by the simulator and the process launcher.

use std::time::Duration;

use rand::{SeedableRng, random};
use rand_chacha::ChaCha20Rng;

use crate::circuit::PartyId;

/// How long a run may take before all parties are stopped, if not configured otherwise.
pub const DEFAULT_MAX_TIME: Duration = Duration::from_secs(5);

/// Settings for a run of all parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Makes the sharing polynomials repeatable: party `p` seeds its generator with `seed + p`.
    /// Fresh randomness is drawn if `None`.
    pub seed: Option<u64>,
    /// Wall-clock bound for the whole computation, after which all parties are aborted.
    pub max_time: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            max_time: DEFAULT_MAX_TIME,
        }
    }
}

impl Config {
    /// The random number generator used by `party` for all of its sharings.
    pub fn party_rng(&self, party: PartyId) -> ChaCha20Rng {
        match self.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed.wrapping_add(party as u64)),
            None => ChaCha20Rng::from_seed(random()),
        }
    }
}
