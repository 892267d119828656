//! Seeded random streams.
//!
//! Every stochastic subsystem owns its own generator. All of them derive from
//! the one engine seed but draw from distinct ChaCha streams, so adding draws
//! to one subsystem never shifts the sequence seen by another.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Identifies the independent random streams of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RngStream {
    /// User sampling at `reset`.
    Episode = 0,
    /// The per-step stop draw.
    Termination = 1,
    /// Perturbation policy draws.
    Perturbation = 3,
    /// Reward shaper draws.
    Shaping = 4,
}

/// Build the generator for `stream` under `seed`.
#[must_use]
pub fn seeded(seed: u64, stream: RngStream) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream as u64);
    rng
}
