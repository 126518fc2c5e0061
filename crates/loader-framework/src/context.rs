//! Per-worker scratch state.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Reusable state owned by exactly one worker for its whole lifetime.
///
/// Holds the worker's random number generator and a string buffer that
/// generators may clear and reuse instead of allocating per row.
#[derive(Debug)]
pub struct WorkerContext {
    worker_id: usize,
    rng: StdRng,
    buffer: String,
}

impl WorkerContext {
    /// Create the context for `worker_id`, deriving its RNG stream from `seed`.
    pub fn new(worker_id: usize, seed: u64) -> Self {
        Self {
            worker_id,
            rng: StdRng::seed_from_u64(Self::worker_seed(seed, worker_id)),
            buffer: String::with_capacity(256),
        }
    }

    fn worker_seed(seed: u64, worker_id: usize) -> u64 {
        seed.wrapping_add((worker_id as u64).wrapping_mul(0x9E3779B97F4A7C15))
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// The scratch buffer, cleared.
    pub fn buffer(&mut self) -> &mut String {
        self.buffer.clear();
        &mut self.buffer
    }

    /// RNG and cleared buffer together, for helpers that need both.
    pub fn split(&mut self) -> (&mut StdRng, &mut String) {
        self.buffer.clear();
        (&mut self.rng, &mut self.buffer)
    }
}
