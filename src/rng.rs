//! Bounded-uniform random source for selection decisions.
//!
//! The selection tree consumes randomness through the [`RandomSource`]
//! capability: one bounded draw per selection attempt, plus forking so every
//! tree node owns an independent generator inside its own lock (no cross-node
//! contention on a shared stream).
//!
//! [`XorShift64`] is the reference implementation:
//! - xorshift64 core (Marsaglia's 13/7/17 shift constants, full period).
//! - Lemire's nearly-divisionless method for bounded sampling, with a bitmask
//!   fast path for power-of-two bounds.
//! - `fork()` seeds children through a splitmix64 mixer so parent and child
//!   streams stay uncorrelated.
//! - Deterministic: same seed, same sequence. `Clone` but deliberately not
//!   `Copy`; copying an RNG duplicates the stream and makes two call sites
//!   take identical "random" decisions.

/// Source of uniformly distributed integers in a caller-supplied range.
///
/// Implementations must be cheap: the selection hot path performs exactly one
/// `next_usize` call per attempt, under a lock.
pub trait RandomSource {
    /// Returns a uniformly distributed value in `[0, upper)`.
    ///
    /// # Panics
    ///
    /// Panics if `upper` is 0. An empty range is always a caller bug: the
    /// selection loop checks for emptiness before drawing.
    fn next_usize(&mut self, upper: usize) -> usize;

    /// Derives an independent generator from this one.
    ///
    /// Used by the composite selector to hand each freshly created leaf its
    /// own stream, so removal order inside one node never depends on how
    /// often sibling nodes drew.
    fn fork(&mut self) -> Self
    where
        Self: Sized;
}

/// Deterministic xorshift64 generator.
///
/// Not thread-safe; each tree node owns one instance behind that node's lock.
#[derive(Clone, Debug)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Creates a generator from `seed`.
    ///
    /// Seed 0 is remapped to a fixed non-zero constant: the all-zero state is
    /// a fixed point of the xorshift transition and would lock the stream.
    #[inline]
    pub fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state: seed }
    }

    /// Advances the state and returns the next raw 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Current state, for reproducing a trace: save it, then rebuild with
    /// `XorShift64::new(saved)`.
    #[inline]
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Lemire's nearly-divisionless bounded sampling.
    ///
    /// Maps a raw draw to `[0, upper)` with one widening multiply; rejection
    /// keeps the result unbiased and is rare (probability `< upper / 2^64`).
    #[inline]
    fn bounded_u64(&mut self, upper: u64) -> u64 {
        let threshold = upper.wrapping_neg() % upper;
        loop {
            let x = self.next_u64();
            let m = (x as u128) * (upper as u128);
            if (m as u64) >= threshold {
                return (m >> 64) as u64;
            }
        }
    }
}

impl RandomSource for XorShift64 {
    #[inline]
    fn next_usize(&mut self, upper: usize) -> usize {
        assert!(upper > 0, "random bound must be > 0");
        if upper.is_power_of_two() && upper as u64 <= 1 << 32 {
            // High bits: xorshift's low bits are the weaker ones.
            return ((self.next_u64() >> 32) as usize) & (upper - 1);
        }
        self.bounded_u64(upper as u64) as usize
    }

    fn fork(&mut self) -> Self {
        // Mix through splitmix64 so sequential forks don't inherit the
        // parent's stream correlation.
        Self::new(splitmix64(self.next_u64()))
    }
}

impl Default for XorShift64 {
    fn default() -> Self {
        Self::new(0)
    }
}

/// SplitMix64 finalizer (Vigna, "Further scramblings of Marsaglia's xorshift
/// generators"). Each input bit flips roughly half the output bits, which is
/// what makes sequential fork seeds land far apart.
#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
