/// Multipliers for the three mixing rounds
const MIX_PRIMES: [u64; 3] = [2654435761, 2246822519, 3266489917];

/// Scrambles a 64-bit value through three xor-shift-multiply rounds
///
/// Pure and deterministic: the same input always yields the same output.
pub fn prime_mix(seed: u64) -> u64 {
    MIX_PRIMES
        .iter()
        .fold(seed, |x, &p| (x ^ (x >> 33)).wrapping_mul(p))
}

/// Maps a mixed value to a fraction in `[0, 1)` with three decimal places
pub fn unit_fraction(seed: u64) -> f64 {
    (prime_mix(seed) % 1000) as f64 / 1000.0
}

/// Deterministic pseudo-random sequence built on `prime_mix`
///
/// Each draw mixes the seed with an incrementing counter, so two sequences
/// with the same seed produce the same values in the same order.
#[derive(Debug, Clone)]
pub struct PrimeSequence {
    seed: u64,
    counter: u64,
}

impl PrimeSequence {
    pub fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Next value in `[min, max]`; returns `min` when `max <= min`
    pub fn next_in_range(&mut self, min: u64, max: u64) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        if max <= min {
            return min;
        }
        let x = prime_mix(self.seed ^ self.counter.wrapping_mul(MIX_PRIMES[0]));
        min + x % (max - min + 1)
    }
}
