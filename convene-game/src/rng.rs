//! Uniform randomness sources for the roll engine.
//!
//! Every probability draw goes through [`UniformSource`], so the engine is
//! deterministic for a seeded or scripted source.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::collections::VecDeque;

/// Largest `f64` strictly below 1.0.
const MAX_UNIT: f64 = 1.0 - f64::EPSILON / 2.0;

/// Provider of independent uniform values in `[0, 1)`.
pub trait UniformSource {
    /// Draw the next value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

impl<U: UniformSource + ?Sized> UniformSource for &mut U {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

impl<U: UniformSource + ?Sized> UniformSource for Box<U> {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl<R> CountingRng<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng, draws: 0 }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// ChaCha20 stream derived from a user-visible seed.
#[derive(Debug, Clone)]
pub struct SeededSource {
    seed: u64,
    rng: CountingRng<ChaCha20Rng>,
}

impl SeededSource {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let stream_seed = derive_stream_seed(seed, b"convene");
        Self {
            seed,
            rng: CountingRng::new(ChaCha20Rng::seed_from_u64(stream_seed)),
        }
    }

    /// Non-reproducible source seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        let seed = rand::thread_rng().next_u64();
        Self::new(seed)
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.rng.draws()
    }
}

impl UniformSource for SeededSource {
    fn next_unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }
}

/// Replays a fixed sequence of values, then repeats a fallback.
///
/// Values are clamped into `[0, 1)`.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    values: VecDeque<f64>,
    fallback: f64,
    draws: u64,
}

impl ScriptedSource {
    /// Default fallback: misses both rate checks and loses every 50/50.
    pub const DEFAULT_FALLBACK: f64 = 0.99;

    #[must_use]
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: Self::DEFAULT_FALLBACK,
            draws: 0,
        }
    }

    #[must_use]
    pub const fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
    }

    /// Values still queued before the fallback kicks in.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl Default for ScriptedSource {
    /// An empty script: every draw returns the fallback.
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl UniformSource for ScriptedSource {
    fn next_unit(&mut self) -> f64 {
        self.draws = self.draws.saturating_add(1);
        let value = self.values.pop_front().unwrap_or(self.fallback);
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, MAX_UNIT)
    }
}

/// Pick an index in `0..len` from one uniform draw.
///
/// Returns `None` for an empty range without consuming a draw.
pub fn pick_index<U: UniformSource + ?Sized>(source: &mut U, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let unit = source.next_unit();
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let index = (unit * len as f64).floor() as usize;
    Some(index.min(len - 1))
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}
