use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution, Exp, Normal};

use crate::error::GenError;

/// Smallest amount the sampler will ever return
pub const MIN_AMOUNT: f64 = 0.01;
/// Largest amount the sampler will ever return
pub const MAX_AMOUNT: f64 = 1e9;

/// Parameters of the noisy amount model.
///
/// A base amount is drawn from `Normal(mean, standard_deviation)`. With probability
/// `outlier_probability` it is then multiplied by `1 + e`, where `e` is exponentially
/// distributed with mean `outlier_multiplier_mean`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub mean: f64,
    pub standard_deviation: f64,
    pub outlier_probability: f64,
    pub outlier_multiplier_mean: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            mean: 1000.0,
            standard_deviation: 300.0,
            outlier_probability: 0.01,
            outlier_multiplier_mean: 50.0,
        }
    }
}

impl SamplerConfig {
    /// # Errors
    /// Errors when a parameter is non-finite or out of its domain
    pub fn validate(&self) -> Result<(), GenError> {
        if !self.mean.is_finite() {
            return Err(GenError::InvalidSamplerConfig(format!(
                "mean must be finite, got {}",
                self.mean
            )));
        }
        if !(self.standard_deviation.is_finite() && self.standard_deviation >= 0.0) {
            return Err(GenError::InvalidSamplerConfig(format!(
                "standard deviation must be finite and >= 0, got {}",
                self.standard_deviation
            )));
        }
        if !(0.0..=1.0).contains(&self.outlier_probability) {
            return Err(GenError::InvalidSamplerConfig(format!(
                "outlier probability must be within [0, 1], got {}",
                self.outlier_probability
            )));
        }
        if !(self.outlier_multiplier_mean.is_finite() && self.outlier_multiplier_mean > 0.0) {
            return Err(GenError::InvalidSamplerConfig(format!(
                "outlier multiplier mean must be finite and > 0, got {}",
                self.outlier_multiplier_mean
            )));
        }
        Ok(())
    }
}

/// Produces randomized positive amounts, and uniform indices for party selection.
#[derive(Debug, Clone)]
pub struct AmountSampler {
    rng: StdRng,
    base: Normal<f64>,
    outlier: Bernoulli,
    multiplier: Exp<f64>,
}

impl AmountSampler {
    /// Creates a sampler seeded from OS entropy.
    ///
    /// # Errors
    /// Errors when `config` does not pass [`SamplerConfig::validate`]
    pub fn new(config: SamplerConfig) -> Result<Self, GenError> {
        Self::build(config, StdRng::from_entropy())
    }

    /// Creates a sampler whose sequence of draws is fully determined by `seed`.
    ///
    /// # Errors
    /// Errors when `config` does not pass [`SamplerConfig::validate`]
    pub fn with_seed(config: SamplerConfig, seed: u64) -> Result<Self, GenError> {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    fn build(config: SamplerConfig, rng: StdRng) -> Result<Self, GenError> {
        config.validate()?;
        let invalid = |e: &dyn std::fmt::Display| GenError::InvalidSamplerConfig(e.to_string());
        Ok(AmountSampler {
            rng,
            base: Normal::new(config.mean, config.standard_deviation).map_err(|e| invalid(&e))?,
            outlier: Bernoulli::new(config.outlier_probability).map_err(|e| invalid(&e))?,
            multiplier: Exp::new(1.0 / config.outlier_multiplier_mean).map_err(|e| invalid(&e))?,
        })
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Draws one amount, clamped to `[MIN_AMOUNT, MAX_AMOUNT]`
    pub fn sample(&mut self) -> f64 {
        self.sample_with_outlier_flag().0
    }

    /// Like [`AmountSampler::sample`], also reporting whether the outlier multiplier was applied
    pub fn sample_with_outlier_flag(&mut self) -> (f64, bool) {
        let mut x = self.base.sample(&mut self.rng);
        let is_outlier = self.outlier.sample(&mut self.rng);
        if is_outlier {
            x *= 1.0 + self.multiplier.sample(&mut self.rng);
        }
        // bounds are checked on the raw value, before any rounding to cents
        (x.clamp(MIN_AMOUNT, MAX_AMOUNT), is_outlier)
    }

    /// Uniform draw from the inclusive range `[start, end]`
    ///
    /// # Panics
    /// Panics if `start > end`
    pub fn uniform_int(&mut self, start: usize, end: usize) -> usize {
        self.rng.gen_range(start..=end)
    }
}
