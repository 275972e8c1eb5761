//! Generic MCMC machinery shared by the stratified models.
//!
//! Models expose their joint log-density on an unconstrained parameter
//! vector through [`LogDensityModel`]; the sampler, diagnostics, and
//! posterior storage in this module know nothing about the models beyond
//! that trait.

pub mod diagnostics;
pub mod posterior;
pub mod random;
pub mod sampler;
pub mod transform;

use thiserror::Error;

pub use diagnostics::{
    ConvergenceSummary, autocorrelation, effective_sample_size, summarize_convergence,
};
pub use posterior::{
    ParameterSummary, ParameterVector, PosteriorSamples, percentile, summarize_components,
    summarize_scalar,
};
pub use sampler::{ChainResult, MultiChainResult, sample_chain, sample_chains};

/// Errors for MCMC configuration and sampling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("iterations must be positive")]
    InvalidIterations,
    #[error("burn-in ({burn_in}) must be smaller than iterations ({iterations})")]
    InvalidBurnIn { burn_in: usize, iterations: usize },
    #[error("thinning interval must be positive")]
    InvalidThinning,
    #[error("invalid proposal tuning configuration")]
    InvalidProposalTuning,
    #[error("multi-chain workflows require at least {min} chains; found {found}")]
    InvalidChainCount { min: usize, found: usize },
    #[error("multi-chain seed stride must be positive")]
    InvalidSeedStride,
    #[error("initial point length ({found}) must match model dimension ({expected})")]
    InitialPointMismatch { expected: usize, found: usize },
    #[error("log-density is not finite at the initial point ({value})")]
    NonFiniteInitialDensity { value: f64 },
    #[error("each chain must retain at least {minimum} draws; minimum found {found}")]
    InsufficientChainDraws { minimum: usize, found: usize },
    #[error("posterior dimensions differ across chains")]
    InconsistentPosteriorDimensions,
    #[error("sampler thread for chain {chain} panicked")]
    ChainPanicked { chain: usize },
}

/// A target density the sampler can explore.
///
/// The sampler works on an unconstrained vector in `R^dimension`;
/// implementations map it onto the constrained parameter space and include
/// the log-Jacobian of that map in [`LogDensityModel::unconstrained_log_density`].
pub trait LogDensityModel: Sync {
    /// One retained posterior draw on the constrained scale.
    type Draw: Clone + Send;

    /// Length of the unconstrained parameter vector.
    fn dimension(&self) -> usize;

    /// Starting point on the unconstrained scale.
    fn initial_point(&self) -> Vec<f64>;

    /// Joint log-density plus log-Jacobian at an unconstrained point.
    fn unconstrained_log_density(&self, position: &[f64]) -> f64;

    /// Map an unconstrained point to a constrained draw.
    fn constrain(&self, position: &[f64]) -> Self::Draw;
}

/// Generic MCMC schedule.
#[derive(Debug, Clone, Copy)]
pub struct McmcConfig {
    pub iterations: usize,
    pub burn_in: usize,
    pub thin: usize,
    pub seed: u64,
    pub adapt_during_burn_in: bool,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            iterations: 4_000,
            burn_in: 1_000,
            thin: 2,
            seed: 42,
            adapt_during_burn_in: true,
        }
    }
}

impl McmcConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if schedule values are invalid.
    pub const fn validate(self) -> Result<(), InferenceError> {
        if self.iterations == 0 {
            return Err(InferenceError::InvalidIterations);
        }
        if self.burn_in >= self.iterations {
            return Err(InferenceError::InvalidBurnIn {
                burn_in: self.burn_in,
                iterations: self.iterations,
            });
        }
        if self.thin == 0 {
            return Err(InferenceError::InvalidThinning);
        }
        Ok(())
    }

    /// Number of retained draws implied by this configuration.
    #[must_use]
    pub const fn retained_draws(self) -> usize {
        (self.iterations - self.burn_in) / self.thin
    }
}

/// Proposal-scale and adaptation controls for random-walk updates.
#[derive(Debug, Clone, Copy)]
pub struct ProposalTuning {
    /// Initial random-walk scale for every unconstrained coordinate.
    pub initial_scale: f64,
    /// Minimum allowed proposal scale.
    pub min_scale: f64,
    /// Maximum allowed proposal scale.
    pub max_scale: f64,
    /// Adapt every `adaptation_interval` iterations during burn-in.
    pub adaptation_interval: usize,
    /// Lower acceptance-rate target for adaptation.
    pub acceptance_target_low: f64,
    /// Upper acceptance-rate target for adaptation.
    pub acceptance_target_high: f64,
    /// Multiplicative scale decrease when acceptance is below target.
    pub scale_decrease_factor: f64,
    /// Multiplicative scale increase when acceptance is above target.
    pub scale_increase_factor: f64,
}

impl Default for ProposalTuning {
    fn default() -> Self {
        Self {
            initial_scale: 0.5,
            min_scale: 1.0e-4,
            max_scale: 10.0,
            adaptation_interval: 50,
            acceptance_target_low: 0.3,
            acceptance_target_high: 0.5,
            scale_decrease_factor: 0.8,
            scale_increase_factor: 1.25,
        }
    }
}

impl ProposalTuning {
    /// Whether proposal tuning settings are numerically valid.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.min_scale > 0.0
            && self.min_scale <= self.max_scale
            && self.initial_scale >= self.min_scale
            && self.initial_scale <= self.max_scale
            && self.adaptation_interval > 0
            && self.acceptance_target_low >= 0.0
            && self.acceptance_target_high <= 1.0
            && self.acceptance_target_low < self.acceptance_target_high
            && self.scale_decrease_factor > 0.0
            && self.scale_decrease_factor < 1.0
            && self.scale_increase_factor > 1.0
    }

    /// Scale factor for one adaptation step given a window acceptance rate.
    #[must_use]
    pub fn adaptation_factor(self, acceptance: f64) -> f64 {
        if acceptance < self.acceptance_target_low {
            self.scale_decrease_factor
        } else if acceptance > self.acceptance_target_high {
            self.scale_increase_factor
        } else {
            1.0
        }
    }

    /// Apply one adaptation step to `scale`, respecting the bounds.
    #[must_use]
    pub fn adapt(self, scale: f64, acceptance: f64) -> f64 {
        (scale * self.adaptation_factor(acceptance)).clamp(self.min_scale, self.max_scale)
    }
}

/// Full sampler configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerConfig {
    pub mcmc: McmcConfig,
    pub tuning: ProposalTuning,
}

impl SamplerConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if any configuration block is invalid.
    pub fn validate(self) -> Result<(), InferenceError> {
        self.mcmc.validate()?;
        if !self.tuning.is_valid() {
            return Err(InferenceError::InvalidProposalTuning);
        }
        Ok(())
    }
}

/// Configuration for running multiple independent chains.
#[derive(Debug, Clone, Copy)]
pub struct MultiChainOptions {
    /// Number of independent chains to run.
    pub chains: usize,
    /// Seed increment between adjacent chains.
    ///
    /// Chain `i` uses `base_seed + i * seed_stride` with wrapping arithmetic.
    pub seed_stride: u64,
}

impl Default for MultiChainOptions {
    fn default() -> Self {
        Self {
            chains: 4,
            seed_stride: 10_000,
        }
    }
}

impl MultiChainOptions {
    /// # Errors
    ///
    /// Returns `InferenceError` if multi-chain options are invalid.
    pub const fn validate(self) -> Result<(), InferenceError> {
        if self.chains < 2 {
            return Err(InferenceError::InvalidChainCount {
                min: 2,
                found: self.chains,
            });
        }
        if self.seed_stride == 0 {
            return Err(InferenceError::InvalidSeedStride);
        }
        Ok(())
    }

    /// Seed used by chain `chain_index`.
    #[must_use]
    pub fn chain_seed(self, base_seed: u64, chain_index: usize) -> u64 {
        let index = u64::try_from(chain_index).unwrap_or(u64::MAX);
        base_seed.wrapping_add(index.wrapping_mul(self.seed_stride))
    }
}

/// Proposal counters for a single Metropolis-Hastings coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }

    /// Combine counters from several coordinates.
    #[must_use]
    pub fn merged(stats: &[Self]) -> Self {
        stats.iter().fold(Self::default(), |total, item| Self {
            proposed: total.proposed + item.proposed,
            accepted: total.accepted + item.accepted,
        })
    }
}

/// Sampler diagnostics for one chain.
#[derive(Debug, Clone, Default)]
pub struct SamplerDiagnostics {
    pub iterations_completed: usize,
    pub retained_draws: usize,
    /// Acceptance rate pooled over all coordinates.
    pub acceptance_rate: f64,
    /// Acceptance rate per unconstrained coordinate.
    pub coordinate_acceptance_rates: Vec<f64>,
    /// Proposal scales after burn-in adaptation.
    pub final_proposal_scales: Vec<f64>,
}

pub(crate) fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
