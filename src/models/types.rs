//! Error and report types shared by the stratified models.

use thiserror::Error;

use crate::inference::{ConvergenceSummary, InferenceError, SamplerDiagnostics};
use crate::input::InputError;

use super::priors::PriorFamily;

/// Errors returned by model configuration, fitting, and evaluation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("exactly one prior family must be selected; {active} selected")]
    AmbiguousPriorSelection { active: usize },
    #[error("invalid prior family parameters: {0:?}")]
    InvalidPrior(PriorFamily),
    #[error("invalid population prior: prior_x = {prior_x}, prior_n = {prior_n}")]
    InvalidPopulationPrior { prior_x: f64, prior_n: f64 },
    #[error("confidence level must lie strictly between 0 and 1; found {0}")]
    InvalidConfidenceLevel(f64),
    #[error("materiality must lie strictly between 0 and 1; found {0}")]
    InvalidMateriality(f64),
    #[error("posterior draws are required")]
    EmptyPosterior,
    #[error("posterior draws cover {found} strata but the counts have {expected}")]
    StratumCountMismatch { expected: usize, found: usize },
}

/// Output report from a single-chain fit.
#[derive(Debug, Clone)]
pub struct FitReport<S> {
    pub diagnostics: SamplerDiagnostics,
    /// `None` when the chain retained no draws.
    pub posterior_summary: Option<S>,
}

/// Output report for a multi-chain fit.
#[derive(Debug, Clone)]
pub struct MultiChainReport<S> {
    /// Chain-specific reports in chain-index order.
    pub chain_reports: Vec<FitReport<S>>,
    /// Posterior summary from pooled draws across all chains.
    pub pooled_posterior_summary: Option<S>,
    /// Split-R-hat and ESS for every scalar parameter.
    pub convergence: ConvergenceSummary,
}
