#![forbid(unsafe_code)]

//! # `stratified_audit_models`
//!
//! Hierarchical Bayesian models for misstatement rates in stratified audit
//! samples, with a small adaptive MCMC engine to fit them.
//!
//! Each stratum contributes a sample size `n_i` and an observed misstatement
//! count `k_i`. Two models are provided:
//!
//! - [`StratifiedMisstatementModel`]: `theta_s[i] ~ Beta(phi * nu, (1 - phi) * nu)`
//!   with a selectable [`PriorFamily`] on `phi` and a binomial or Poisson
//!   likelihood.
//! - [`StratifiedLogitNormalModel`]: `logit(theta_s[i]) = mu + sigma * alpha_s[i]`
//!   with a binomial-logit likelihood.
//!
//! Both expose pure log-density evaluation and implement
//! [`inference::LogDensityModel`], so they can be fitted with
//! [`fit_misstatement_model`] or [`fit_logit_normal_model`] and evaluated with
//! [`evaluate_misstatement`].
//!
//! ```
//! use stratified_audit_models::{
//!     LikelihoodFamily, MisstatementDraw, MisstatementModelConfig, PriorFamily,
//!     StratifiedCounts, StratifiedMisstatementModel,
//! };
//!
//! let counts = StratifiedCounts::new(vec![100, 50, 80], vec![10, 5, 12]);
//! let model = StratifiedMisstatementModel::new(
//!     counts,
//!     MisstatementModelConfig {
//!         prior: PriorFamily::Beta { alpha: 1.0, beta: 1.0 },
//!         likelihood: LikelihoodFamily::Binomial,
//!         use_likelihood: true,
//!     },
//! )?;
//! let draw = MisstatementDraw { phi: 0.1, nu: 10.0, theta_s: vec![0.1, 0.1, 0.15] };
//! assert!(model.log_density(&draw).is_finite());
//! # Ok::<(), stratified_audit_models::ModelError>(())
//! ```

pub mod inference;
pub mod input;
pub mod models;

pub use inference::{
    ConvergenceSummary, InferenceError, LogDensityModel, McmcConfig, MultiChainOptions,
    ParameterSummary, PosteriorSamples, ProposalTuning, SamplerConfig, SamplerDiagnostics,
};
pub use input::{InputError, StratifiedCounts};
pub use models::{
    EvaluationOptions, FitReport, LikelihoodFamily, LogitNormalDraw, LogitNormalModelConfig,
    LogitNormalParameters, LogitNormalPosteriorSummary, MisstatementDraw,
    MisstatementEvaluation, MisstatementModelConfig, MisstatementPosteriorSummary, ModelError,
    MultiChainReport, PopulationPrior, PopulationPriorFamily, PosteriorPredictiveSummary,
    PriorFamily, PriorFamilyKind, PriorIndicators, RateEvaluation, StratifiedLogitNormalModel,
    StratifiedMisstatementModel, evaluate_misstatement, fit_logit_normal_model,
    fit_logit_normal_model_multi_chain, fit_misstatement_model,
    fit_misstatement_model_multi_chain, posterior_predictive_check,
};
