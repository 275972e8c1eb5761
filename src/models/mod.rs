//! # Models
//!
//! Hierarchical Bayesian models for misstatement rates in stratified audit
//! samples, plus the evaluation of their posterior draws.
//!
//! - [`misstatement`]: beta mean/concentration hierarchy with a selectable
//!   hyperprior and a binomial or Poisson likelihood.
//! - [`logit_normal`]: logit-normal random effects with a binomial-logit
//!   likelihood.

pub mod evaluation;
mod fitting;
pub mod likelihood;
pub mod logit_normal;
pub mod misstatement;
pub mod priors;
pub mod types;

pub use evaluation::{
    EvaluationOptions, MisstatementEvaluation, PosteriorPredictiveSummary, RateEvaluation,
    StratifiedRates, evaluate_misstatement, posterior_predictive_check,
};
pub use likelihood::{
    BinomialLikelihood, CountLikelihood, LikelihoodFamily, PoissonLikelihood,
    binomial_log_pmf, binomial_logit_log_pmf, poisson_log_pmf,
};
pub use logit_normal::{
    LogitNormalDraw, LogitNormalModelConfig, LogitNormalParameters, LogitNormalPosteriorSummary,
    PopulationPrior, PopulationPriorFamily, StratifiedLogitNormalModel, fit_logit_normal_model,
    fit_logit_normal_model_multi_chain, summarize_logit_normal_posterior,
};
pub use misstatement::{
    MisstatementDraw, MisstatementModelConfig, MisstatementPosteriorSummary,
    StratifiedMisstatementModel, fit_misstatement_model, fit_misstatement_model_multi_chain,
    summarize_misstatement_posterior,
};
pub use priors::{PriorFamily, PriorFamilyKind, PriorIndicators};
pub use types::{FitReport, ModelError, MultiChainReport};
