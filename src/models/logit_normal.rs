//! Logit-normal random-effects model for stratified misstatement counts.
//!
//! ```text
//! theta      ~ Beta(1 + x, n - x)   or   Gamma(1 + x, n)
//! mu         = logit(theta)
//! sigma      ~ Normal(0, 1),  sigma >= 0
//! alpha_s[i] ~ Normal(0, 1)
//! k[i]       ~ BinomialLogit(n[i], mu + sigma * alpha_s[i])
//! theta_s[i] = inv_logit(mu + sigma * alpha_s[i])
//! ```
//!
//! `x` and `n` are pseudo-observations: `x` misstatements in `n` prior
//! sample items.

use tracing::debug;

use crate::inference::transform::{
    logistic_stable, logit, lower_bounded_constrain, lower_bounded_unconstrain,
    unit_interval_constrain, unit_interval_unconstrain,
};
use crate::inference::{
    LogDensityModel, MultiChainOptions, ParameterSummary, ParameterVector, PosteriorSamples,
    SamplerConfig, summarize_components, summarize_scalar,
};
use crate::input::StratifiedCounts;

use super::fitting::{fit_multi_chain, fit_single_chain};
use super::likelihood::binomial_logit_log_pmf;
use super::priors::{
    log_beta_density, log_gamma_density, log_half_standard_normal_density, log_normal_density,
};
use super::types::{FitReport, ModelError, MultiChainReport};

const INITIAL_SIGMA: f64 = 0.5;

/// Family of the prior on the population probability `theta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopulationPriorFamily {
    /// `Beta(1 + prior_x, prior_n - prior_x)`.
    #[default]
    Beta,
    /// `Gamma(shape = 1 + prior_x, rate = prior_n)`.
    Gamma,
}

/// Prior on `theta` built from pseudo-observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationPrior {
    pub family: PopulationPriorFamily,
    /// Prior misstatements.
    pub prior_x: f64,
    /// Prior sample size.
    pub prior_n: f64,
}

impl Default for PopulationPrior {
    fn default() -> Self {
        Self {
            family: PopulationPriorFamily::Beta,
            prior_x: 0.0,
            prior_n: 1.0,
        }
    }
}

impl PopulationPrior {
    /// Build from the legacy `beta_prior` toggle.
    #[must_use]
    pub const fn from_flag(beta_prior: bool, prior_x: f64, prior_n: f64) -> Self {
        let family = if beta_prior {
            PopulationPriorFamily::Beta
        } else {
            PopulationPriorFamily::Gamma
        };
        Self {
            family,
            prior_x,
            prior_n,
        }
    }

    /// Whether the pseudo-observations give a proper prior.
    #[must_use]
    pub fn is_valid(self) -> bool {
        let Self {
            family,
            prior_x,
            prior_n,
        } = self;
        if !(prior_x.is_finite() && prior_n.is_finite() && prior_x >= 0.0) {
            return false;
        }
        match family {
            PopulationPriorFamily::Beta => prior_n > prior_x,
            PopulationPriorFamily::Gamma => prior_n > 0.0,
        }
    }

    #[must_use]
    pub fn log_density(self, theta: f64) -> f64 {
        let shape = 1.0 + self.prior_x;
        match self.family {
            PopulationPriorFamily::Beta => {
                log_beta_density(theta, shape, self.prior_n - self.prior_x)
            }
            PopulationPriorFamily::Gamma => log_gamma_density(theta, shape, self.prior_n),
        }
    }
}

/// Configuration for [`StratifiedLogitNormalModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogitNormalModelConfig {
    pub population_prior: PopulationPrior,
    /// When off, the counts do not enter the density.
    pub use_likelihood: bool,
}

impl Default for LogitNormalModelConfig {
    fn default() -> Self {
        Self {
            population_prior: PopulationPrior::default(),
            use_likelihood: true,
        }
    }
}

/// Sampled parameters of the logit-normal model.
#[derive(Debug, Clone, PartialEq)]
pub struct LogitNormalParameters {
    pub theta: f64,
    pub sigma: f64,
    pub alpha_s: Vec<f64>,
}

/// A posterior draw with its derived quantities.
#[derive(Debug, Clone, PartialEq)]
pub struct LogitNormalDraw {
    pub theta: f64,
    /// `logit(theta)`.
    pub mu: f64,
    pub sigma: f64,
    pub alpha_s: Vec<f64>,
    /// `inv_logit(mu + sigma * alpha_s[i])`.
    pub theta_s: Vec<f64>,
}

impl LogitNormalDraw {
    #[must_use]
    pub fn from_parameters(parameters: LogitNormalParameters) -> Self {
        let mu = logit(parameters.theta);
        let theta_s = parameters
            .alpha_s
            .iter()
            .map(|alpha| logistic_stable(parameters.sigma.mul_add(*alpha, mu)))
            .collect();
        Self {
            theta: parameters.theta,
            mu,
            sigma: parameters.sigma,
            alpha_s: parameters.alpha_s,
            theta_s,
        }
    }
}

impl ParameterVector for LogitNormalDraw {
    fn parameter_names(&self) -> Vec<String> {
        let mut names = vec!["theta".to_string(), "mu".to_string(), "sigma".to_string()];
        names.extend((1..=self.alpha_s.len()).map(|index| format!("alpha_s[{index}]")));
        names.extend((1..=self.theta_s.len()).map(|index| format!("theta_s[{index}]")));
        names
    }

    fn parameter_values(&self) -> Vec<f64> {
        let mut values = vec![self.theta, self.mu, self.sigma];
        values.extend_from_slice(&self.alpha_s);
        values.extend_from_slice(&self.theta_s);
        values
    }
}

/// Logit-normal random-effects model over stratum probabilities.
#[derive(Debug, Clone)]
pub struct StratifiedLogitNormalModel {
    counts: StratifiedCounts,
    population_prior: PopulationPrior,
    use_likelihood: bool,
}

impl StratifiedLogitNormalModel {
    /// # Errors
    ///
    /// Returns `ModelError::InvalidInput` if the counts are malformed.
    pub fn new(
        counts: StratifiedCounts,
        config: LogitNormalModelConfig,
    ) -> Result<Self, ModelError> {
        counts.validate()?;
        Ok(Self {
            counts,
            population_prior: config.population_prior,
            use_likelihood: config.use_likelihood,
        })
    }

    #[must_use]
    pub const fn counts(&self) -> &StratifiedCounts {
        &self.counts
    }

    #[must_use]
    pub const fn n_strata(&self) -> usize {
        self.counts.n_strata()
    }

    #[must_use]
    pub const fn uses_likelihood(&self) -> bool {
        self.use_likelihood
    }

    /// `log p(theta) + log p(sigma) + sum_i log p(alpha_s[i])`.
    ///
    /// `theta` must lie in `(0, 1)` for `mu` to exist, whichever family is
    /// selected.
    #[must_use]
    pub fn log_prior(&self, parameters: &LogitNormalParameters) -> f64 {
        if parameters.alpha_s.len() != self.n_strata()
            || !(parameters.theta > 0.0 && parameters.theta < 1.0)
        {
            return f64::NEG_INFINITY;
        }
        self.population_prior.log_density(parameters.theta)
            + log_half_standard_normal_density(parameters.sigma)
            + parameters
                .alpha_s
                .iter()
                .map(|alpha| log_normal_density(*alpha, 0.0, 1.0))
                .sum::<f64>()
    }

    /// Binomial-logit log-likelihood; `0` when the likelihood is off.
    #[must_use]
    pub fn log_likelihood(&self, parameters: &LogitNormalParameters) -> f64 {
        if !self.use_likelihood {
            return 0.0;
        }
        if parameters.alpha_s.len() != self.n_strata() {
            return f64::NEG_INFINITY;
        }
        let mu = logit(parameters.theta);
        self.counts
            .iter()
            .zip(&parameters.alpha_s)
            .map(|((n, k), alpha)| {
                binomial_logit_log_pmf(n, k, parameters.sigma.mul_add(*alpha, mu))
            })
            .sum()
    }

    #[must_use]
    pub fn log_density(&self, parameters: &LogitNormalParameters) -> f64 {
        let prior = self.log_prior(parameters);
        if prior == f64::NEG_INFINITY || prior.is_nan() {
            return prior;
        }
        prior + self.log_likelihood(parameters)
    }

    /// Attach `mu` and `theta_s` to a set of sampled parameters.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn generated_quantities(&self, parameters: LogitNormalParameters) -> LogitNormalDraw {
        LogitNormalDraw::from_parameters(parameters)
    }

    fn parameters_with_jacobian(position: &[f64]) -> (LogitNormalParameters, f64) {
        let (theta, theta_jacobian) = unit_interval_constrain(position[0]);
        let (sigma, sigma_jacobian) = lower_bounded_constrain(position[1], 0.0);
        (
            LogitNormalParameters {
                theta,
                sigma,
                alpha_s: position[2..].to_vec(),
            },
            theta_jacobian + sigma_jacobian,
        )
    }
}

impl LogDensityModel for StratifiedLogitNormalModel {
    type Draw = LogitNormalDraw;

    fn dimension(&self) -> usize {
        self.n_strata() + 2
    }

    fn initial_point(&self) -> Vec<f64> {
        let mut position = Vec::with_capacity(self.dimension());
        position.push(unit_interval_unconstrain(self.counts.pooled_rate()));
        position.push(lower_bounded_unconstrain(INITIAL_SIGMA, 0.0));
        position.resize(self.dimension(), 0.0);
        position
    }

    fn unconstrained_log_density(&self, position: &[f64]) -> f64 {
        let (parameters, log_jacobian) = Self::parameters_with_jacobian(position);
        self.log_density(&parameters) + log_jacobian
    }

    fn constrain(&self, position: &[f64]) -> Self::Draw {
        self.generated_quantities(Self::parameters_with_jacobian(position).0)
    }
}

/// Posterior summary for the logit-normal model.
#[derive(Debug, Clone, Default)]
pub struct LogitNormalPosteriorSummary {
    pub theta: ParameterSummary,
    pub mu: ParameterSummary,
    pub sigma: ParameterSummary,
    pub alpha_s: Vec<ParameterSummary>,
    pub theta_s: Vec<ParameterSummary>,
    pub draw_count: usize,
}

#[must_use]
pub fn summarize_logit_normal_posterior(
    samples: &PosteriorSamples<LogitNormalDraw>,
) -> LogitNormalPosteriorSummary {
    let strata = samples.draws.first().map_or(0, |draw| draw.alpha_s.len());
    LogitNormalPosteriorSummary {
        theta: summarize_scalar(&samples.values(|draw| draw.theta)),
        mu: summarize_scalar(&samples.values(|draw| draw.mu)),
        sigma: summarize_scalar(&samples.values(|draw| draw.sigma)),
        alpha_s: summarize_components(samples, strata, |draw, index| draw.alpha_s[index]),
        theta_s: summarize_components(samples, strata, |draw, index| draw.theta_s[index]),
        draw_count: samples.len(),
    }
}

fn validated_model(
    counts: &StratifiedCounts,
    config: LogitNormalModelConfig,
) -> Result<StratifiedLogitNormalModel, ModelError> {
    let prior = config.population_prior;
    if !prior.is_valid() {
        return Err(ModelError::InvalidPopulationPrior {
            prior_x: prior.prior_x,
            prior_n: prior.prior_n,
        });
    }
    let model = StratifiedLogitNormalModel::new(counts.clone(), config)?;
    debug!(
        strata = model.n_strata(),
        prior = ?prior,
        use_likelihood = config.use_likelihood,
        "fitting stratified logit-normal model"
    );
    Ok(model)
}

/// Fit the logit-normal model with one chain.
///
/// # Errors
///
/// Returns `ModelError` if the counts, population prior, or sampler
/// configuration are invalid.
pub fn fit_logit_normal_model(
    counts: &StratifiedCounts,
    config: LogitNormalModelConfig,
    sampler: SamplerConfig,
) -> Result<
    (
        FitReport<LogitNormalPosteriorSummary>,
        PosteriorSamples<LogitNormalDraw>,
    ),
    ModelError,
> {
    let model = validated_model(counts, config)?;
    fit_single_chain(&model, sampler, summarize_logit_normal_posterior)
}

/// Fit the logit-normal model with independent parallel chains.
///
/// # Errors
///
/// Returns `ModelError` if the configuration is invalid, any chain fails, or
/// the chains are too short for convergence diagnostics.
pub fn fit_logit_normal_model_multi_chain(
    counts: &StratifiedCounts,
    config: LogitNormalModelConfig,
    sampler: SamplerConfig,
    multi_chain: MultiChainOptions,
) -> Result<
    (
        MultiChainReport<LogitNormalPosteriorSummary>,
        Vec<PosteriorSamples<LogitNormalDraw>>,
    ),
    ModelError,
> {
    let model = validated_model(counts, config)?;
    fit_multi_chain(&model, sampler, multi_chain, summarize_logit_normal_posterior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use statrs::distribution::{Beta, Binomial, Continuous, Discrete, Gamma, Normal};

    fn counts() -> StratifiedCounts {
        StratifiedCounts::new(vec![100, 50, 80], vec![10, 5, 12])
    }

    fn parameters() -> LogitNormalParameters {
        LogitNormalParameters {
            theta: 0.1,
            sigma: 0.4,
            alpha_s: vec![-0.5, 0.2, 1.1],
        }
    }

    fn model(
        population_prior: PopulationPrior,
        use_likelihood: bool,
    ) -> StratifiedLogitNormalModel {
        StratifiedLogitNormalModel::new(
            counts(),
            LogitNormalModelConfig {
                population_prior,
                use_likelihood,
            },
        )
        .expect("counts are valid")
    }

    #[test]
    fn generated_probabilities_invert_the_logit() {
        let draw = LogitNormalDraw::from_parameters(parameters());
        assert_relative_eq!(draw.mu, (0.1f64 / 0.9).ln(), epsilon = 1.0e-12);
        for (alpha, theta_s) in draw.alpha_s.iter().zip(&draw.theta_s) {
            let linear = draw.mu + draw.sigma * alpha;
            assert_relative_eq!(*theta_s, 1.0 / (1.0 + (-linear).exp()), epsilon = 1.0e-15);
        }
    }

    #[test]
    fn prior_matches_closed_form() {
        let params = parameters();
        let hierarchy = Normal::new(0.0, 1.0).unwrap().ln_pdf(params.sigma)
            + params
                .alpha_s
                .iter()
                .map(|alpha| Normal::new(0.0, 1.0).unwrap().ln_pdf(*alpha))
                .sum::<f64>();

        let beta = model(PopulationPrior::from_flag(true, 2.0, 30.0), false);
        assert_relative_eq!(
            beta.log_prior(&params),
            Beta::new(3.0, 28.0).unwrap().ln_pdf(0.1) + hierarchy,
            epsilon = 1.0e-9,
            max_relative = 1.0e-9
        );

        let gamma = model(PopulationPrior::from_flag(false, 2.0, 30.0), false);
        assert_relative_eq!(
            gamma.log_prior(&params),
            Gamma::new(3.0, 30.0).unwrap().ln_pdf(0.1) + hierarchy,
            epsilon = 1.0e-9,
            max_relative = 1.0e-9
        );
    }

    #[test]
    fn likelihood_uses_stratum_log_odds() {
        let params = parameters();
        let model = model(PopulationPrior::default(), true);
        let draw = LogitNormalDraw::from_parameters(params.clone());
        let expected = counts()
            .iter()
            .zip(&draw.theta_s)
            .map(|((n, k), theta)| Binomial::new(*theta, n).unwrap().ln_pmf(k))
            .sum::<f64>();
        assert_relative_eq!(
            model.log_likelihood(&params),
            expected,
            epsilon = 1.0e-9,
            max_relative = 1.0e-9
        );
        assert_relative_eq!(
            model.log_density(&params),
            model.log_prior(&params) + expected,
            epsilon = 1.0e-9,
            max_relative = 1.0e-9
        );
    }

    #[test]
    fn prior_only_model_ignores_count_order() {
        let config = LogitNormalModelConfig {
            population_prior: PopulationPrior::default(),
            use_likelihood: false,
        };
        let original = StratifiedLogitNormalModel::new(counts(), config).unwrap();
        let permuted = StratifiedLogitNormalModel::new(
            StratifiedCounts::new(vec![100, 50, 80], vec![5, 12, 10]),
            config,
        )
        .unwrap();
        let params = parameters();
        assert_relative_eq!(original.log_likelihood(&params), 0.0);
        assert_relative_eq!(original.log_density(&params), permuted.log_density(&params));
    }

    #[test]
    fn negative_sigma_and_boundary_theta_are_excluded() {
        let model = model(PopulationPrior::default(), true);
        let mut params = parameters();
        params.sigma = -0.1;
        assert_eq!(model.log_density(&params), f64::NEG_INFINITY);

        let mut params = parameters();
        params.theta = 1.0;
        assert_eq!(model.log_density(&params), f64::NEG_INFINITY);
    }

    #[test]
    fn population_prior_validity() {
        assert!(PopulationPrior::from_flag(true, 0.0, 1.0).is_valid());
        assert!(!PopulationPrior::from_flag(true, 5.0, 5.0).is_valid());
        assert!(PopulationPrior::from_flag(false, 5.0, 5.0).is_valid());
        assert!(!PopulationPrior::from_flag(false, 0.0, 0.0).is_valid());
        assert!(!PopulationPrior::from_flag(true, -1.0, 3.0).is_valid());
    }

    #[test]
    fn initial_point_is_finite_and_draw_is_named() {
        let model = model(PopulationPrior::from_flag(false, 1.0, 20.0), true);
        let start = model.initial_point();
        assert_eq!(start.len(), 5);
        assert!(model.unconstrained_log_density(&start).is_finite());

        let draw = model.constrain(&start);
        assert_relative_eq!(draw.sigma, INITIAL_SIGMA, epsilon = 1.0e-12);
        assert_eq!(draw.parameter_names().len(), 9);
        assert_eq!(draw.parameter_names()[3], "alpha_s[1]");
        assert_eq!(draw.parameter_names()[6], "theta_s[1]");
        assert_eq!(draw.parameter_values().len(), 9);
    }

    #[test]
    fn fit_rejects_improper_population_prior() {
        let result = fit_logit_normal_model(
            &counts(),
            LogitNormalModelConfig {
                population_prior: PopulationPrior::from_flag(true, 10.0, 4.0),
                use_likelihood: true,
            },
            SamplerConfig::default(),
        );
        assert!(matches!(
            result,
            Err(ModelError::InvalidPopulationPrior { .. })
        ));
    }
}
