//! Stratified misstatement model with a beta mean/concentration hierarchy.
//!
//! ```text
//! phi        ~ PriorFamily
//! nu         ~ Pareto(1, 1.5)
//! theta_s[i] ~ Beta(phi * nu, (1 - phi) * nu)
//! k[i]       ~ Binomial(n[i], theta_s[i])  or  Poisson(n[i] * theta_s[i])
//! ```
//!
//! The likelihood line is dropped when `use_likelihood` is off, which turns
//! the model into its own prior predictive.

use tracing::debug;

use crate::inference::transform::{
    lower_bounded_constrain, lower_bounded_unconstrain, unit_interval_constrain,
    unit_interval_unconstrain,
};
use crate::inference::{
    LogDensityModel, MultiChainOptions, ParameterSummary, ParameterVector, PosteriorSamples,
    SamplerConfig, summarize_components, summarize_scalar,
};
use crate::input::StratifiedCounts;

use super::fitting::{fit_multi_chain, fit_single_chain};
use super::likelihood::{CountLikelihood, LikelihoodFamily};
use super::priors::{PriorFamily, log_beta_density, log_pareto_density};
use super::types::{FitReport, ModelError, MultiChainReport};

/// Scale of the Pareto hyperprior on `nu`; also the lower bound of `nu`.
pub const CONCENTRATION_SCALE: f64 = 1.0;
/// Shape of the Pareto hyperprior on `nu`.
pub const CONCENTRATION_SHAPE: f64 = 1.5;

const INITIAL_CONCENTRATION: f64 = 10.0;

/// Configuration for [`StratifiedMisstatementModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MisstatementModelConfig {
    /// Hyperprior on the population misstatement probability `phi`.
    pub prior: PriorFamily,
    pub likelihood: LikelihoodFamily,
    /// When off, the counts do not enter the density.
    pub use_likelihood: bool,
}

impl Default for MisstatementModelConfig {
    fn default() -> Self {
        Self {
            prior: PriorFamily::Beta {
                alpha: 1.0,
                beta: 1.0,
            },
            likelihood: LikelihoodFamily::Binomial,
            use_likelihood: true,
        }
    }
}

/// One point in the model's parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct MisstatementDraw {
    /// Population misstatement probability.
    pub phi: f64,
    /// Concentration of the stratum probabilities around `phi`.
    pub nu: f64,
    /// Per-stratum misstatement probabilities.
    pub theta_s: Vec<f64>,
}

impl ParameterVector for MisstatementDraw {
    fn parameter_names(&self) -> Vec<String> {
        let mut names = vec!["phi".to_string(), "nu".to_string()];
        names.extend((1..=self.theta_s.len()).map(|index| format!("theta_s[{index}]")));
        names
    }

    fn parameter_values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.theta_s.len() + 2);
        values.push(self.phi);
        values.push(self.nu);
        values.extend_from_slice(&self.theta_s);
        values
    }
}

/// Beta mean/concentration hierarchy over stratum misstatement
/// probabilities.
///
/// The likelihood family is resolved once at construction; evaluating the
/// density never branches on configuration flags.
#[derive(Debug)]
pub struct StratifiedMisstatementModel {
    counts: StratifiedCounts,
    prior: PriorFamily,
    likelihood: Option<Box<dyn CountLikelihood>>,
}

impl StratifiedMisstatementModel {
    /// Build the model for `counts`.
    ///
    /// Prior hyperparameters are not checked here; out-of-range values show
    /// up as non-finite densities. The fit functions validate them.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidInput` if the counts are malformed.
    pub fn new(
        counts: StratifiedCounts,
        config: MisstatementModelConfig,
    ) -> Result<Self, ModelError> {
        counts.validate()?;
        Ok(Self {
            counts,
            prior: config.prior,
            likelihood: config.use_likelihood.then(|| config.likelihood.build()),
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
    pub const fn prior(&self) -> PriorFamily {
        self.prior
    }

    /// The active likelihood family, or `None` for a prior-only model.
    #[must_use]
    pub fn likelihood_family(&self) -> Option<LikelihoodFamily> {
        self.likelihood.as_deref().map(CountLikelihood::family)
    }

    /// `log p(phi) + log p(nu) + sum_i log p(theta_s[i] | phi, nu)`.
    ///
    /// Returns `-inf` outside the parameter domain or when `theta_s` does not
    /// have one entry per stratum.
    #[must_use]
    pub fn log_prior(&self, draw: &MisstatementDraw) -> f64 {
        if draw.theta_s.len() != self.n_strata() || !(0.0..=1.0).contains(&draw.phi) {
            return f64::NEG_INFINITY;
        }

        let population = self.prior.log_density(draw.phi)
            + log_pareto_density(draw.nu, CONCENTRATION_SCALE, CONCENTRATION_SHAPE);
        if population.is_nan() || population == f64::NEG_INFINITY {
            return population;
        }

        let alpha = draw.phi * draw.nu;
        let beta = (1.0 - draw.phi) * draw.nu;
        population
            + draw
                .theta_s
                .iter()
                .map(|theta| log_beta_density(*theta, alpha, beta))
                .sum::<f64>()
    }

    /// Log-likelihood of the observed counts; `0` for a prior-only model.
    #[must_use]
    pub fn log_likelihood(&self, draw: &MisstatementDraw) -> f64 {
        let Some(likelihood) = self.likelihood.as_deref() else {
            return 0.0;
        };
        if draw.theta_s.len() != self.n_strata() {
            return f64::NEG_INFINITY;
        }
        self.counts
            .iter()
            .zip(&draw.theta_s)
            .map(|((n, k), theta)| likelihood.log_likelihood(n, k, *theta))
            .sum()
    }

    /// Joint log-density `log_prior + log_likelihood`.
    #[must_use]
    pub fn log_density(&self, draw: &MisstatementDraw) -> f64 {
        let prior = self.log_prior(draw);
        if prior == f64::NEG_INFINITY || prior.is_nan() {
            return prior;
        }
        prior + self.log_likelihood(draw)
    }

    fn constrain_with_jacobian(&self, position: &[f64]) -> (MisstatementDraw, f64) {
        let (phi, phi_jacobian) = unit_interval_constrain(position[0]);
        let (nu, nu_jacobian) = lower_bounded_constrain(position[1], CONCENTRATION_SCALE);
        let mut log_jacobian = phi_jacobian + nu_jacobian;
        let theta_s = position[2..]
            .iter()
            .map(|value| {
                let (theta, jacobian) = unit_interval_constrain(*value);
                log_jacobian += jacobian;
                theta
            })
            .collect();
        (MisstatementDraw { phi, nu, theta_s }, log_jacobian)
    }
}

impl LogDensityModel for StratifiedMisstatementModel {
    type Draw = MisstatementDraw;

    fn dimension(&self) -> usize {
        self.n_strata() + 2
    }

    fn initial_point(&self) -> Vec<f64> {
        let phi = self.prior.interior_point(self.counts.pooled_rate());
        let mut position = Vec::with_capacity(self.dimension());
        position.push(unit_interval_unconstrain(phi));
        position.push(lower_bounded_unconstrain(
            INITIAL_CONCENTRATION,
            CONCENTRATION_SCALE,
        ));
        position.extend(
            self.counts
                .stratum_rates()
                .into_iter()
                .map(unit_interval_unconstrain),
        );
        position
    }

    fn unconstrained_log_density(&self, position: &[f64]) -> f64 {
        let (draw, log_jacobian) = self.constrain_with_jacobian(position);
        self.log_density(&draw) + log_jacobian
    }

    fn constrain(&self, position: &[f64]) -> Self::Draw {
        self.constrain_with_jacobian(position).0
    }
}

/// Posterior summary for the misstatement model.
#[derive(Debug, Clone, Default)]
pub struct MisstatementPosteriorSummary {
    pub phi: ParameterSummary,
    pub nu: ParameterSummary,
    pub theta_s: Vec<ParameterSummary>,
    pub draw_count: usize,
}

/// Summarize every parameter block.
#[must_use]
pub fn summarize_misstatement_posterior(
    samples: &PosteriorSamples<MisstatementDraw>,
) -> MisstatementPosteriorSummary {
    let strata = samples.draws.first().map_or(0, |draw| draw.theta_s.len());
    MisstatementPosteriorSummary {
        phi: summarize_scalar(&samples.values(|draw| draw.phi)),
        nu: summarize_scalar(&samples.values(|draw| draw.nu)),
        theta_s: summarize_components(samples, strata, |draw, index| draw.theta_s[index]),
        draw_count: samples.len(),
    }
}

fn validated_model(
    counts: &StratifiedCounts,
    config: MisstatementModelConfig,
) -> Result<StratifiedMisstatementModel, ModelError> {
    if !config.prior.is_valid() {
        return Err(ModelError::InvalidPrior(config.prior));
    }
    let model = StratifiedMisstatementModel::new(counts.clone(), config)?;
    debug!(
        strata = model.n_strata(),
        prior = ?config.prior,
        likelihood = ?model.likelihood_family(),
        "fitting stratified misstatement model"
    );
    Ok(model)
}

/// Fit the misstatement model with one chain.
///
/// # Errors
///
/// Returns `ModelError` if the counts, prior, or sampler configuration are
/// invalid, or if the density is not finite at the starting point.
pub fn fit_misstatement_model(
    counts: &StratifiedCounts,
    config: MisstatementModelConfig,
    sampler: SamplerConfig,
) -> Result<
    (
        FitReport<MisstatementPosteriorSummary>,
        PosteriorSamples<MisstatementDraw>,
    ),
    ModelError,
> {
    let model = validated_model(counts, config)?;
    fit_single_chain(&model, sampler, summarize_misstatement_posterior)
}

/// Fit the misstatement model with independent parallel chains.
///
/// # Errors
///
/// Returns `ModelError` if the configuration is invalid, any chain fails, or
/// the chains are too short for convergence diagnostics.
pub fn fit_misstatement_model_multi_chain(
    counts: &StratifiedCounts,
    config: MisstatementModelConfig,
    sampler: SamplerConfig,
    multi_chain: MultiChainOptions,
) -> Result<
    (
        MultiChainReport<MisstatementPosteriorSummary>,
        Vec<PosteriorSamples<MisstatementDraw>>,
    ),
    ModelError,
> {
    let model = validated_model(counts, config)?;
    fit_multi_chain(&model, sampler, multi_chain, summarize_misstatement_posterior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use statrs::distribution::{
        Beta, Binomial, Cauchy, ChiSquared, Continuous, Discrete, Exp, Gamma, Normal, Pareto,
        Poisson, StudentsT, Uniform,
    };

    use crate::models::priors::{PriorFamilyKind, PriorIndicators};

    fn scenario_counts() -> StratifiedCounts {
        StratifiedCounts::new(vec![100, 50, 80], vec![10, 5, 12])
    }

    fn scenario_draw() -> MisstatementDraw {
        MisstatementDraw {
            phi: 0.1,
            nu: 10.0,
            theta_s: vec![0.1, 0.1, 0.15],
        }
    }

    fn model(
        prior: PriorFamily,
        likelihood: LikelihoodFamily,
        use_likelihood: bool,
    ) -> StratifiedMisstatementModel {
        StratifiedMisstatementModel::new(
            scenario_counts(),
            MisstatementModelConfig {
                prior,
                likelihood,
                use_likelihood,
            },
        )
        .expect("scenario counts are valid")
    }

    fn reference_hierarchy(draw: &MisstatementDraw) -> f64 {
        let nu = Pareto::new(1.0, 1.5).unwrap().ln_pdf(draw.nu);
        let strata = Beta::new(draw.phi * draw.nu, (1.0 - draw.phi) * draw.nu).unwrap();
        nu + draw
            .theta_s
            .iter()
            .map(|theta| strata.ln_pdf(*theta))
            .sum::<f64>()
    }

    #[test]
    fn scenario_has_finite_posterior_density() {
        let model = model(
            PriorFamily::from_indicators(PriorIndicators::only(PriorFamilyKind::Beta), 1.0, 1.0)
                .expect("one flag is set"),
            LikelihoodFamily::Binomial,
            true,
        );
        let density = model.log_density(&scenario_draw());
        assert!(density.is_finite());

        let draw = scenario_draw();
        let likelihood = scenario_counts()
            .iter()
            .zip(&draw.theta_s)
            .map(|((n, k), theta)| Binomial::new(*theta, n).unwrap().ln_pmf(k))
            .sum::<f64>();
        // Beta(1, 1) contributes ln 1 = 0 for phi.
        assert_relative_eq!(
            density,
            reference_hierarchy(&draw) + likelihood,
            epsilon = 1.0e-9,
            max_relative = 1.0e-9
        );
    }

    /// Hyperparameters giving a proper prior with mass on the scenario's phi.
    fn valid_hyperparameters(kind: PriorFamilyKind) -> (f64, f64) {
        match kind {
            PriorFamilyKind::Uniform => (0.0, 0.5),
            PriorFamilyKind::Normal | PriorFamilyKind::Cauchy => (0.2, 0.3),
            _ => (2.0, 8.0),
        }
    }

    fn reference_family_term(kind: PriorFamilyKind, alpha: f64, beta: f64, phi: f64) -> f64 {
        match kind {
            PriorFamilyKind::Beta => Beta::new(alpha, beta).unwrap().ln_pdf(phi),
            PriorFamilyKind::Gamma => Gamma::new(alpha, beta).unwrap().ln_pdf(phi),
            PriorFamilyKind::Normal => Normal::new(alpha, beta).unwrap().ln_pdf(phi),
            PriorFamilyKind::Uniform => Uniform::new(alpha, beta).unwrap().ln_pdf(phi),
            PriorFamilyKind::Cauchy => Cauchy::new(alpha, beta).unwrap().ln_pdf(phi),
            PriorFamilyKind::StudentT => StudentsT::new(0.0, 1.0, alpha).unwrap().ln_pdf(phi),
            PriorFamilyKind::ChiSquared => ChiSquared::new(alpha).unwrap().ln_pdf(phi),
            PriorFamilyKind::Exponential => Exp::new(alpha).unwrap().ln_pdf(phi),
        }
    }

    #[test]
    fn prior_matches_closed_form_for_every_selected_family() {
        let draw = scenario_draw();
        for kind in PriorFamilyKind::ALL {
            let (alpha, beta) = valid_hyperparameters(kind);
            let prior = PriorFamily::from_indicators(PriorIndicators::only(kind), alpha, beta)
                .expect("one flag is set");
            assert!(prior.is_valid(), "{prior:?} should be valid");

            let model = model(prior, LikelihoodFamily::Binomial, false);
            assert_relative_eq!(
                model.log_prior(&draw),
                reference_family_term(kind, alpha, beta, draw.phi) + reference_hierarchy(&draw),
                epsilon = 1.0e-9,
                max_relative = 1.0e-9
            );
            assert_relative_eq!(model.log_density(&draw), model.log_prior(&draw));
        }
    }

    #[test]
    fn binomial_and_poisson_likelihoods_differ() {
        let draw = scenario_draw();
        let prior = PriorFamily::Beta {
            alpha: 1.0,
            beta: 1.0,
        };
        let binomial = model(prior, LikelihoodFamily::Binomial, true);
        let poisson = model(prior, LikelihoodFamily::Poisson, true);
        assert_eq!(binomial.likelihood_family(), Some(LikelihoodFamily::Binomial));
        assert_eq!(poisson.likelihood_family(), Some(LikelihoodFamily::Poisson));

        let expected_poisson = scenario_counts()
            .iter()
            .zip(&draw.theta_s)
            .map(|((n, k), theta)| Poisson::new(n as f64 * theta).unwrap().ln_pmf(k))
            .sum::<f64>();
        assert_relative_eq!(
            poisson.log_likelihood(&draw),
            expected_poisson,
            epsilon = 1.0e-9,
            max_relative = 1.0e-9
        );
        assert!((binomial.log_density(&draw) - poisson.log_density(&draw)).abs() > 1.0e-3);
    }

    #[test]
    fn prior_only_model_ignores_count_order() {
        let prior = PriorFamily::Beta {
            alpha: 1.0,
            beta: 1.0,
        };
        let config = MisstatementModelConfig {
            prior,
            likelihood: LikelihoodFamily::Binomial,
            use_likelihood: false,
        };
        let original = StratifiedMisstatementModel::new(scenario_counts(), config).unwrap();
        let permuted = StratifiedMisstatementModel::new(
            StratifiedCounts::new(vec![100, 50, 80], vec![12, 10, 5]),
            config,
        )
        .unwrap();
        let draw = scenario_draw();
        assert_eq!(original.likelihood_family(), None);
        assert_relative_eq!(original.log_likelihood(&draw), 0.0);
        assert_relative_eq!(original.log_density(&draw), permuted.log_density(&draw));
    }

    #[test]
    fn single_stratum_reduces_to_one_beta_term() {
        let model = StratifiedMisstatementModel::new(
            StratifiedCounts::new(vec![40], vec![2]),
            MisstatementModelConfig {
                use_likelihood: false,
                ..MisstatementModelConfig::default()
            },
        )
        .unwrap();
        let draw = MisstatementDraw {
            phi: 0.2,
            nu: 5.0,
            theta_s: vec![0.3],
        };
        let expected = Pareto::new(1.0, 1.5).unwrap().ln_pdf(5.0)
            + Beta::new(1.0, 4.0).unwrap().ln_pdf(0.3);
        assert_relative_eq!(model.log_density(&draw), expected, epsilon = 1.0e-12);
    }

    #[test]
    fn out_of_domain_points_have_zero_density() {
        let model = model(
            PriorFamily::Normal { mean: 0.0, sd: 1.0 },
            LikelihoodFamily::Binomial,
            true,
        );
        let mut draw = scenario_draw();
        draw.phi = 1.2;
        assert_eq!(model.log_density(&draw), f64::NEG_INFINITY);

        let mut draw = scenario_draw();
        draw.nu = 0.5;
        assert_eq!(model.log_density(&draw), f64::NEG_INFINITY);

        let mut draw = scenario_draw();
        draw.theta_s.pop();
        assert_eq!(model.log_density(&draw), f64::NEG_INFINITY);
    }

    #[test]
    fn initial_point_has_finite_density_for_every_family() {
        for kind in PriorFamilyKind::ALL {
            let prior = PriorFamily::from_hyperparameters(kind, 1.0, 1.0);
            let prior = if kind == PriorFamilyKind::Uniform {
                PriorFamily::Uniform {
                    lower: 0.0,
                    upper: 1.0,
                }
            } else {
                prior
            };
            let model = model(prior, LikelihoodFamily::Poisson, true);
            let start = model.initial_point();
            assert_eq!(start.len(), 5);
            assert!(
                model.unconstrained_log_density(&start).is_finite(),
                "{kind:?} start should be finite"
            );
        }
    }

    #[test]
    fn draw_names_follow_stratum_indices() {
        let names = scenario_draw().parameter_names();
        assert_eq!(names, vec!["phi", "nu", "theta_s[1]", "theta_s[2]", "theta_s[3]"]);
        assert_eq!(scenario_draw().parameter_values().len(), 5);
    }

    #[test]
    fn fit_rejects_invalid_prior() {
        let result = fit_misstatement_model(
            &scenario_counts(),
            MisstatementModelConfig {
                prior: PriorFamily::Exponential { rate: 0.0 },
                ..MisstatementModelConfig::default()
            },
            SamplerConfig::default(),
        );
        assert!(matches!(result, Err(ModelError::InvalidPrior(_))));
    }

    #[test]
    fn fit_rejects_mismatched_counts() {
        let result = fit_misstatement_model(
            &StratifiedCounts::new(vec![10, 20], vec![1]),
            MisstatementModelConfig::default(),
            SamplerConfig::default(),
        );
        assert!(matches!(result, Err(ModelError::InvalidInput(_))));
    }
}
