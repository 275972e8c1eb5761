//! Audit conclusions drawn from posterior draws: credible upper bounds on
//! misstatement rates and posterior predictive checks on the counts.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::inference::posterior::sorted_copy;
use crate::inference::{
    ParameterSummary, PosteriorSamples, percentile, summarize_scalar, usize_to_f64,
};
use crate::input::{StratifiedCounts, u64_to_f64};

use super::likelihood::LikelihoodFamily;
use super::logit_normal::LogitNormalDraw;
use super::misstatement::MisstatementDraw;
use super::types::ModelError;

/// Population and per-stratum misstatement rates carried by a draw.
pub trait StratifiedRates {
    fn population_rate(&self) -> f64;
    fn stratum_rates(&self) -> &[f64];
}

impl StratifiedRates for MisstatementDraw {
    fn population_rate(&self) -> f64 {
        self.phi
    }

    fn stratum_rates(&self) -> &[f64] {
        &self.theta_s
    }
}

impl StratifiedRates for LogitNormalDraw {
    fn population_rate(&self) -> f64 {
        self.theta
    }

    fn stratum_rates(&self) -> &[f64] {
        &self.theta_s
    }
}

/// Options for [`evaluate_misstatement`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationOptions {
    /// Probability mass below the reported upper bound.
    pub conf_level: f64,
    /// Tolerable misstatement rate, if the audit has one.
    pub materiality: Option<f64>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            conf_level: 0.95,
            materiality: None,
        }
    }
}

impl EvaluationOptions {
    /// # Errors
    ///
    /// Returns `ModelError` if the confidence level or materiality is outside
    /// `(0, 1)`.
    pub fn validate(self) -> Result<(), ModelError> {
        if !(self.conf_level > 0.0 && self.conf_level < 1.0) {
            return Err(ModelError::InvalidConfidenceLevel(self.conf_level));
        }
        if let Some(materiality) = self.materiality
            && !(materiality > 0.0 && materiality < 1.0)
        {
            return Err(ModelError::InvalidMateriality(materiality));
        }
        Ok(())
    }
}

/// Posterior evaluation of one misstatement rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateEvaluation {
    pub mean: f64,
    pub median: f64,
    /// One-sided upper credible bound at the configured confidence level.
    pub upper_bound: f64,
    /// `upper_bound - median`.
    pub precision: f64,
    /// `P(rate < materiality)`; `None` without a materiality.
    pub probability_below_materiality: Option<f64>,
}

impl RateEvaluation {
    /// Whether the rate is below materiality with at least `conf_level`
    /// posterior probability.
    #[must_use]
    pub fn is_below_materiality(&self, conf_level: f64) -> Option<bool> {
        self.probability_below_materiality
            .map(|probability| probability >= conf_level)
    }
}

/// Posterior evaluation of the population and every stratum.
#[derive(Debug, Clone, Default)]
pub struct MisstatementEvaluation {
    pub conf_level: f64,
    pub materiality: Option<f64>,
    pub population: RateEvaluation,
    pub strata: Vec<RateEvaluation>,
    pub draw_count: usize,
}

/// Evaluate population and stratum misstatement rates from posterior draws.
///
/// # Errors
///
/// Returns `ModelError` if the options are invalid, there are no draws, or
/// the draws disagree on the number of strata.
pub fn evaluate_misstatement<D: StratifiedRates>(
    samples: &PosteriorSamples<D>,
    options: EvaluationOptions,
) -> Result<MisstatementEvaluation, ModelError> {
    options.validate()?;
    let strata = stratum_count(samples)?;

    let population = evaluate_rate(&samples.values(|draw| draw.population_rate()), options);
    let strata = (0..strata)
        .map(|index| {
            let rates = samples.values(|draw| draw.stratum_rates()[index]);
            evaluate_rate(&rates, options)
        })
        .collect();

    Ok(MisstatementEvaluation {
        conf_level: options.conf_level,
        materiality: options.materiality,
        population,
        strata,
        draw_count: samples.len(),
    })
}

fn evaluate_rate(rates: &[f64], options: EvaluationOptions) -> RateEvaluation {
    let sorted = sorted_copy(rates);
    let n = usize_to_f64(rates.len());
    let mean = rates.iter().sum::<f64>() / n;
    let median = percentile(&sorted, 0.5);
    let upper_bound = percentile(&sorted, options.conf_level);
    let probability_below_materiality = options.materiality.map(|materiality| {
        usize_to_f64(rates.iter().filter(|rate| **rate < materiality).count()) / n
    });

    RateEvaluation {
        mean,
        median,
        upper_bound,
        precision: upper_bound - median,
        probability_below_materiality,
    }
}

/// Replicated counts compared against the observed counts.
#[derive(Debug, Clone, Default)]
pub struct PosteriorPredictiveSummary {
    pub observed_total: u64,
    /// Replicated total misstatements across all strata.
    pub replicated_total: ParameterSummary,
    /// Replicated misstatements per stratum.
    pub replicated_strata: Vec<ParameterSummary>,
    /// `P(replicated_total >= observed_total)`.
    pub tail_probability: f64,
    pub draw_count: usize,
}

/// Replicate the audit sample from every draw and compare totals.
///
/// Counts are drawn from `family` with the draw's stratum rates. Applied to
/// draws from a prior-only fit this is a prior predictive check.
///
/// # Errors
///
/// Returns `ModelError` if the counts are malformed, there are no draws, or
/// the draws and counts disagree on the number of strata.
pub fn posterior_predictive_check<D: StratifiedRates>(
    samples: &PosteriorSamples<D>,
    counts: &StratifiedCounts,
    family: LikelihoodFamily,
    seed: u64,
) -> Result<PosteriorPredictiveSummary, ModelError> {
    counts.validate()?;
    let strata = stratum_count(samples)?;
    if strata != counts.n_strata() {
        return Err(ModelError::StratumCountMismatch {
            expected: counts.n_strata(),
            found: strata,
        });
    }

    let likelihood = family.build();
    let mut rng = StdRng::seed_from_u64(seed);
    let observed_total = counts.total_misstatements();

    let mut totals = Vec::with_capacity(samples.len());
    let mut per_stratum = vec![Vec::with_capacity(samples.len()); strata];
    let mut exceedances = 0_usize;
    for draw in &samples.draws {
        let mut total = 0_u64;
        for ((sample_size, _), (rate, replicates)) in counts
            .iter()
            .zip(draw.stratum_rates().iter().zip(per_stratum.iter_mut()))
        {
            let replicated = likelihood.sample_count(&mut rng, sample_size, *rate);
            total = total.saturating_add(replicated);
            replicates.push(u64_to_f64(replicated));
        }
        if total >= observed_total {
            exceedances += 1;
        }
        totals.push(u64_to_f64(total));
    }

    let tail_probability = usize_to_f64(exceedances) / usize_to_f64(samples.len());
    debug!(
        draws = samples.len(),
        observed_total,
        tail_probability,
        ?family,
        "posterior predictive check"
    );

    Ok(PosteriorPredictiveSummary {
        observed_total,
        replicated_total: summarize_scalar(&totals),
        replicated_strata: per_stratum
            .iter()
            .map(Vec::as_slice)
            .map(summarize_scalar)
            .collect(),
        tail_probability,
        draw_count: samples.len(),
    })
}

fn stratum_count<D: StratifiedRates>(samples: &PosteriorSamples<D>) -> Result<usize, ModelError> {
    let Some(first) = samples.draws.first() else {
        return Err(ModelError::EmptyPosterior);
    };
    let strata = first.stratum_rates().len();
    if let Some(draw) = samples
        .draws
        .iter()
        .find(|draw| draw.stratum_rates().len() != strata)
    {
        return Err(ModelError::StratumCountMismatch {
            expected: strata,
            found: draw.stratum_rates().len(),
        });
    }
    Ok(strata)
}
