//! Count likelihoods for per-stratum misstatement data.

use num_traits::ToPrimitive;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use statrs::function::factorial::{ln_binomial, ln_factorial};

use crate::inference::transform::softplus;
use crate::input::u64_to_f64;

/// Likelihood family for observed misstatement counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikelihoodFamily {
    /// `k ~ Binomial(n, theta)`.
    #[default]
    Binomial,
    /// `k ~ Poisson(n * theta)`.
    Poisson,
}

impl LikelihoodFamily {
    /// Build the likelihood implementation for this family.
    #[must_use]
    pub fn build(self) -> Box<dyn CountLikelihood> {
        match self {
            Self::Binomial => Box::new(BinomialLikelihood),
            Self::Poisson => Box::new(PoissonLikelihood),
        }
    }
}

/// Log-likelihood of one stratum's count given its misstatement probability.
pub trait CountLikelihood: std::fmt::Debug + Send + Sync {
    fn family(&self) -> LikelihoodFamily;

    /// `log p(count | sample_size, probability)`.
    fn log_likelihood(&self, sample_size: u64, count: u64, probability: f64) -> f64;

    /// Draw a replicated count for posterior predictive checks.
    fn sample_count(&self, rng: &mut StdRng, sample_size: u64, probability: f64) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialLikelihood;

impl CountLikelihood for BinomialLikelihood {
    fn family(&self) -> LikelihoodFamily {
        LikelihoodFamily::Binomial
    }

    fn log_likelihood(&self, sample_size: u64, count: u64, probability: f64) -> f64 {
        binomial_log_pmf(sample_size, count, probability)
    }

    fn sample_count(&self, rng: &mut StdRng, sample_size: u64, probability: f64) -> u64 {
        if sample_size == 0 || probability.is_nan() || probability <= 0.0 {
            return 0;
        }
        if probability >= 1.0 {
            return sample_size;
        }
        rand_distr::Binomial::new(sample_size, probability)
            .map_or(0, |binomial| binomial.sample(rng))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonLikelihood;

impl CountLikelihood for PoissonLikelihood {
    fn family(&self) -> LikelihoodFamily {
        LikelihoodFamily::Poisson
    }

    fn log_likelihood(&self, sample_size: u64, count: u64, probability: f64) -> f64 {
        if !(0.0..=1.0).contains(&probability) {
            return f64::NEG_INFINITY;
        }
        poisson_log_pmf(count, u64_to_f64(sample_size) * probability)
    }

    fn sample_count(&self, rng: &mut StdRng, sample_size: u64, probability: f64) -> u64 {
        let mean = u64_to_f64(sample_size) * probability;
        if mean.is_nan() || mean <= 0.0 {
            return 0;
        }
        match rand_distr::Poisson::new(mean) {
            Ok(poisson) => {
                let draw: f64 = poisson.sample(rng);
                draw.to_u64().unwrap_or(u64::MAX)
            }
            // Means past the sampler's range are effectively deterministic.
            Err(_) => mean.to_u64().unwrap_or(u64::MAX),
        }
    }
}

/// `log Binomial(k | n, p)`, treating `0 * ln 0` as `0`.
#[must_use]
pub fn binomial_log_pmf(trials: u64, successes: u64, probability: f64) -> f64 {
    if successes > trials || !(0.0..=1.0).contains(&probability) {
        return f64::NEG_INFINITY;
    }
    let failures = trials - successes;
    let success_term = if successes == 0 {
        0.0
    } else {
        u64_to_f64(successes) * probability.ln()
    };
    let failure_term = if failures == 0 {
        0.0
    } else {
        u64_to_f64(failures) * (-probability).ln_1p()
    };
    ln_binomial(trials, successes) + success_term + failure_term
}

/// `log Poisson(k | mean)`, with `Poisson(0 | 0) = 1`.
#[must_use]
pub fn poisson_log_pmf(count: u64, mean: f64) -> f64 {
    if mean.is_nan() || mean < 0.0 {
        return f64::NEG_INFINITY;
    }
    let count_term = if count == 0 {
        0.0
    } else {
        u64_to_f64(count) * mean.ln()
    };
    count_term - mean - ln_factorial(count)
}

/// `log Binomial(k | n, inv_logit(log_odds))`, evaluated on the log-odds scale.
#[must_use]
pub fn binomial_logit_log_pmf(trials: u64, successes: u64, log_odds: f64) -> f64 {
    if successes > trials || log_odds.is_nan() {
        return f64::NEG_INFINITY;
    }
    ln_binomial(trials, successes) + u64_to_f64(successes) * log_odds
        - u64_to_f64(trials) * softplus(log_odds)
}
