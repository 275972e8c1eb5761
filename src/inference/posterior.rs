//! Posterior storage and scalar summaries.

use num_traits::ToPrimitive;

use super::usize_to_f64;

/// Flat, named view of the scalar parameters in one draw.
///
/// Names use 1-based stratum indices, e.g. `theta_s[1]`.
pub trait ParameterVector {
    fn parameter_names(&self) -> Vec<String>;
    fn parameter_values(&self) -> Vec<f64>;
}

/// Posterior draw collection in sampling order.
#[derive(Debug, Clone)]
pub struct PosteriorSamples<D> {
    pub draws: Vec<D>,
}

impl<D> Default for PosteriorSamples<D> {
    fn default() -> Self {
        Self { draws: Vec::new() }
    }
}

impl<D> PosteriorSamples<D> {
    #[must_use]
    pub const fn new(draws: Vec<D>) -> Self {
        Self { draws }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.draws.len()
    }

    /// Extract one scalar from every draw.
    pub fn values<F>(&self, extractor: F) -> Vec<f64>
    where
        F: Fn(&D) -> f64,
    {
        self.draws.iter().map(extractor).collect()
    }
}

impl<D: Clone> PosteriorSamples<D> {
    /// Concatenate several chains into one pooled collection.
    #[must_use]
    pub fn pooled(chains: &[Self]) -> Self {
        let total_draws = chains.iter().map(Self::len).sum();
        let mut draws = Vec::with_capacity(total_draws);
        for chain in chains {
            draws.extend(chain.draws.iter().cloned());
        }
        Self { draws }
    }
}

/// Scalar posterior summary statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub q025: f64,
    pub q50: f64,
    pub q975: f64,
}

/// Summarize one scalar parameter from its draws.
#[must_use]
pub fn summarize_scalar(values: &[f64]) -> ParameterSummary {
    if values.is_empty() {
        return ParameterSummary::default();
    }

    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>()
        / n.max(1.0);

    let sorted = sorted_copy(values);

    ParameterSummary {
        mean,
        std_dev: variance.sqrt(),
        q025: percentile(&sorted, 0.025),
        q50: percentile(&sorted, 0.5),
        q975: percentile(&sorted, 0.975),
    }
}

/// Summaries for a vector-valued parameter, one per component.
#[must_use]
pub fn summarize_components<D, F>(
    samples: &PosteriorSamples<D>,
    len: usize,
    extractor: F,
) -> Vec<ParameterSummary>
where
    F: Fn(&D, usize) -> f64,
{
    (0..len)
        .map(|index| {
            let values = samples.values(|draw| extractor(draw, index));
            summarize_scalar(&values)
        })
        .collect()
}

#[must_use]
pub(crate) fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear-interpolated percentile of already sorted values.
#[must_use]
pub fn percentile(sorted_values: &[f64], probability: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }

    let clamped = probability.clamp(0.0, 1.0);
    let last = sorted_values.len() - 1;
    let position = clamped * usize_to_f64(last);
    let lower = position.floor().to_usize().unwrap_or(0);
    let upper = position.ceil().to_usize().unwrap_or(last);

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = position - usize_to_f64(lower);
        (1.0 - weight).mul_add(sorted_values[lower], weight * sorted_values[upper])
    }
}
