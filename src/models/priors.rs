//! Prior families and log-density helpers.
//!
//! All densities are fully normalized and return `-inf` outside their
//! support, so the sum of terms in a model is directly comparable with the
//! closed-form densities of the corresponding distributions.

use statrs::function::beta::ln_beta;
use statrs::function::gamma::ln_gamma;

use super::types::ModelError;

/// Hyperprior family on the population misstatement probability `phi`,
/// carrying its own family-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriorFamily {
    Beta { alpha: f64, beta: f64 },
    /// Shape/rate parameterization.
    Gamma { shape: f64, rate: f64 },
    Normal { mean: f64, sd: f64 },
    Uniform { lower: f64, upper: f64 },
    Cauchy { location: f64, scale: f64 },
    /// Standard Student-t (location 0, scale 1).
    StudentT { degrees_of_freedom: f64 },
    ChiSquared { degrees_of_freedom: f64 },
    Exponential { rate: f64 },
}

/// Family tag without parameters, used when mapping legacy hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorFamilyKind {
    Beta,
    Gamma,
    Normal,
    Uniform,
    Cauchy,
    StudentT,
    ChiSquared,
    Exponential,
}

impl PriorFamilyKind {
    pub const ALL: [Self; 8] = [
        Self::Beta,
        Self::Gamma,
        Self::Normal,
        Self::Uniform,
        Self::Cauchy,
        Self::StudentT,
        Self::ChiSquared,
        Self::Exponential,
    ];
}

/// Legacy one-hot prior selector.
///
/// Exactly one flag must be set; [`PriorIndicators::resolve`] rejects any
/// other combination instead of silently dropping the hyperprior.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorIndicators {
    pub beta: bool,
    pub gamma: bool,
    pub normal: bool,
    pub uniform: bool,
    pub cauchy: bool,
    pub student_t: bool,
    pub chi_squared: bool,
    pub exponential: bool,
}

impl PriorIndicators {
    /// Indicators with only `kind` switched on.
    #[must_use]
    pub fn only(kind: PriorFamilyKind) -> Self {
        let mut indicators = Self::default();
        match kind {
            PriorFamilyKind::Beta => indicators.beta = true,
            PriorFamilyKind::Gamma => indicators.gamma = true,
            PriorFamilyKind::Normal => indicators.normal = true,
            PriorFamilyKind::Uniform => indicators.uniform = true,
            PriorFamilyKind::Cauchy => indicators.cauchy = true,
            PriorFamilyKind::StudentT => indicators.student_t = true,
            PriorFamilyKind::ChiSquared => indicators.chi_squared = true,
            PriorFamilyKind::Exponential => indicators.exponential = true,
        }
        indicators
    }

    /// The single active family.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::AmbiguousPriorSelection` unless exactly one flag is set.
    pub fn resolve(self) -> Result<PriorFamilyKind, ModelError> {
        let flags = [
            self.beta,
            self.gamma,
            self.normal,
            self.uniform,
            self.cauchy,
            self.student_t,
            self.chi_squared,
            self.exponential,
        ];
        let active = PriorFamilyKind::ALL
            .iter()
            .zip(flags)
            .filter_map(|(kind, flag)| flag.then_some(*kind))
            .collect::<Vec<_>>();
        match active.as_slice() {
            [kind] => Ok(*kind),
            _ => Err(ModelError::AmbiguousPriorSelection {
                active: active.len(),
            }),
        }
    }
}

impl PriorFamily {
    /// Map the shared `(alpha, beta)` hyperparameters onto a family.
    ///
    /// Two-parameter families use `(alpha, beta)` in order; student-t,
    /// chi-squared and exponential use `alpha` alone.
    #[must_use]
    pub const fn from_hyperparameters(kind: PriorFamilyKind, alpha: f64, beta: f64) -> Self {
        match kind {
            PriorFamilyKind::Beta => Self::Beta { alpha, beta },
            PriorFamilyKind::Gamma => Self::Gamma {
                shape: alpha,
                rate: beta,
            },
            PriorFamilyKind::Normal => Self::Normal {
                mean: alpha,
                sd: beta,
            },
            PriorFamilyKind::Uniform => Self::Uniform {
                lower: alpha,
                upper: beta,
            },
            PriorFamilyKind::Cauchy => Self::Cauchy {
                location: alpha,
                scale: beta,
            },
            PriorFamilyKind::StudentT => Self::StudentT {
                degrees_of_freedom: alpha,
            },
            PriorFamilyKind::ChiSquared => Self::ChiSquared {
                degrees_of_freedom: alpha,
            },
            PriorFamilyKind::Exponential => Self::Exponential { rate: alpha },
        }
    }

    /// Resolve legacy one-hot flags and hyperparameters into a family.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::AmbiguousPriorSelection` unless exactly one flag is set.
    pub fn from_indicators(
        indicators: PriorIndicators,
        alpha: f64,
        beta: f64,
    ) -> Result<Self, ModelError> {
        Ok(Self::from_hyperparameters(indicators.resolve()?, alpha, beta))
    }

    #[must_use]
    pub const fn kind(self) -> PriorFamilyKind {
        match self {
            Self::Beta { .. } => PriorFamilyKind::Beta,
            Self::Gamma { .. } => PriorFamilyKind::Gamma,
            Self::Normal { .. } => PriorFamilyKind::Normal,
            Self::Uniform { .. } => PriorFamilyKind::Uniform,
            Self::Cauchy { .. } => PriorFamilyKind::Cauchy,
            Self::StudentT { .. } => PriorFamilyKind::StudentT,
            Self::ChiSquared { .. } => PriorFamilyKind::ChiSquared,
            Self::Exponential { .. } => PriorFamilyKind::Exponential,
        }
    }

    /// Whether the family parameters define a proper distribution that puts
    /// mass on `(0, 1)`.
    #[must_use]
    pub fn is_valid(self) -> bool {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        match self {
            Self::Beta { alpha, beta } => positive(alpha) && positive(beta),
            Self::Gamma { shape, rate } => positive(shape) && positive(rate),
            Self::Normal { mean, sd } => mean.is_finite() && positive(sd),
            Self::Uniform { lower, upper } => {
                lower.is_finite()
                    && upper.is_finite()
                    && lower < upper
                    && lower < 1.0
                    && upper > 0.0
            }
            Self::Cauchy { location, scale } => location.is_finite() && positive(scale),
            Self::StudentT { degrees_of_freedom } | Self::ChiSquared { degrees_of_freedom } => {
                positive(degrees_of_freedom)
            }
            Self::Exponential { rate } => positive(rate),
        }
    }

    /// Log-density of the family at `value`.
    #[must_use]
    pub fn log_density(self, value: f64) -> f64 {
        match self {
            Self::Beta { alpha, beta } => log_beta_density(value, alpha, beta),
            Self::Gamma { shape, rate } => log_gamma_density(value, shape, rate),
            Self::Normal { mean, sd } => log_normal_density(value, mean, sd),
            Self::Uniform { lower, upper } => log_uniform_density(value, lower, upper),
            Self::Cauchy { location, scale } => log_cauchy_density(value, location, scale),
            Self::StudentT { degrees_of_freedom } => {
                log_student_t_density(value, degrees_of_freedom)
            }
            Self::ChiSquared { degrees_of_freedom } => {
                log_chi_squared_density(value, degrees_of_freedom)
            }
            Self::Exponential { rate } => log_exponential_density(value, rate),
        }
    }

    /// A starting value inside `(0, 1)` that also lies in the family support.
    ///
    /// `preferred` is returned unchanged unless a uniform prior excludes it.
    #[must_use]
    pub fn interior_point(self, preferred: f64) -> f64 {
        match self {
            Self::Uniform { lower, upper } => {
                let low = lower.max(0.0);
                let high = upper.min(1.0);
                if preferred > low && preferred < high {
                    preferred
                } else {
                    0.5 * (low + high)
                }
            }
            _ => preferred,
        }
    }
}

/// Log-density for `Beta(alpha, beta)`.
#[must_use]
pub fn log_beta_density(value: f64, alpha: f64, beta: f64) -> f64 {
    if !(alpha > 0.0 && beta > 0.0) || !(0.0..=1.0).contains(&value) {
        return f64::NEG_INFINITY;
    }
    let log_value = if alpha == 1.0 { 0.0 } else { (alpha - 1.0) * value.ln() };
    let log_complement = if beta == 1.0 {
        0.0
    } else {
        (beta - 1.0) * (-value).ln_1p()
    };
    log_value + log_complement - ln_beta(alpha, beta)
}

/// Log-density for `Gamma(shape, rate)`.
#[must_use]
pub fn log_gamma_density(value: f64, shape: f64, rate: f64) -> f64 {
    if !(value > 0.0 && shape > 0.0 && rate > 0.0) {
        return f64::NEG_INFINITY;
    }
    shape.mul_add(rate.ln(), -ln_gamma(shape)) + (shape - 1.0).mul_add(value.ln(), -rate * value)
}

/// Log-density for `Normal(mean, sd)`.
#[must_use]
pub fn log_normal_density(value: f64, mean: f64, sd: f64) -> f64 {
    if sd <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let z = (value - mean) / sd;
    -0.5 * z.mul_add(z, std::f64::consts::TAU.ln()) - sd.ln()
}

/// Log-density for `Uniform(low, high)`.
#[must_use]
pub fn log_uniform_density(value: f64, low: f64, high: f64) -> f64 {
    if low.partial_cmp(&high) != Some(std::cmp::Ordering::Less) {
        return f64::NAN;
    }
    if (low..=high).contains(&value) {
        -(high - low).ln()
    } else {
        f64::NEG_INFINITY
    }
}

/// Log-density for `Cauchy(location, scale)`.
#[must_use]
pub fn log_cauchy_density(value: f64, location: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let z = (value - location) / scale;
    -(std::f64::consts::PI.ln() + scale.ln() + (z * z).ln_1p())
}

/// Log-density for the standard Student-t with `dof` degrees of freedom.
#[must_use]
pub fn log_student_t_density(value: f64, dof: f64) -> f64 {
    if dof <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let half_next = 0.5 * (dof + 1.0);
    ln_gamma(half_next)
        - ln_gamma(0.5 * dof)
        - 0.5 * (dof * std::f64::consts::PI).ln()
        - half_next * (value * value / dof).ln_1p()
}

/// Log-density for `ChiSquared(dof)`.
#[must_use]
pub fn log_chi_squared_density(value: f64, dof: f64) -> f64 {
    if !(value > 0.0 && dof > 0.0) {
        return f64::NEG_INFINITY;
    }
    let half = 0.5 * dof;
    (half - 1.0).mul_add(value.ln(), -0.5 * value) - half * std::f64::consts::LN_2 - ln_gamma(half)
}

/// Log-density for `Exponential(rate)`.
#[must_use]
pub fn log_exponential_density(value: f64, rate: f64) -> f64 {
    if !(value >= 0.0 && rate > 0.0) {
        return f64::NEG_INFINITY;
    }
    rate.ln() - rate * value
}

/// Log-density for `Pareto(scale, shape)`.
#[must_use]
pub fn log_pareto_density(value: f64, scale: f64, shape: f64) -> f64 {
    if !(scale > 0.0 && shape > 0.0) || value < scale {
        return f64::NEG_INFINITY;
    }
    shape.ln() + shape * scale.ln() - (shape + 1.0) * value.ln()
}

/// Log-density for `Normal(0, 1)` restricted to `value >= 0`.
///
/// The restriction comes from the parameter's domain; no truncation
/// constant is added.
#[must_use]
pub fn log_half_standard_normal_density(value: f64) -> f64 {
    if value < 0.0 {
        return f64::NEG_INFINITY;
    }
    log_normal_density(value, 0.0, 1.0)
}
