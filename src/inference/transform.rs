//! Constraining transforms between the sampler's unconstrained space and
//! bounded parameter domains.
//!
//! Each `*_constrain` function returns the constrained value together with
//! `log |d value / d u|`, which must be added to the target density when it
//! is evaluated on the unconstrained scale.

/// Stable logistic transform.
#[must_use]
pub fn logistic_stable(value: f64) -> f64 {
    if value >= 0.0 {
        let z = (-value).exp();
        1.0 / (1.0 + z)
    } else {
        let z = value.exp();
        z / (1.0 + z)
    }
}

/// Log-odds `ln(p / (1 - p))`.
#[must_use]
pub fn logit(probability: f64) -> f64 {
    probability.ln() - (-probability).ln_1p()
}

/// Stable `ln(1 + exp(value))`.
#[must_use]
pub fn softplus(value: f64) -> f64 {
    value.max(0.0) + (-value.abs()).exp().ln_1p()
}

/// Map `u` to `(0, 1)` via the inverse-logit.
#[must_use]
pub fn unit_interval_constrain(unconstrained: f64) -> (f64, f64) {
    let value = logistic_stable(unconstrained);
    // ln p + ln(1 - p), without forming p near the boundaries.
    let log_jacobian = -softplus(-unconstrained) - softplus(unconstrained);
    (value, log_jacobian)
}

/// Inverse of [`unit_interval_constrain`].
#[must_use]
pub fn unit_interval_unconstrain(value: f64) -> f64 {
    logit(value)
}

/// Map `u` to `(lower, inf)` via `lower + exp(u)`.
#[must_use]
pub fn lower_bounded_constrain(unconstrained: f64, lower: f64) -> (f64, f64) {
    (lower + unconstrained.exp(), unconstrained)
}

/// Inverse of [`lower_bounded_constrain`].
#[must_use]
pub fn lower_bounded_unconstrain(value: f64, lower: f64) -> f64 {
    (value - lower).ln()
}
