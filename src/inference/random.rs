//! Random variates used by the sampler.

use rand::RngExt;
use rand::rngs::StdRng;

/// Box-Muller standard normal draw.
pub fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Metropolis acceptance test on the log scale.
pub fn should_accept(log_acceptance: f64, rng: &mut StdRng) -> bool {
    log_acceptance >= 0.0 || rng.random::<f64>().ln() < log_acceptance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn standard_normal_has_unit_scale() {
        let mut rng = StdRng::seed_from_u64(3);
        let draws = (0..10_000)
            .map(|_| sample_standard_normal(&mut rng))
            .collect::<Vec<_>>();
        let mean = draws.iter().sum::<f64>() / 10_000.0;
        let variance = draws.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / 10_000.0;
        assert!(mean.abs() < 0.05);
        assert!((variance - 1.0).abs() < 0.05);
    }
}
