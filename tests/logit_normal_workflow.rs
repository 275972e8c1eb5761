use approx::assert_relative_eq;
use stratified_audit_models::{
    EvaluationOptions, LikelihoodFamily, LogitNormalModelConfig, McmcConfig, ModelError,
    MultiChainOptions, PopulationPrior, SamplerConfig, StratifiedCounts, evaluate_misstatement,
    fit_logit_normal_model, fit_logit_normal_model_multi_chain, posterior_predictive_check,
};

fn counts() -> StratifiedCounts {
    StratifiedCounts::new(vec![120, 60, 90, 40], vec![6, 2, 9, 1])
}

fn sampler(iterations: usize, burn_in: usize, thin: usize, seed: u64) -> SamplerConfig {
    SamplerConfig {
        mcmc: McmcConfig {
            iterations,
            burn_in,
            thin,
            seed,
            adapt_during_burn_in: true,
        },
        ..SamplerConfig::default()
    }
}

#[test]
fn logit_normal_public_workflow_produces_consistent_draws() {
    let counts = counts();
    let config = LogitNormalModelConfig {
        population_prior: PopulationPrior::from_flag(true, 0.0, 1.0),
        use_likelihood: true,
    };

    let (report, samples) = fit_logit_normal_model(&counts, config, sampler(6_000, 2_000, 4, 31))
        .expect("fit should succeed");

    assert_eq!(samples.len(), 1_000);
    assert_eq!(report.diagnostics.coordinate_acceptance_rates.len(), 6);
    let summary = report.posterior_summary.expect("draws were retained");
    assert_eq!(summary.alpha_s.len(), 4);
    assert_eq!(summary.theta_s.len(), 4);
    assert!(summary.theta.mean > 0.01 && summary.theta.mean < 0.2);
    assert!(summary.sigma.q025 >= 0.0);

    for draw in &samples.draws {
        assert!(draw.sigma >= 0.0);
        assert_relative_eq!(draw.mu, (draw.theta / (1.0 - draw.theta)).ln(), epsilon = 1.0e-9);
        for (alpha, theta_s) in draw.alpha_s.iter().zip(&draw.theta_s) {
            let linear = draw.mu + draw.sigma * alpha;
            assert_relative_eq!(*theta_s, 1.0 / (1.0 + (-linear).exp()), epsilon = 1.0e-12);
        }
    }

    let evaluation =
        evaluate_misstatement(&samples, EvaluationOptions::default()).expect("evaluation runs");
    assert_eq!(evaluation.strata.len(), 4);
    assert!(evaluation.population.upper_bound > evaluation.population.median);

    let ppc = posterior_predictive_check(&samples, &counts, LikelihoodFamily::Binomial, 99)
        .expect("ppc should run");
    assert_eq!(ppc.observed_total, 18);
    assert!(ppc.tail_probability > 0.05 && ppc.tail_probability < 0.95);
}

#[test]
fn gamma_population_prior_is_accepted() {
    let config = LogitNormalModelConfig {
        population_prior: PopulationPrior::from_flag(false, 1.0, 20.0),
        use_likelihood: true,
    };
    let (report, samples) = fit_logit_normal_model(&counts(), config, sampler(2_000, 500, 3, 4))
        .expect("fit should succeed");
    assert_eq!(samples.len(), 500);
    assert!(samples.draws.iter().all(|draw| draw.theta > 0.0 && draw.theta < 1.0));
    assert!(report.posterior_summary.is_some());
}

#[test]
fn multi_chain_fit_names_derived_quantities() {
    let (report, chains) = fit_logit_normal_model_multi_chain(
        &counts(),
        LogitNormalModelConfig::default(),
        sampler(1_500, 500, 2, 3),
        MultiChainOptions::default(),
    )
    .expect("chains should run");

    assert_eq!(chains.len(), 4);
    let names = &report.convergence.parameter_names;
    assert_eq!(names.len(), 3 + 4 + 4);
    assert_eq!(names[0], "theta");
    assert_eq!(names[2], "sigma");
    assert_eq!(names.last().map(String::as_str), Some("theta_s[4]"));
    assert_eq!(
        report
            .pooled_posterior_summary
            .expect("pooled draws exist")
            .draw_count,
        2_000
    );
}

#[test]
fn invalid_sampler_schedule_is_reported_as_inference_error() {
    let result = fit_logit_normal_model(
        &counts(),
        LogitNormalModelConfig::default(),
        sampler(100, 100, 1, 1),
    );
    assert!(matches!(result, Err(ModelError::Inference(_))));
}
