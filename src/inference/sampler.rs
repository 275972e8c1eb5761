//! Adaptive random-walk Metropolis-within-Gibbs sampler.
//!
//! Every iteration proposes a Gaussian step for each unconstrained
//! coordinate in turn and accepts it with the usual Metropolis rule. During
//! burn-in the per-coordinate step sizes are nudged toward the acceptance
//! window in [`ProposalTuning`]; after burn-in they are frozen.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace, warn};

use super::diagnostics::{ConvergenceSummary, summarize_convergence};
use super::posterior::{ParameterVector, PosteriorSamples};
use super::random::{sample_standard_normal, should_accept};
use super::{
    InferenceError, LogDensityModel, McmcConfig, MultiChainOptions, ProposalStats,
    ProposalTuning, SamplerConfig, SamplerDiagnostics,
};

const RHAT_WARNING_THRESHOLD: f64 = 1.1;

/// Draws and diagnostics from one chain.
#[derive(Debug, Clone)]
pub struct ChainResult<D> {
    pub samples: PosteriorSamples<D>,
    pub diagnostics: SamplerDiagnostics,
}

/// Draws, per-chain diagnostics, and convergence summary from several chains.
#[derive(Debug, Clone)]
pub struct MultiChainResult<D> {
    /// Chain posteriors in chain-index order.
    pub chains: Vec<PosteriorSamples<D>>,
    pub diagnostics: Vec<SamplerDiagnostics>,
    pub convergence: ConvergenceSummary,
}

/// Run one chain.
///
/// # Errors
///
/// Returns `InferenceError` if the configuration is invalid or the model's
/// log-density is not finite at its initial point.
pub fn sample_chain<M: LogDensityModel>(
    model: &M,
    config: SamplerConfig,
) -> Result<ChainResult<M::Draw>, InferenceError> {
    config.validate()?;
    run_chain(model, config, 0)
}

/// Run independent chains on scoped threads and summarize convergence.
///
/// Chain `i` is seeded with `options.chain_seed(config.mcmc.seed, i)`, so the
/// first chain reproduces [`sample_chain`] with the same configuration.
///
/// # Errors
///
/// Returns `InferenceError` if the configuration is invalid, any chain
/// fails, or the chains are too short for split-R-hat.
pub fn sample_chains<M>(
    model: &M,
    config: SamplerConfig,
    options: MultiChainOptions,
) -> Result<MultiChainResult<M::Draw>, InferenceError>
where
    M: LogDensityModel,
    M::Draw: ParameterVector,
{
    config.validate()?;
    options.validate()?;

    let results = std::thread::scope(|scope| {
        let handles = (0..options.chains)
            .map(|chain_index| {
                let chain_config = SamplerConfig {
                    mcmc: McmcConfig {
                        seed: options.chain_seed(config.mcmc.seed, chain_index),
                        ..config.mcmc
                    },
                    ..config
                };
                scope.spawn(move || run_chain(model, chain_config, chain_index))
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .enumerate()
            .map(|(chain, handle)| {
                handle
                    .join()
                    .map_err(|_| InferenceError::ChainPanicked { chain })
                    .and_then(std::convert::identity)
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let (chains, diagnostics): (Vec<_>, Vec<_>) = results
        .into_iter()
        .map(|result| (result.samples, result.diagnostics))
        .unzip();
    let convergence = summarize_convergence(&chains)?;

    if let Some(max_rhat) = convergence.max_split_rhat
        && max_rhat > RHAT_WARNING_THRESHOLD
    {
        warn!(
            max_split_rhat = max_rhat,
            chains = options.chains,
            "chains have not mixed; consider more iterations"
        );
    }

    Ok(MultiChainResult {
        chains,
        diagnostics,
        convergence,
    })
}

fn run_chain<M: LogDensityModel>(
    model: &M,
    config: SamplerConfig,
    chain_index: usize,
) -> Result<ChainResult<M::Draw>, InferenceError> {
    let SamplerConfig { mcmc, tuning } = config;
    let dimension = model.dimension();

    let mut position = model.initial_point();
    if position.len() != dimension {
        return Err(InferenceError::InitialPointMismatch {
            expected: dimension,
            found: position.len(),
        });
    }
    let mut current = model.unconstrained_log_density(&position);
    if !current.is_finite() {
        return Err(InferenceError::NonFiniteInitialDensity { value: current });
    }

    debug!(
        chain = chain_index,
        seed = mcmc.seed,
        dimension,
        iterations = mcmc.iterations,
        "starting MCMC chain"
    );

    let mut rng = StdRng::seed_from_u64(mcmc.seed);
    let mut scales = vec![tuning.initial_scale; dimension];
    let mut totals = vec![ProposalStats::default(); dimension];
    let mut window = vec![ProposalStats::default(); dimension];
    let mut draws = Vec::with_capacity(mcmc.retained_draws());

    for iter in 0..mcmc.iterations {
        for coordinate in 0..dimension {
            let previous = position[coordinate];
            position[coordinate] =
                scales[coordinate].mul_add(sample_standard_normal(&mut rng), previous);
            let candidate = model.unconstrained_log_density(&position);
            let accepted = candidate.is_finite() && should_accept(candidate - current, &mut rng);
            if accepted {
                current = candidate;
            } else {
                position[coordinate] = previous;
            }
            totals[coordinate].record(accepted);
            window[coordinate].record(accepted);
        }

        if mcmc.adapt_during_burn_in
            && iter < mcmc.burn_in
            && (iter + 1).is_multiple_of(tuning.adaptation_interval)
        {
            adapt_scales(&mut scales, &mut window, tuning);
            trace!(chain = chain_index, iteration = iter + 1, ?scales, "adapted proposal scales");
        }

        if iter >= mcmc.burn_in && (iter + 1 - mcmc.burn_in).is_multiple_of(mcmc.thin) {
            draws.push(model.constrain(&position));
        }
    }

    let acceptance_rate = ProposalStats::merged(&totals).acceptance_rate();
    debug!(
        chain = chain_index,
        retained = draws.len(),
        acceptance_rate,
        "finished MCMC chain"
    );

    Ok(ChainResult {
        diagnostics: SamplerDiagnostics {
            iterations_completed: mcmc.iterations,
            retained_draws: draws.len(),
            acceptance_rate,
            coordinate_acceptance_rates: totals
                .iter()
                .copied()
                .map(ProposalStats::acceptance_rate)
                .collect(),
            final_proposal_scales: scales,
        },
        samples: PosteriorSamples::new(draws),
    })
}

fn adapt_scales(scales: &mut [f64], window: &mut [ProposalStats], tuning: ProposalTuning) {
    for (scale, stats) in scales.iter_mut().zip(window.iter_mut()) {
        *scale = tuning.adapt(*scale, stats.acceptance_rate());
        *stats = ProposalStats::default();
    }
}
