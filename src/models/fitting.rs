//! Shared fit drivers: run the sampler on a model and package the draws
//! into reports.

use tracing::debug;

use crate::inference::{
    ChainResult, LogDensityModel, MultiChainOptions, MultiChainResult, ParameterVector,
    PosteriorSamples, SamplerConfig, sample_chain, sample_chains,
};

use super::types::{FitReport, ModelError, MultiChainReport};

pub(crate) fn fit_single_chain<M, S, F>(
    model: &M,
    sampler: SamplerConfig,
    summarize: F,
) -> Result<(FitReport<S>, PosteriorSamples<M::Draw>), ModelError>
where
    M: LogDensityModel,
    F: Fn(&PosteriorSamples<M::Draw>) -> S,
{
    let ChainResult {
        samples,
        diagnostics,
    } = sample_chain(model, sampler)?;
    let posterior_summary = (!samples.is_empty()).then(|| summarize(&samples));

    Ok((
        FitReport {
            diagnostics,
            posterior_summary,
        },
        samples,
    ))
}

pub(crate) fn fit_multi_chain<M, S, F>(
    model: &M,
    sampler: SamplerConfig,
    multi_chain: MultiChainOptions,
    summarize: F,
) -> Result<(MultiChainReport<S>, Vec<PosteriorSamples<M::Draw>>), ModelError>
where
    M: LogDensityModel,
    M::Draw: ParameterVector,
    F: Fn(&PosteriorSamples<M::Draw>) -> S,
{
    let MultiChainResult {
        chains,
        diagnostics,
        convergence,
    } = sample_chains(model, sampler, multi_chain)?;

    let chain_reports = chains
        .iter()
        .zip(diagnostics)
        .map(|(samples, diagnostics)| FitReport {
            diagnostics,
            posterior_summary: (!samples.is_empty()).then(|| summarize(samples)),
        })
        .collect();

    let pooled = PosteriorSamples::pooled(&chains);
    debug!(
        chains = chains.len(),
        pooled_draws = pooled.len(),
        max_split_rhat = convergence.max_split_rhat,
        "pooled multi-chain posterior"
    );
    let pooled_posterior_summary = (!pooled.is_empty()).then(|| summarize(&pooled));

    Ok((
        MultiChainReport {
            chain_reports,
            pooled_posterior_summary,
            convergence,
        },
        chains,
    ))
}
