//! Bounded pool of compiler invocations for a single generation pass.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tg_cfg::ConfigSet;
use tokio_util::sync::CancellationToken;

use crate::cfgs::{CONCURRENCY, FAIL_FAST};
use crate::generate::{Generator, Invocation};
use crate::Error;

/// What to do when one IDL file in a pass fails to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop launching compilers, terminate the ones in flight, report the first failure.
    FirstFailure,
    /// Attempt every file and report every failure.
    CollectAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of compiler processes running at once, at least 1.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            concurrency: 1,
            failure_policy: FailurePolicy::FirstFailure,
        }
    }
}

impl PoolSettings {
    pub fn from_configs(configs: &ConfigSet) -> Self {
        let concurrency = usize::try_from(CONCURRENCY.read(configs)).unwrap_or(usize::MAX);
        let failure_policy = if FAIL_FAST.read(configs) {
            FailurePolicy::FirstFailure
        } else {
            FailurePolicy::CollectAll
        };
        PoolSettings {
            concurrency: concurrency.max(1),
            failure_policy,
        }
    }
}

/// Compile every file in `idls` into `output_dir`.
///
/// Returned [`Invocation`]s are in the same order as `idls`, regardless of the order in which
/// the compilers finished.
pub async fn generate_all(
    generator: &Generator,
    idls: &[PathBuf],
    output_dir: &Path,
    settings: PoolSettings,
    cancel: &CancellationToken,
) -> Result<Vec<Invocation>, Error> {
    // Cancelling the caller's token cancels the pass, a failure only cancels this pass.
    let pass_cancel = cancel.child_token();

    let jobs_cancel = &pass_cancel;

    let mut results = futures::stream::iter(idls.iter().enumerate())
        .map(move |(idx, idl)| async move {
            (idx, generator.generate(idl, output_dir, jobs_cancel).await)
        })
        .buffer_unordered(settings.concurrency.max(1));

    let mut invocations = Vec::with_capacity(idls.len());
    let mut errors = Vec::new();
    while let Some((idx, result)) = results.next().await {
        match result {
            Ok(invocation) => invocations.push((idx, invocation)),
            Err(err) => match settings.failure_policy {
                FailurePolicy::CollectAll => errors.push(err),
                FailurePolicy::FirstFailure if errors.is_empty() => {
                    tracing::debug!(%err, "cancelling remaining IDL files");
                    pass_cancel.cancel();
                    errors.push(err);
                }
                // Anything after the first failure is fallout from cancelling the pass.
                FailurePolicy::FirstFailure => tracing::debug!(%err, "ignoring failure"),
            },
        }
    }

    match errors.len() {
        0 => {
            invocations.sort_by_key(|(idx, _)| *idx);
            Ok(invocations.into_iter().map(|(_, invocation)| invocation).collect())
        }
        1 => Err(errors.remove(0)),
        _ => Err(Error::Multiple(errors)),
    }
}
