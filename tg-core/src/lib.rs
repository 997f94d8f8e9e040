//! Generate sources from Thrift IDL files.
//!
//! A run is two independent passes, one over the main sources and one over the test sources.
//! Each pass finds every IDL file underneath its IDL folder, runs the external `thrift` compiler
//! against each of them, and reports its output directory so the caller can register it as a
//! source root with their build, see [`layout::BuildProject`].
//!
//! ```text
//! <executable> -r -out <output dir> -gen java <idl file>
//! ```

use std::path::{Path, PathBuf};

use derivative::Derivative;
use tg_cfg::ConfigSet;
use tokio_util::sync::CancellationToken;

pub mod cfgs;
pub mod defs;
pub mod discover;
pub mod error;
pub mod generate;
pub mod layout;
pub mod pool;
mod process;

#[cfg(test)]
mod tests;

pub use error::Error;

use discover::Discovery;
use generate::{Generator, Invocation, Supervision};
use pool::PoolSettings;

/// Which set of sources a [`GenerationPass`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Main,
    Test,
}

/// One discover-then-generate traversal over a single IDL folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPass {
    pub kind: PassKind,
    /// Folder searched for IDL files.
    pub idl_root: PathBuf,
    /// Folder generated sources are written to.
    pub output_dir: PathBuf,
}

/// Outcome of a successful [`GenerationPass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub kind: PassKind,
    /// Folder to register as a source root.
    pub output_dir: PathBuf,
    /// Every compiler run, in discovery order.
    pub invocations: Vec<Invocation>,
}

/// Outcome of a successful [`Runner::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub passes: Vec<PassReport>,
}

impl RunReport {
    /// Output folders to register as compile source roots.
    pub fn compile_source_roots(&self) -> impl Iterator<Item = &Path> + '_ {
        self.roots(PassKind::Main)
    }

    /// Output folders to register as test compile source roots.
    pub fn test_compile_source_roots(&self) -> impl Iterator<Item = &Path> + '_ {
        self.roots(PassKind::Test)
    }

    /// Total number of IDL files compiled.
    pub fn generated(&self) -> usize {
        self.passes.iter().map(|pass| pass.invocations.len()).sum()
    }

    fn roots(&self, kind: PassKind) -> impl Iterator<Item = &Path> + '_ {
        self.passes
            .iter()
            .filter(move |pass| pass.kind == kind)
            .map(|pass| pass.output_dir.as_path())
    }
}

/// Runs generation passes.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Runner {
    generator: Generator,
    discovery: Discovery,
    pool: PoolSettings,
    /// Kept so the effective settings can be logged.
    #[derivative(Debug = "ignore")]
    configs: Option<ConfigSet>,
}

impl Runner {
    pub fn new(generator: Generator, discovery: Discovery, pool: PoolSettings) -> Self {
        Runner {
            generator,
            discovery,
            pool,
            configs: None,
        }
    }

    /// Create a [`Runner`] for `executable` with every other setting read from `configs`.
    pub fn from_configs(executable: impl Into<String>, configs: &ConfigSet) -> Result<Self, Error> {
        let executable = executable.into();
        if executable.trim().is_empty() {
            return Err(Error::Config("no thrift compiler executable configured".to_string()));
        }

        let generator = Generator::new(executable, Supervision::from_configs(configs));
        let discovery = Discovery::from_configs(configs)?;
        let pool = PoolSettings::from_configs(configs);

        Ok(Runner {
            generator,
            discovery,
            pool,
            configs: Some(configs.clone()),
        })
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Run the pass over main sources then the pass over test sources.
    ///
    /// The first failing pass aborts the run; files generated before the failure stay on disk.
    pub async fn run(
        &self,
        sources: &GenerationPass,
        tests: &GenerationPass,
        cancel: &CancellationToken,
    ) -> Result<RunReport, Error> {
        self.log_settings();

        let mut report = RunReport::default();
        for pass in [sources, tests] {
            let pass_report = self.run_pass(pass, cancel).await?;
            report.passes.push(pass_report);
        }
        Ok(report)
    }

    /// Discover and generate every IDL file of a single pass.
    pub async fn run_pass(
        &self,
        pass: &GenerationPass,
        cancel: &CancellationToken,
    ) -> Result<PassReport, Error> {
        let idls = self.discovery.discover(&pass.idl_root)?;
        tracing::debug!(kind = ?pass.kind, files = idls.len(), "starting generation pass");

        let invocations =
            pool::generate_all(&self.generator, &idls, &pass.output_dir, self.pool, cancel)
                .await?;

        Ok(PassReport {
            kind: pass.kind,
            output_dir: pass.output_dir.clone(),
            invocations,
        })
    }

    fn log_settings(&self) {
        tracing::info!(executable = %self.generator.executable(), "using thrift compiler");
        tracing::debug!(pool = ?self.pool, "pool settings");
        if let Some(configs) = &self.configs {
            for (name, value, _desc) in configs.entries() {
                tracing::debug!(%name, %value, "config");
            }
        }
    }
}
