//! Running the Thrift compiler against a single IDL file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tg_cfg::ConfigSet;
use tokio_util::sync::CancellationToken;

use crate::cfgs::{KILL_GRACE_MS, TIMEOUT_MS};
use crate::process::{CompilerProcess, Outcome};
use crate::Error;

/// Language the compiler generates, passed to `-gen`.
pub static GEN_LANGUAGE: &str = "java";

/// Record of a single successful compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// IDL file that was compiled.
    pub idl: PathBuf,
    /// Directory the generated sources were written to.
    pub output_dir: PathBuf,
    /// Full command line, starting with the executable.
    pub args: Vec<OsString>,
}

/// Build the command line for compiling `idl` into `output_dir`.
///
/// Paths are made absolute against the current directory without touching the filesystem.
pub fn command_line(
    executable: &str,
    idl: &Path,
    output_dir: &Path,
) -> Result<Vec<OsString>, Error> {
    let absolute = |path: &Path| {
        std::path::absolute(path).map_err(|source| Error::AbsolutePath {
            path: path.to_path_buf(),
            source,
        })
    };
    let output_dir = absolute(output_dir)?;
    let idl = absolute(idl)?;

    Ok(vec![
        OsString::from(executable),
        // Recurse through includes.
        OsString::from("-r"),
        OsString::from("-out"),
        output_dir.into_os_string(),
        OsString::from("-gen"),
        OsString::from(GEN_LANGUAGE),
        idl.into_os_string(),
    ])
}

/// Create `path` and all of its parents.
///
/// Only fails if the directory does not exist after trying, so racing creators are fine.
pub fn ensure_output_dir(path: &Path) -> Result<(), Error> {
    if let Err(source) = std::fs::create_dir_all(path) {
        if !path.is_dir() {
            return Err(Error::OutputDirectory {
                path: path.to_path_buf(),
                source,
            });
        }
    }
    Ok(())
}

/// Settings for how a compiler process is supervised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Supervision {
    /// Maximum time a single compiler process may run, `None` waits forever.
    pub timeout: Option<Duration>,
    /// Time between asking a process to exit and killing it.
    pub kill_grace: Duration,
}

impl Default for Supervision {
    fn default() -> Self {
        Supervision {
            timeout: None,
            kill_grace: Duration::from_millis(5_000),
        }
    }
}

impl Supervision {
    pub fn from_configs(configs: &ConfigSet) -> Self {
        let timeout = match TIMEOUT_MS.read(configs) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Supervision {
            timeout,
            kill_grace: Duration::from_millis(KILL_GRACE_MS.read(configs)),
        }
    }
}

/// Invokes the Thrift compiler.
#[derive(Debug, Clone)]
pub struct Generator {
    /// Path to the thrift compiler, or a bare name to look up on the `PATH`.
    executable: String,
    supervision: Supervision,
}

impl Generator {
    pub fn new(executable: impl Into<String>, supervision: Supervision) -> Self {
        Generator {
            executable: executable.into(),
            supervision,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Compile `idl` into `output_dir`, waiting for the compiler to finish.
    ///
    /// # Errors
    ///
    /// * [`Error::OutputDirectory`] if `output_dir` cannot be created.
    /// * [`Error::Launch`] if the compiler cannot be started.
    /// * [`Error::Generation`] if the compiler exits with a non-zero status.
    /// * [`Error::Interrupted`] if `cancel` fires first, the compiler is terminated.
    /// * [`Error::Timeout`] if the compiler runs past the configured timeout.
    pub async fn generate(
        &self,
        idl: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Invocation, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Interrupted {
                idl: idl.to_path_buf(),
            });
        }
        tracing::info!(?idl, "generating code");

        ensure_output_dir(output_dir)?;
        let args = command_line(&self.executable, idl, output_dir)?;
        tracing::info!(output_dir = ?args[3], "output folder");

        tracing::debug!(executable = %self.executable, "launching");
        let process = CompilerProcess::spawn(&args, self.supervision.kill_grace).map_err(
            |source| Error::Launch {
                executable: self.executable.clone(),
                source,
            },
        )?;

        tracing::debug!("waiting for compiler to return");
        let outcome = process
            .wait(cancel, self.supervision.timeout)
            .await
            .map_err(|source| Error::Wait {
                idl: idl.to_path_buf(),
                source,
            })?;

        match outcome {
            Outcome::Exited(status) => {
                tracing::debug!(code = status.code(), "compiler has returned");
                if !status.success() {
                    return Err(Error::Generation {
                        idl: idl.to_path_buf(),
                        code: status.code(),
                    });
                }
            }
            Outcome::Cancelled => {
                return Err(Error::Interrupted {
                    idl: idl.to_path_buf(),
                });
            }
            Outcome::TimedOut(timeout) => {
                return Err(Error::Timeout {
                    idl: idl.to_path_buf(),
                    timeout,
                });
            }
        }

        Ok(Invocation {
            idl: idl.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            args,
        })
    }
}
