use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Errors from discovering IDL files and running the Thrift compiler against them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to create output folder {path:?}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to resolve absolute path of {path:?}")]
    AbsolutePath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("source generation for {idl:?} returned with error code: {}", display_code(.code))]
    Generation { idl: PathBuf, code: Option<i32> },
    #[error("source generation for {idl:?} was unexpectedly interrupted")]
    Interrupted { idl: PathBuf },
    #[error("source generation for {idl:?} timed out after {timeout:?}")]
    Timeout { idl: PathBuf, timeout: Duration },
    #[error("failed to launch thrift compiler {executable:?}")]
    Launch {
        executable: String,
        #[source]
        source: io::Error,
    },
    #[error("failed waiting on thrift compiler for {idl:?}")]
    Wait {
        idl: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("IDL folder {path:?} is not a readable directory")]
    IdlRoot {
        path: PathBuf,
        #[source]
        source: Option<io::Error>,
    },
    #[error("{} IDL files failed to generate, first: {}", .0.len(), first(.0))]
    Multiple(Vec<Error>),
    #[error("invalid IDL suffix {suffix:?}")]
    Pattern {
        suffix: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to read manifest {path:?}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest {path:?}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Exit code of the compiler, if this error came from a compiler that exited non-zero.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::Generation { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether this error, or every error it aggregates, is an interruption.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Error::Interrupted { .. } => true,
            Error::Multiple(errors) => errors.iter().all(Error::is_interrupted),
            _ => false,
        }
    }
}

fn first(errors: &[Error]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}
