use flowmark::BenchError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unable to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in `{path}`: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unable to write report `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unable to render configuration: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Bench(#[from] BenchError),
}

impl RuntimeError {
    /// Errors raised while assembling the run configuration, before any transaction is sent.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Read { .. } | Self::Yaml { .. } => true,
            Self::Bench(err) => err.is_fatal(),
            _ => false,
        }
    }
}
