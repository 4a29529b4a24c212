use thiserror::Error;

/// Errors surfaced by the benchmark engine.
///
/// Only [`BenchError::Configuration`] is fatal. Every other variant is scoped to a single
/// transaction attempt and ends up as a failed record.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] LedgerError),

    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Cancelled")]
    Cancelled,
}

impl BenchError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Errors reported by a [`crate::LedgerClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Rejected by the ledger: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unable to decode ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// The detail carried by the error, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport(msg) | Self::Rejected(msg) | Self::NotFound(msg) | Self::Decode(msg) => {
                msg
            }
        }
    }
}

/// Conversion failure of a configured script argument.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Unsupported argument type `{0}`")]
    UnsupportedType(String),

    #[error("Invalid {kind} value `{value}`: {reason}")]
    InvalidValue {
        kind: &'static str,
        value: String,
        reason: String,
    },
}

impl ArgumentError {
    pub(crate) fn invalid(kind: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            kind,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
