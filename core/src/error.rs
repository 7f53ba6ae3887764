//! Error type shared by every module of the core crate.
//!
//! `PreconditionsUnavailable` is the one variant that is not a failure: the
//! controller turns it into a deferred outcome and waits for the next trigger.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("not all prerequisites available (missing: {})", missing.join(", "))]
    PreconditionsUnavailable { missing: Vec<String> },

    #[error("prerequisite '{key}' has unusable value {value:?}: {reason}")]
    InvalidPrecondition {
        key: String,
        value: String,
        reason: &'static str,
    },

    #[error("key-value lookup of '{key}' failed: {detail}")]
    KeyValue { key: String, detail: String },

    #[error("service '{service}' never became {state} after {attempts} checks")]
    ServiceConvergenceTimeout {
        service: String,
        state: &'static str,
        attempts: u32,
    },

    #[error("service '{service}': {operation} failed: {detail}")]
    ServiceCommand {
        service: String,
        operation: &'static str,
        detail: String,
    },

    #[error("cannot write {}: {source}", path.display())]
    RenderWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read completion flag {}: {source}", path.display())]
    FlagRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("completion flag {} holds unrecognised content {content:?}", path.display())]
    FlagCorrupt { path: PathBuf, content: String },

    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {detail}", path.display())]
    ConfigParse { path: PathBuf, detail: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("cannot run '{program}': {source}")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode {what}: {detail}")]
    Encode { what: &'static str, detail: String },

    #[error("resource '{name}': {detail}")]
    Resource { name: String, detail: String },
}

impl BootstrapError {
    /// Whether the error only means "try again on the next trigger" and
    /// should not be reported as a failure.
    pub fn is_deferral(&self) -> bool {
        matches!(self, BootstrapError::PreconditionsUnavailable { .. })
    }
}

pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
