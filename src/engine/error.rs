//! Engine error types

use crate::bridge::BridgeError;
use crate::engine::golden::GoldenError;
use crate::runs::loader::LoadError;

/// Errors that stop a run before or around execution.
///
/// A failing activity is not one of these: it is an `Outcome` with
/// `OutcomeStatus::Error` and halts the run through the record.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Cannot reach SMART: {0}")]
    Connectivity(#[source] BridgeError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load: {0}")]
    Load(#[from] LoadError),

    #[error("Reseed failed: {0}")]
    Reseed(String),

    #[error("Golden snapshot failed: {0}")]
    Golden(#[from] GoldenError),
}

impl RunError {
    /// Errors raised before any activity could run
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            RunError::UnknownActivity(_)
                | RunError::Connectivity(_)
                | RunError::Config(_)
                | RunError::Load(_)
                | RunError::Reseed(_)
        )
    }
}
