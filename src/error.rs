//! Top-level error types for guibender-dist operations.
//!
//! Every fatal error kind surfaces a human-readable message naming the
//! specific unsatisfied entry or missing tool, plus recovery suggestions.

use thiserror::Error;

use crate::channel;
use crate::manifest::ManifestError;

/// Result type alias for guibender-dist operations
pub type Result<T> = std::result::Result<T, DistError>;

/// Main error type for all guibender-dist operations
#[derive(Error, Debug)]
pub enum DistError {
    /// Dependency manifest errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Channel build / install errors
    #[error("Channel error: {0}")]
    Channel(#[from] channel::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl DistError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DistError::Channel(channel::Error::ToolchainUnavailable { channel, tool }) => vec![
                format!("Install the native packaging toolchain providing '{tool}'"),
                format!("Or choose a different channel than '{channel}'"),
            ],
            DistError::Channel(channel::Error::DependencyUnsatisfied { entry, .. }) => vec![
                format!("Install '{entry}' through the host package manager"),
                "Re-run once the dependency is present".to_string(),
            ],
            DistError::Channel(channel::Error::VersionConstraintViolated {
                entry,
                required,
                ..
            }) => vec![
                format!("Upgrade '{entry}' to {required} or newer"),
                "Packaging failures are environment errors; no automatic retry is attempted"
                    .to_string(),
            ],
            DistError::Manifest(ManifestError::NoChannels { name }) => vec![format!(
                "Give the '{name}' entry at least one channel (index, rpm, deb, or all)"
            )],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
