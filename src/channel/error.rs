//! Error types for channel build and install operations.
//!
//! Provides contextual error chaining, filesystem errors with path context,
//! and the packaging error taxonomy: missing toolchains, unsatisfied
//! dependencies, and violated version constraints are all fatal and abort
//! the current channel immediately. Advisory conditions are not errors; see
//! [`crate::channel::Advisory`].

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};

use thiserror::Error as DeriveError;

use crate::channel::Channel;

/// Errors returned by channel builders and the index installer.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g. "copying project tree")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Child process failed to spawn or be awaited.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to execute
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// Native packaging toolchain not present on the host.
    ///
    /// Fatal; the user must install the prerequisite tooling or pick a
    /// different channel.
    #[error("{channel} toolchain unavailable: '{tool}' not found on PATH")]
    ToolchainUnavailable {
        /// Channel whose toolchain is missing
        channel: Channel,
        /// Tool that could not be located
        tool: String,
    },

    /// The invoked toolchain process exited non-zero.
    ///
    /// Never retried; packaging failures require operator intervention.
    #[error("{command} exited with {status}")]
    ToolchainFailed {
        /// Command line that was invoked
        command: String,
        /// Exit status reported by the process
        status: std::process::ExitStatus,
    },

    /// A mandatory dependency entry could not be located or installed.
    #[error("dependency '{entry}' unsatisfied: {reason}")]
    DependencyUnsatisfied {
        /// Name of the unsatisfied entry
        entry: String,
        /// Why it could not be satisfied
        reason: String,
    },

    /// A located dependency fails its stated minimum-version constraint.
    ///
    /// Surfaced with the offending entry, the required constraint, and the
    /// detected version; the build must not degrade silently.
    #[error("dependency '{entry}' requires >= {required}, detected {detected}")]
    VersionConstraintViolated {
        /// Name of the offending entry
        entry: String,
        /// Stated minimum version
        required: semver::Version,
        /// Version detected on the host
        detected: semver::Version,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking the staged directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// Artifact metadata serialization error.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    /// Spec template parsing error.
    #[error("{0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    /// Spec template rendering error.
    #[error("{0}")]
    Render(#[from] handlebars::RenderError),

    /// Semantic version parsing error.
    #[error("{0}")]
    SemverError(#[from] semver::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

impl From<handlebars::TemplateError> for Error {
    fn from(error: handlebars::TemplateError) -> Self {
        Error::Template(Box::new(error))
    }
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Works with both `Result<T>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the
    /// operation, e.g. "reading control file", "creating staging directory".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with a [`Error::GenericError`].
///
/// ```ignore
/// bail!("no artifact produced");
/// bail!("unexpected layout under {}", dir.display());
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::channel::error::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::channel::error::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::channel::error::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
