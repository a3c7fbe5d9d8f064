//! Index-based install channel.
//!
//! Resolves the manifest for the index channel and delegates each entry to
//! the host's native index fetch step (`python3 -m pip install` by default).
//! Two profiles exist against the same manifest: `core` installs the
//! mandatory runtime entries only, `full` additionally attempts every
//! optional extra. Optional entries that cannot be fetched are reported as
//! advisories, never as failures.

use std::fmt;
use std::process::Command;

use crate::channel::error::{Error, Result};
use crate::channel::{locate_tool, Advisory, Channel, InstallReport};
use crate::manifest::{DependencyEntry, Manifest};

/// Install profile for the index channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Profile {
    /// Mandatory runtime entries only
    Core,
    /// Mandatory entries plus all optional extras
    Full,
}

impl Profile {
    /// Whether this profile opts into optional extras.
    pub fn include_optional(self) -> bool {
        self == Profile::Full
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Core => write!(f, "core"),
            Profile::Full => write!(f, "full"),
        }
    }
}

/// The host's index-package fetch step.
///
/// An external collaborator; the installer only decides what to fetch and
/// how failures are classified.
pub trait IndexFetcher {
    /// Verify the fetch tooling exists before any entry is attempted.
    fn ensure_available(&self) -> Result<()>;

    /// Fetch a single entry, returning a reason string on failure.
    fn fetch(&self, entry: &DependencyEntry) -> std::result::Result<(), String>;
}

/// Fetcher delegating to `python3 -m pip install`.
///
/// Version constraints are encoded into the requirement specifier
/// (`name>=min`), so the index resolver enforces them during the fetch.
#[derive(Clone, Debug)]
pub struct PipFetcher {
    python: String,
}

impl PipFetcher {
    /// Create a fetcher using the default `python3` interpreter.
    pub fn new() -> Self {
        PipFetcher {
            python: "python3".to_string(),
        }
    }

    /// Override the interpreter binary.
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }
}

impl Default for PipFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexFetcher for PipFetcher {
    fn ensure_available(&self) -> Result<()> {
        locate_tool(Channel::Index, &self.python)?;
        Ok(())
    }

    fn fetch(&self, entry: &DependencyEntry) -> std::result::Result<(), String> {
        let requirement = pip_requirement(entry);
        log::info!("Fetching {requirement}");
        let output = Command::new(&self.python)
            .args(["-m", "pip", "install", &requirement])
            .output()
            .map_err(|e| format!("failed to run pip: {e}"))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(stderr.lines().last().unwrap_or("pip failed").to_string())
        }
    }
}

/// Requirement specifier passed to the index resolver.
fn pip_requirement(entry: &DependencyEntry) -> String {
    match &entry.min_version {
        Some(min) => format!("{}>={min}", entry.name),
        None => entry.name.clone(),
    }
}

/// Installer front-end for the index channel.
#[derive(Clone, Debug)]
pub struct IndexInstaller<F: IndexFetcher> {
    fetcher: F,
}

impl IndexInstaller<PipFetcher> {
    /// Installer backed by the host's pip.
    pub fn host() -> Self {
        IndexInstaller {
            fetcher: PipFetcher::new(),
        }
    }
}

impl<F: IndexFetcher> IndexInstaller<F> {
    /// Installer backed by a custom fetch step.
    pub fn with_fetcher(fetcher: F) -> Self {
        IndexInstaller { fetcher }
    }

    /// Install the manifest under the given profile.
    ///
    /// Fails with a dependency error when a mandatory entry cannot be
    /// fetched; optional entries that cannot be fetched under the full
    /// profile are reported as advisories and the install still succeeds.
    pub fn install(&self, manifest: &Manifest, profile: Profile) -> Result<InstallReport> {
        self.fetcher.ensure_available()?;

        let mut installed = Vec::new();
        let mut advisories = Vec::new();
        for entry in manifest.resolve(Channel::Index, profile.include_optional()) {
            // Install profiles cover install-time entries only
            if entry.is_build_only() {
                continue;
            }
            if let Some(limitation) = &entry.limitation {
                advisories.push(Advisory::IncompatibleFeature {
                    entry: entry.name.clone(),
                    detail: limitation.clone(),
                });
            }
            match self.fetcher.fetch(entry) {
                Ok(()) => installed.push(entry.name.clone()),
                Err(reason) if entry.is_optional() => {
                    advisories.push(Advisory::OptionalUnavailable {
                        entry: entry.name.clone(),
                        reason,
                    });
                }
                Err(reason) => {
                    return Err(Error::DependencyUnsatisfied {
                        entry: entry.name.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(InstallReport {
            installed,
            advisories,
        })
    }
}
