//! Distribution channels and their builders.
//!
//! Three channels are supported, each an independent implementation of the
//! same contract (resolve entries, stage dependencies, invoke the toolchain,
//! emit the artifact) with no shared mutable state:
//!
//! | Channel | Artifact | Toolchain |
//! |---------|----------|-----------|
//! | index   | host install | `python3 -m pip` |
//! | rpm     | `.rpm`   | `rpmbuild` |
//! | deb     | `.deb`   | `dpkg-deb` |
//!
//! A build run proceeds sequentially through manifest resolution, dependency
//! verification, staging, toolchain invocation, and artifact emission. Build
//! dependencies are staged into a scoped environment ([`StagingEnv`]) that is
//! torn down on every exit path, so they never leak into the produced
//! artifact's runtime dependency metadata.

pub mod deb;
pub mod error;
pub mod index;
pub mod probe;
pub mod rpm;
pub mod staging;

pub use error::{Context, Error, ErrorExt, Result};
pub use staging::StagingEnv;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::manifest::DependencyEntry;
use probe::DependencyProbe;

/// A distribution channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Source-agnostic package index install path
    Index,
    /// Native RPM package
    Rpm,
    /// Native Debian package
    Deb,
}

impl Channel {
    /// Lowercase identifier used in CLI output and file paths.
    pub fn short_name(&self) -> &'static str {
        match self {
            Channel::Index => "index",
            Channel::Rpm => "rpm",
            Channel::Deb => "deb",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Advisory conditions collected during a build or install.
///
/// Advisories never abort the run; they are reported after success and are
/// never silently dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Advisory {
    /// A documented channel limitation, e.g. text matching unsupported under
    /// the generic index variant of the vision library.
    IncompatibleFeature {
        /// Affected entry name
        entry: String,
        /// The documented limitation
        detail: String,
    },

    /// An optional extra that could not be located or fetched.
    OptionalUnavailable {
        /// Affected entry name
        entry: String,
        /// Why it is unavailable
        reason: String,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::IncompatibleFeature { entry, detail } => {
                write!(f, "'{entry}': {detail}")
            }
            Advisory::OptionalUnavailable { entry, reason } => {
                write!(f, "optional '{entry}' unavailable: {reason}")
            }
        }
    }
}

/// The produced installable unit.
///
/// Immutable once produced; superseded by the next build invocation. The
/// recorded runtime dependency list mirrors what is embedded in the native
/// package metadata and is also written to a JSON sidecar so successive
/// builds can be compared.
#[derive(Clone, Debug, Serialize)]
pub struct BuildArtifact {
    /// Channel that produced the artifact
    pub channel: Channel,
    /// Path to the installable file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// SHA-256 checksum for integrity verification
    pub checksum: String,
    /// Runtime dependencies recorded in the package metadata.
    ///
    /// Build-only entries must never appear here.
    pub runtime_deps: Vec<String>,
}

impl BuildArtifact {
    /// Describe a freshly emitted artifact file.
    pub async fn from_file(
        channel: Channel,
        path: PathBuf,
        runtime_deps: Vec<String>,
    ) -> Result<Self> {
        let contents = tokio::fs::read(&path)
            .await
            .fs_context("reading artifact", &path)?;
        let checksum = hex::encode(Sha256::digest(&contents));
        Ok(BuildArtifact {
            channel,
            size: contents.len() as u64,
            checksum,
            path,
            runtime_deps,
        })
    }

    /// Write the JSON metadata sidecar next to the artifact.
    pub async fn write_metadata(&self) -> Result<PathBuf> {
        let sidecar = sidecar_path(&self.path);
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&sidecar, json)
            .await
            .fs_context("writing artifact metadata", &sidecar)?;
        Ok(sidecar)
    }
}

/// JSON sidecar path for an artifact (`<artifact>.json`).
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().unwrap_or_default().to_os_string();
    name.push(".json");
    artifact.with_file_name(name)
}

/// Result of a successful channel build.
#[derive(Clone, Debug)]
pub struct BuildReport {
    /// The emitted artifact
    pub artifact: BuildArtifact,
    /// Advisories collected along the way
    pub advisories: Vec<Advisory>,
}

/// Result of a successful index install.
#[derive(Clone, Debug)]
pub struct InstallReport {
    /// Entries that were delegated to the host's index fetch step
    pub installed: Vec<String>,
    /// Advisories collected along the way
    pub advisories: Vec<Advisory>,
}

/// Verify resolved entries against the host before staging anything.
///
/// Mandatory entries that cannot be located fail the build; located entries
/// below their stated minimum version fail it too, naming the entry, the
/// constraint, and the detected version. Optional extras and documented
/// limitations are collected as advisories.
pub(crate) fn verify_entries(
    entries: &[&DependencyEntry],
    probe: &dyn DependencyProbe,
) -> Result<Vec<Advisory>> {
    let mut advisories = Vec::new();
    for entry in entries {
        if let Some(limitation) = &entry.limitation {
            advisories.push(Advisory::IncompatibleFeature {
                entry: entry.name.clone(),
                detail: limitation.clone(),
            });
        }
        match probe.detect(&entry.name)? {
            Some(detected) => {
                if let Some(required) = &entry.min_version
                    && detected < *required
                {
                    return Err(Error::VersionConstraintViolated {
                        entry: entry.name.clone(),
                        required: required.clone(),
                        detected,
                    });
                }
                log::debug!("dependency '{}' detected at {detected}", entry.name);
            }
            None if entry.is_optional() => {
                advisories.push(Advisory::OptionalUnavailable {
                    entry: entry.name.clone(),
                    reason: "not detected on host".to_string(),
                });
            }
            None => {
                return Err(Error::DependencyUnsatisfied {
                    entry: entry.name.clone(),
                    reason: "not detected on host".to_string(),
                });
            }
        }
    }
    Ok(advisories)
}

/// Locate a toolchain binary, mapping absence to [`Error::ToolchainUnavailable`].
pub(crate) fn locate_tool(channel: Channel, tool: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| Error::ToolchainUnavailable {
        channel,
        tool: tool.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ChannelSelector, DependencyKind};
    use super::probe::StaticProbe;
    use semver::Version;

    fn entry(name: &str, kind: DependencyKind, min: Option<Version>) -> DependencyEntry {
        DependencyEntry {
            name: name.to_string(),
            kind,
            channels: vec![ChannelSelector::All],
            min_version: min,
            note: None,
            limitation: None,
        }
    }

    #[test]
    fn verify_fails_on_missing_mandatory_entry() {
        let probe = StaticProbe::default();
        let e = entry("pillow", DependencyKind::Runtime, None);
        let err = verify_entries(&[&e], &probe).unwrap_err();
        assert!(matches!(err, Error::DependencyUnsatisfied { entry, .. } if entry == "pillow"));
    }

    #[test]
    fn verify_fails_below_minimum_version() {
        let probe = StaticProbe::default().with("opencv", Version::new(2, 4, 13));
        let e = entry(
            "opencv",
            DependencyKind::Runtime,
            Some(Version::new(3, 0, 0)),
        );
        let err = verify_entries(&[&e], &probe).unwrap_err();
        match err {
            Error::VersionConstraintViolated {
                entry,
                required,
                detected,
            } => {
                assert_eq!(entry, "opencv");
                assert_eq!(required, Version::new(3, 0, 0));
                assert_eq!(detected, Version::new(2, 4, 13));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn verify_reports_missing_optional_as_advisory() {
        let probe = StaticProbe::default();
        let e = entry("autopy", DependencyKind::OptionalExtra, None);
        let advisories = verify_entries(&[&e], &probe).expect("optional must not fail");
        assert_eq!(
            advisories,
            vec![Advisory::OptionalUnavailable {
                entry: "autopy".to_string(),
                reason: "not detected on host".to_string(),
            }]
        );
    }

    #[test]
    fn verify_surfaces_documented_limitations() {
        let probe = StaticProbe::default().with("opencv-contrib", Version::new(4, 5, 0));
        let mut e = entry("opencv-contrib", DependencyKind::OptionalExtra, None);
        e.limitation = Some("no contrib modules for text matching".to_string());
        let advisories = verify_entries(&[&e], &probe).expect("limitation is advisory");
        assert!(matches!(
            &advisories[0],
            Advisory::IncompatibleFeature { entry, .. } if entry == "opencv-contrib"
        ));
    }

    #[test]
    fn sidecar_path_appends_json() {
        let path = Path::new("/tmp/dist/guibender-1.1.0.rpm");
        assert_eq!(
            sidecar_path(path),
            Path::new("/tmp/dist/guibender-1.1.0.rpm.json")
        );
    }
}
