//! Dependency manifest: the single source of truth for what must or may be
//! installed, per channel and per lifecycle stage.
//!
//! The manifest is a declarative TOML document (`dist-manifest.toml`):
//!
//! ```toml
//! [package]
//! name = "guibender"
//! version = "1.1.0"
//!
//! [[dependency]]
//! name = "opencv"
//! kind = "runtime"
//! channels = ["all"]
//! min-version = "3.0.0"
//! note = "feature matching requires the 3.x matcher API"
//! ```
//!
//! Every entry applies to at least one channel (validated at load time), and
//! optional extras are never promoted to mandatory: [`Manifest::resolve`]
//! only yields them when the caller explicitly opts in.

use std::fmt;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::Channel;

/// Errors raised while loading or validating a dependency manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Path to the manifest file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Manifest file is not valid TOML
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        /// Path to the manifest file
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Entry declares no applicable channel
    #[error("dependency '{name}' applies to no channel")]
    NoChannels {
        /// Offending entry name
        name: String,
    },

    /// Two entries share the same name
    #[error("duplicate dependency entry '{name}'")]
    Duplicate {
        /// Duplicated entry name
        name: String,
    },
}

/// Lifecycle stage of a dependency.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// Needed only to produce the artifact; must not appear in the produced
    /// artifact's runtime dependency metadata.
    Build,
    /// Required at install/run time on the target host; recorded in the
    /// artifact's metadata so the native package manager enforces it.
    Runtime,
    /// Enables a non-essential feature; installed only when the caller opts
    /// into the full profile.
    OptionalExtra,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyKind::Build => "build",
            DependencyKind::Runtime => "runtime",
            DependencyKind::OptionalExtra => "optional-extra",
        };
        write!(f, "{name}")
    }
}

/// Channel applicability selector used in manifest entries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSelector {
    /// Applies to every channel
    All,
    /// Index-based install path only
    Index,
    /// RPM channel only
    Rpm,
    /// Debian channel only
    Deb,
}

impl ChannelSelector {
    /// Whether this selector covers the given channel.
    pub fn covers(self, channel: Channel) -> bool {
        match self {
            ChannelSelector::All => true,
            ChannelSelector::Index => channel == Channel::Index,
            ChannelSelector::Rpm => channel == Channel::Rpm,
            ChannelSelector::Deb => channel == Channel::Deb,
        }
    }
}

/// A single third-party dependency declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DependencyEntry {
    /// Package name as known to the channel's package manager
    pub name: String,

    /// Lifecycle stage (build, runtime, optional extra)
    pub kind: DependencyKind,

    /// Channels this entry applies to
    pub channels: Vec<ChannelSelector>,

    /// Minimum acceptable version, if any.
    ///
    /// A located dependency below this version fails the build with a
    /// version-constraint error; it is never a silent skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<Version>,

    /// Free-form authoring note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Documented channel limitation surfaced to the caller as an advisory,
    /// e.g. the index-distributed vision library lacking the contrib modules
    /// needed for text matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limitation: Option<String>,
}

impl DependencyEntry {
    /// Whether this entry applies to the given channel.
    pub fn applies_to(&self, channel: Channel) -> bool {
        self.channels.iter().any(|s| s.covers(channel))
    }

    /// Whether this entry is an optional extra.
    pub fn is_optional(&self) -> bool {
        self.kind == DependencyKind::OptionalExtra
    }

    /// Whether this entry is needed only at build time.
    pub fn is_build_only(&self) -> bool {
        self.kind == DependencyKind::Build
    }
}

/// Package metadata embedded in produced artifacts.
///
/// Maps to the `[package]` section of the manifest file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageSettings {
    /// Product name used for artifact file names and package metadata
    pub name: String,

    /// Version string in semantic versioning format
    pub version: String,

    /// One-line summary for package descriptions
    pub summary: String,

    /// License identifier
    #[serde(default = "default_license")]
    pub license: String,

    /// Homepage URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Maintainer in "Name <email>" form (Debian control field)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
}

fn default_license() -> String {
    "Unknown".to_string()
}

/// The dependency manifest: package settings plus an ordered entry list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Manifest {
    /// Package metadata for produced artifacts
    pub package: PackageSettings,

    /// Ordered dependency declarations
    #[serde(rename = "dependency", default)]
    pub entries: Vec<DependencyEntry>,
}

impl Manifest {
    /// Load and validate a manifest from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest =
            toml::from_str(&contents).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// The built-in manifest mirroring the upstream guibender dependency set.
    ///
    /// Used when no `dist-manifest.toml` is present next to the project.
    pub fn builtin() -> Self {
        let manifest = Manifest {
            package: PackageSettings {
                name: "guibender".to_string(),
                version: "1.1.0".to_string(),
                summary: "GUI automation and testing tool with image matching".to_string(),
                license: "LGPL-3.0-or-later".to_string(),
                url: Some("http://guibender.org".to_string()),
                maintainer: Some("guibender maintainers <packaging@guibender.org>".to_string()),
            },
            entries: vec![
                DependencyEntry {
                    name: "python3-setuptools".to_string(),
                    kind: DependencyKind::Build,
                    channels: vec![ChannelSelector::Rpm, ChannelSelector::Deb],
                    min_version: None,
                    note: None,
                    limitation: None,
                },
                DependencyEntry {
                    name: "pillow".to_string(),
                    kind: DependencyKind::Runtime,
                    channels: vec![ChannelSelector::All],
                    min_version: None,
                    note: Some("image loading for needles and screenshots".to_string()),
                    limitation: None,
                },
                DependencyEntry {
                    name: "opencv".to_string(),
                    kind: DependencyKind::Runtime,
                    channels: vec![ChannelSelector::All],
                    min_version: Some(Version::new(3, 0, 0)),
                    note: Some("feature matching requires the 3.x matcher API".to_string()),
                    limitation: None,
                },
                DependencyEntry {
                    name: "opencv-contrib".to_string(),
                    kind: DependencyKind::OptionalExtra,
                    channels: vec![ChannelSelector::Index],
                    min_version: None,
                    note: None,
                    limitation: Some(
                        "the generic index variant lacks the contrib modules needed \
                         for text matching"
                            .to_string(),
                    ),
                },
                // The qemu desktop-control backend has no entry: it talks
                // to a QEMU monitor provided by the host virtualization
                // setup, not to anything a channel could stage.
                DependencyEntry {
                    name: "autopy".to_string(),
                    kind: DependencyKind::OptionalExtra,
                    channels: vec![ChannelSelector::All],
                    min_version: None,
                    note: Some("desktop control backend".to_string()),
                    limitation: None,
                },
                DependencyEntry {
                    name: "vncdotool".to_string(),
                    kind: DependencyKind::OptionalExtra,
                    channels: vec![ChannelSelector::Index],
                    min_version: None,
                    note: Some("VNC screen backend".to_string()),
                    limitation: None,
                },
            ],
        };
        debug_assert!(manifest.validate().is_ok());
        manifest
    }

    /// Check the manifest invariants: no entry without a channel, no
    /// duplicate names.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.channels.is_empty() {
                return Err(ManifestError::NoChannels {
                    name: entry.name.clone(),
                });
            }
            if seen.contains(&entry.name.as_str()) {
                return Err(ManifestError::Duplicate {
                    name: entry.name.clone(),
                });
            }
            seen.push(entry.name.as_str());
        }
        Ok(())
    }

    /// Resolve the ordered dependency set for a channel.
    ///
    /// Optional extras are excluded unless `include_optional` is set; the
    /// result with `include_optional = true` is always a superset of the
    /// result without.
    pub fn resolve(&self, channel: Channel, include_optional: bool) -> Vec<&DependencyEntry> {
        self.entries
            .iter()
            .filter(|e| e.applies_to(channel))
            .filter(|e| include_optional || !e.is_optional())
            .collect()
    }

    /// Ordered package-name list for the index-install path.
    ///
    /// With `include_optional` the list is a strict superset of the core
    /// list (assuming any optional index entry exists). Build-only entries
    /// are never part of an install profile.
    pub fn requirements(&self, include_optional: bool) -> Vec<String> {
        self.resolve(Channel::Index, include_optional)
            .into_iter()
            .filter(|e| !e.is_build_only())
            .map(|e| match &e.min_version {
                Some(min) => format!("{}>={min}", e.name),
                None => e.name.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: DependencyKind, channels: Vec<ChannelSelector>) -> DependencyEntry {
        DependencyEntry {
            name: name.to_string(),
            kind,
            channels,
            min_version: None,
            note: None,
            limitation: None,
        }
    }

    #[test]
    fn resolve_excludes_optional_extras_by_default() {
        let manifest = Manifest::builtin();
        for channel in [Channel::Index, Channel::Rpm, Channel::Deb] {
            let core = manifest.resolve(channel, false);
            assert!(
                core.iter().all(|e| !e.is_optional()),
                "optional extra leaked into core resolve for {channel}"
            );
        }
    }

    #[test]
    fn resolve_with_optional_is_superset() {
        let manifest = Manifest::builtin();
        for channel in [Channel::Index, Channel::Rpm, Channel::Deb] {
            let core = manifest.resolve(channel, false);
            let full = manifest.resolve(channel, true);
            for e in &core {
                assert!(full.iter().any(|f| f.name == e.name));
            }
            assert!(full.len() >= core.len());
        }
    }

    #[test]
    fn requirements_full_is_strict_superset_of_core() {
        let manifest = Manifest::builtin();
        let core = manifest.requirements(false);
        let full = manifest.requirements(true);
        for name in &core {
            assert!(full.contains(name));
        }
        assert!(full.len() > core.len());
    }

    #[test]
    fn requirements_never_contain_build_entries() {
        let manifest = Manifest::builtin();
        for name in manifest.requirements(true) {
            assert!(!name.starts_with("python3-setuptools"));
        }
    }

    #[test]
    fn validate_rejects_entry_without_channels() {
        let mut manifest = Manifest::builtin();
        manifest
            .entries
            .push(entry("orphan", DependencyKind::Runtime, vec![]));
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::NoChannels { name }) if name == "orphan"
        ));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut manifest = Manifest::builtin();
        manifest.entries.push(entry(
            "pillow",
            DependencyKind::Runtime,
            vec![ChannelSelector::All],
        ));
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::Duplicate { name }) if name == "pillow"
        ));
    }

    #[test]
    fn parses_manifest_toml() {
        let manifest: Manifest = toml::from_str(
            r#"
            [package]
            name = "guibender"
            version = "1.1.0"
            summary = "GUI automation"

            [[dependency]]
            name = "opencv"
            kind = "runtime"
            channels = ["all"]
            min-version = "3.0.0"

            [[dependency]]
            name = "opencv-contrib"
            kind = "optional-extra"
            channels = ["index"]
            limitation = "no contrib modules for text matching"
            "#,
        )
        .expect("manifest should parse");

        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(
            manifest.entries[0].min_version,
            Some(Version::new(3, 0, 0))
        );
        assert!(manifest.entries[1].is_optional());
        assert!(manifest.entries[1].applies_to(Channel::Index));
        assert!(!manifest.entries[1].applies_to(Channel::Deb));
        manifest.validate().expect("manifest should validate");
    }

    #[test]
    fn builtin_manifest_validates() {
        Manifest::builtin().validate().expect("builtin is valid");
    }
}
