//! Installed-version detection for dependency entries.
//!
//! Each channel locates dependencies with its own native query tool. The
//! probe only answers "what version, if any, is present"; constraint
//! enforcement lives in the channel verification step.

use std::collections::HashMap;
use std::process::Command;

use semver::Version;

use crate::channel::error::Result;
use crate::channel::Channel;

/// Detects installed versions of named dependencies.
pub trait DependencyProbe {
    /// Detected version of `name`, or `None` when it cannot be located.
    fn detect(&self, name: &str) -> Result<Option<Version>>;
}

/// Probe backed by the host's native package query tools.
///
/// - rpm channel: `rpm -q --qf %{VERSION} <name>`
/// - deb channel: `dpkg-query -W -f ${Version} <name>`
/// - index channel: `python3 -m pip show <name>`
#[derive(Clone, Debug)]
pub struct HostProbe {
    channel: Channel,
}

impl HostProbe {
    /// Create a probe for the given channel.
    pub fn new(channel: Channel) -> Self {
        HostProbe { channel }
    }

    fn query(&self, name: &str) -> Option<String> {
        let output = match self.channel {
            Channel::Rpm => Command::new("rpm")
                .args(["-q", "--qf", "%{VERSION}", name])
                .output(),
            Channel::Deb => Command::new("dpkg-query")
                .args(["-W", "-f", "${Version}", name])
                .output(),
            Channel::Index => Command::new("python3")
                .args(["-m", "pip", "show", name])
                .output(),
        };
        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(_) => None,
            Err(e) => {
                log::debug!("{} query tool unusable for '{name}': {e}", self.channel);
                None
            }
        }
    }
}

impl DependencyProbe for HostProbe {
    fn detect(&self, name: &str) -> Result<Option<Version>> {
        let Some(raw) = self.query(name) else {
            return Ok(None);
        };
        let version_field = match self.channel {
            // pip show prints an RFC-822 style block
            Channel::Index => raw
                .lines()
                .find_map(|line| line.strip_prefix("Version:"))
                .unwrap_or("")
                .to_string(),
            Channel::Rpm | Channel::Deb => raw,
        };
        Ok(parse_loose_version(&version_field))
    }
}

/// Probe answering from a fixed table.
///
/// Backs the test suite and lets callers dry-run a build against a
/// hypothetical host state.
#[derive(Clone, Debug, Default)]
pub struct StaticProbe {
    versions: HashMap<String, Version>,
}

impl StaticProbe {
    /// Record `name` as installed at `version`.
    pub fn with(mut self, name: &str, version: Version) -> Self {
        self.versions.insert(name.to_string(), version);
        self
    }
}

impl DependencyProbe for StaticProbe {
    fn detect(&self, name: &str) -> Result<Option<Version>> {
        Ok(self.versions.get(name).cloned())
    }
}

/// Parse a distribution version string leniently.
///
/// Native packages carry release suffixes and epochs that `semver` rejects
/// ("2.4.13-5.el7", "3.2.0+dfsg-6"), and some upstreams publish two- or
/// four-component versions. Missing components are padded with zero and
/// anything past the third component is ignored.
pub(crate) fn parse_loose_version(raw: &str) -> Option<Version> {
    let token = raw.trim().split_whitespace().next()?;
    // Strip a Debian-style epoch prefix ("1:2.4.13-5")
    let token = token.split_once(':').map_or(token, |(_, rest)| rest);
    let numeric: String = token
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = numeric.split('.').filter(|p| !p.is_empty());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(Version::new(major, minor, patch))
}
