//! Index channel commands: install and requirements export.

use crate::channel::index::{IndexInstaller, Profile};
use crate::cli::OutputManager;
use crate::error::Result;
use crate::manifest::Manifest;

/// Install the manifest through the host's package index.
pub fn execute_install(
    profile: Profile,
    manifest: &Manifest,
    output: &OutputManager,
) -> Result<i32> {
    output.section(&format!("index install ({profile})"));
    output.info(&format!(
        "Installing {} {}",
        manifest.package.name, manifest.package.version
    ));

    let installer = IndexInstaller::host();
    let report = installer.install(manifest, profile)?;

    output.success(&format!(
        "Installed {} package(s): {}",
        report.installed.len(),
        report.installed.join(", ")
    ));
    for advisory in &report.advisories {
        output.warn(&advisory.to_string());
    }
    Ok(0)
}

/// Print the ordered requirements list for the index channel.
///
/// Machine-readable output, one requirement per line; printed even under
/// `--quiet` so it can be piped into the host's fetch step.
pub fn execute_requirements(profile: Profile, manifest: &Manifest) {
    for requirement in manifest.requirements(profile.include_optional()) {
        println!("{requirement}");
    }
}
