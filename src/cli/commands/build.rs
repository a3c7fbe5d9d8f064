//! Native channel build commands (rpm, deb).

use crate::channel::deb::DebBuilder;
use crate::channel::probe::HostProbe;
use crate::channel::rpm::RpmBuilder;
use crate::channel::{BuildReport, Channel};
use crate::cli::{Args, OutputManager};
use crate::error::Result;
use crate::manifest::Manifest;

/// Run one native channel build and report the artifact.
pub async fn execute_build(
    channel: Channel,
    args: &Args,
    manifest: &Manifest,
    output: &OutputManager,
) -> Result<i32> {
    output.section(&format!("{channel} build"));
    output.info(&format!(
        "Packaging {} {}",
        manifest.package.name, manifest.package.version
    ));
    output.verbose(&format!(
        "project root: {}, out dir: {}",
        args.project_root.display(),
        args.out_dir.display()
    ));

    let probe = HostProbe::new(channel);
    let report = match channel {
        Channel::Rpm => {
            RpmBuilder::new(&args.out_dir)
                .build(&args.project_root, manifest, &probe)
                .await?
        }
        Channel::Deb => {
            DebBuilder::new(&args.out_dir)
                .build(&args.project_root, manifest, &probe)
                .await?
        }
        Channel::Index => unreachable!("index channel has no native build"),
    };

    report_build(&report, output);
    Ok(0)
}

/// Print the artifact summary, then the collected advisories.
fn report_build(report: &BuildReport, output: &OutputManager) {
    let artifact = &report.artifact;
    output.success(&format!(
        "Created {}: {} ({} bytes)",
        artifact.channel,
        artifact.path.display(),
        artifact.size
    ));
    output.indent(&format!("sha256: {}", artifact.checksum));
    if output.is_verbose() {
        for dep in &artifact.runtime_deps {
            output.verbose(&format!("runtime dependency: {dep}"));
        }
    }
    for advisory in &report.advisories {
        output.warn(&advisory.to_string());
    }
}
