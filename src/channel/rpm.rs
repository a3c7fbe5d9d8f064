//! RPM package (.rpm) channel builder.
//!
//! Renders a spec file from a template, stages the project source as a
//! tarball, and invokes `rpmbuild` with a private topdir inside the staging
//! environment:
//!
//! - `Requires:` carries runtime entries only, enforced at install time by
//!   the native package manager
//! - `BuildRequires:` carries build-only entries, consumed by `rpmbuild`
//!   transiently and absent from the artifact's runtime metadata
//!
//! The topdir lives in a [`StagingEnv`], so intermediate build state is
//! discarded on every exit path and two invocations cannot interfere.

use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use handlebars::Handlebars;
use serde_json::json;
use walkdir::WalkDir;

use crate::bail;
use crate::channel::error::{Context, Error, ErrorExt, Result};
use crate::channel::probe::DependencyProbe;
use crate::channel::staging::StagingEnv;
use crate::channel::{locate_tool, verify_entries, BuildArtifact, BuildReport, Channel};
use crate::manifest::{DependencyEntry, DependencyKind, Manifest, PackageSettings};

const SPEC_TEMPLATE: &str = "\
Name: {{name}}
Version: {{version}}
Release: 1%{?dist}
Summary: {{summary}}
License: {{license}}
{{#if url}}URL: {{url}}
{{/if}}Source0: {{name}}-{{version}}.tar.gz
BuildArch: noarch
{{#each build_requires}}BuildRequires: {{this}}
{{/each}}{{#each requires}}Requires: {{this}}
{{/each}}
%description
{{summary}}

%prep
%autosetup -n {{name}}-{{version}}

%build

%install
mkdir -p %{buildroot}%{_datadir}/{{name}}
cp -a . %{buildroot}%{_datadir}/{{name}}

%files
%{_datadir}/{{name}}

%changelog
";

/// Builds `.rpm` artifacts through the native `rpmbuild` toolchain.
#[derive(Clone, Debug)]
pub struct RpmBuilder {
    out_dir: PathBuf,
    tool: String,
}

impl RpmBuilder {
    /// Create a builder emitting artifacts into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        RpmBuilder {
            out_dir: out_dir.into(),
            tool: "rpmbuild".to_string(),
        }
    }

    /// Override the toolchain binary (used by tests to force failures).
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Build an RPM package from the project source and manifest.
    ///
    /// Fails before staging anything when the toolchain is absent or a
    /// mandatory dependency is unsatisfied; a non-zero `rpmbuild` exit
    /// propagates as a failure and is never retried.
    pub async fn build(
        &self,
        project_root: &Path,
        manifest: &Manifest,
        probe: &dyn DependencyProbe,
    ) -> Result<BuildReport> {
        let tool_path = locate_tool(Channel::Rpm, &self.tool)?;

        let entries = manifest.resolve(Channel::Rpm, false);
        let advisories = verify_entries(&entries, probe)?;
        let requires = rpm_requirements(&entries, DependencyKind::Runtime);
        let build_requires = rpm_requirements(&entries, DependencyKind::Build);

        let staging = StagingEnv::acquire()?;
        let sources_dir = staging.subdir("SOURCES")?;
        let specs_dir = staging.subdir("SPECS")?;

        log::info!(
            "Building RPM package for {} {}",
            manifest.package.name,
            manifest.package.version
        );

        // Stage source tarball off the async runtime
        let tarball = sources_dir.join(format!(
            "{}-{}.tar.gz",
            manifest.package.name, manifest.package.version
        ));
        let prefix = format!("{}-{}", manifest.package.name, manifest.package.version);
        let tarball_path = tarball.clone();
        // The output directory is excluded from the source tarball: under
        // the default layout it sits inside the project tree, and restaging
        // it would pack earlier artifacts into the new one.
        let source_root =
            fs::canonicalize(project_root).fs_context("resolving project root", project_root)?;
        let excluded: Vec<PathBuf> = fs::canonicalize(&self.out_dir).ok().into_iter().collect();
        tokio::task::spawn_blocking(move || {
            create_source_tarball(&source_root, &tarball_path, &prefix, &excluded)
        })
        .await
        .map_err(|e| Error::GenericError(format!("staging task failed: {e}")))?
        .context("failed to create source tarball")?;

        let spec = render_spec(&manifest.package, &build_requires, &requires)?;
        let spec_path = specs_dir.join(format!("{}.spec", manifest.package.name));
        fs::write(&spec_path, spec).fs_context("writing spec file", &spec_path)?;

        let output = tokio::process::Command::new(&tool_path)
            .arg("-bb")
            .arg("--define")
            .arg(format!("_topdir {}", staging.path().display()))
            .arg(&spec_path)
            .output()
            .await
            .map_err(|error| Error::CommandFailed {
                command: self.tool.clone(),
                error,
            })?;
        if !output.status.success() {
            log::error!(
                "rpmbuild failed: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
            return Err(Error::ToolchainFailed {
                command: format!("{} -bb {}", self.tool, spec_path.display()),
                status: output.status,
            });
        }

        let built = find_built_rpm(&staging.path().join("RPMS"))?;
        fs::create_dir_all(&self.out_dir).fs_context("creating output directory", &self.out_dir)?;
        let artifact_path = self
            .out_dir
            .join(built.file_name().context("rpm artifact has no file name")?);
        tokio::fs::copy(&built, &artifact_path)
            .await
            .fs_context("copying rpm artifact", &artifact_path)?;

        let artifact = BuildArtifact::from_file(Channel::Rpm, artifact_path, requires).await?;
        artifact.write_metadata().await?;

        log::info!("Created RPM: {}", artifact.path.display());
        Ok(BuildReport {
            artifact,
            advisories,
        })
    }
}

/// RPM dependency strings (`name` or `name >= min`) for entries of `kind`.
fn rpm_requirements(entries: &[&DependencyEntry], kind: DependencyKind) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| match &e.min_version {
            Some(min) => format!("{} >= {min}", e.name),
            None => e.name.clone(),
        })
        .collect()
}

/// Render the spec file from the embedded template.
///
/// Deterministic for an unchanged manifest, so repeated builds record
/// identical runtime-dependency metadata.
fn render_spec(
    package: &PackageSettings,
    build_requires: &[String],
    requires: &[String],
) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_template_string("spec", SPEC_TEMPLATE)?;
    let rendered = handlebars.render(
        "spec",
        &json!({
            "name": package.name,
            "version": package.version,
            "summary": package.summary,
            "license": package.license,
            "url": package.url,
            "build_requires": build_requires,
            "requires": requires,
        }),
    )?;
    Ok(rendered)
}

/// Create `SOURCES/<name>-<version>.tar.gz` with the project tree under a
/// `<name>-<version>/` prefix, as `%autosetup` expects.
///
/// Paths in `exclude` are skipped along with everything under them, so
/// earlier artifacts never end up inside the source archive.
fn create_source_tarball(
    project_root: &Path,
    tarball: &Path,
    prefix: &str,
    exclude: &[PathBuf],
) -> Result<()> {
    let file = File::create(tarball).fs_context("creating source tarball", tarball)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    let walker = WalkDir::new(project_root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !exclude.iter().any(|skipped| entry.path() == skipped));
    for entry in walker {
        let entry = entry?;
        let rel = entry.path().strip_prefix(project_root)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let name = Path::new(prefix).join(rel);
        if entry.file_type().is_dir() {
            archive
                .append_dir(&name, entry.path())
                .fs_context("archiving project tree", entry.path())?;
        } else {
            archive
                .append_path_with_name(entry.path(), &name)
                .fs_context("archiving project tree", entry.path())?;
        }
    }
    let encoder = archive
        .into_inner()
        .fs_context("finishing source tarball", tarball)?;
    encoder.finish().fs_context("finishing source tarball", tarball)?;
    Ok(())
}

/// Locate the single `.rpm` produced under the staging topdir.
fn find_built_rpm(rpms_dir: &Path) -> Result<PathBuf> {
    for entry in WalkDir::new(rpms_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "rpm")
        {
            return Ok(entry.path().to_path_buf());
        }
    }
    bail!("rpmbuild reported success but produced no .rpm under {}", rpms_dir.display())
}
