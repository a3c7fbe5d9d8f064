//! Debian package (.deb) channel builder.
//!
//! Stages the project tree plus `DEBIAN/control` metadata and invokes
//! `dpkg-deb` to produce the installable artifact:
//!
//! - `DEBIAN/control`: package metadata; `Depends:` carries runtime entries
//!   only, so the native package manager enforces them at install time
//! - `DEBIAN/md5sums`: checksums over the staged data tree
//! - `usr/share/<name>/`: the project payload
//!
//! Build-only entries are verified on the host and used for the duration of
//! the build; they never reach the control file.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::channel::error::{Context, Error, ErrorExt, Result};
use crate::channel::probe::DependencyProbe;
use crate::channel::staging::{copy_tree, StagingEnv};
use crate::channel::{locate_tool, verify_entries, BuildArtifact, BuildReport, Channel};
use crate::manifest::{DependencyEntry, DependencyKind, Manifest, PackageSettings};

/// Builds `.deb` artifacts through the native `dpkg-deb` toolchain.
#[derive(Clone, Debug)]
pub struct DebBuilder {
    out_dir: PathBuf,
    tool: String,
}

impl DebBuilder {
    /// Create a builder emitting artifacts into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        DebBuilder {
            out_dir: out_dir.into(),
            tool: "dpkg-deb".to_string(),
        }
    }

    /// Override the toolchain binary (used by tests to force failures).
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Build a Debian package from the project source and manifest.
    ///
    /// Fails before staging anything when the toolchain is absent or a
    /// mandatory dependency is unsatisfied; a non-zero `dpkg-deb` exit
    /// propagates as a failure and is never retried.
    pub async fn build(
        &self,
        project_root: &Path,
        manifest: &Manifest,
        probe: &dyn DependencyProbe,
    ) -> Result<BuildReport> {
        let tool_path = locate_tool(Channel::Deb, &self.tool)?;

        let entries = manifest.resolve(Channel::Deb, false);
        let advisories = verify_entries(&entries, probe)?;
        let depends = deb_depends(&entries);

        let staging = StagingEnv::acquire()?;
        let base_name = format!(
            "{}_{}_all",
            manifest.package.name, manifest.package.version
        );
        let package_dir = staging.subdir(&base_name)?;

        log::info!("Bundling {base_name}.deb");

        // Stage payload and control metadata off the async runtime. The
        // output directory is excluded from the payload: under the default
        // layout it sits inside the project tree, and restaging it would
        // pack earlier artifacts into the new one.
        let package = manifest.package.clone();
        let stage_root =
            fs::canonicalize(project_root).fs_context("resolving project root", project_root)?;
        let excluded: Vec<PathBuf> = fs::canonicalize(&self.out_dir).ok().into_iter().collect();
        let stage_dir = package_dir.clone();
        let stage_depends = depends.clone();
        tokio::task::spawn_blocking(move || {
            stage_package(&stage_root, &stage_dir, &package, &stage_depends, &excluded)
        })
        .await
        .map_err(|e| Error::GenericError(format!("staging task failed: {e}")))?
        .context("failed to stage debian package tree")?;

        fs::create_dir_all(&self.out_dir).fs_context("creating output directory", &self.out_dir)?;
        let artifact_path = self.out_dir.join(format!("{base_name}.deb"));

        let output = tokio::process::Command::new(&tool_path)
            .arg("--build")
            .arg("--root-owner-group")
            .arg(&package_dir)
            .arg(&artifact_path)
            .output()
            .await
            .map_err(|error| Error::CommandFailed {
                command: self.tool.clone(),
                error,
            })?;
        if !output.status.success() {
            log::error!(
                "dpkg-deb failed: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
            return Err(Error::ToolchainFailed {
                command: format!("{} --build {}", self.tool, package_dir.display()),
                status: output.status,
            });
        }

        let artifact = BuildArtifact::from_file(Channel::Deb, artifact_path, depends).await?;
        artifact.write_metadata().await?;

        log::info!("Created deb: {}", artifact.path.display());
        Ok(BuildReport {
            artifact,
            advisories,
        })
    }
}

/// Debian `Depends:` strings for the runtime entries of a resolved set.
///
/// Build-only entries are excluded by construction.
fn deb_depends(entries: &[&DependencyEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.kind == DependencyKind::Runtime)
        .map(|e| match &e.min_version {
            Some(min) => format!("{} (>= {min})", e.name),
            None => e.name.clone(),
        })
        .collect()
}

/// Stage the package tree: payload under `usr/share/<name>`, control
/// metadata under `DEBIAN/`.
fn stage_package(
    project_root: &Path,
    package_dir: &Path,
    package: &PackageSettings,
    depends: &[String],
    exclude: &[PathBuf],
) -> Result<()> {
    let payload_dir = package_dir.join("usr/share").join(&package.name);
    fs::create_dir_all(&payload_dir).fs_context("creating payload directory", &payload_dir)?;
    copy_tree(project_root, &payload_dir, exclude).context("failed to copy project tree")?;

    let control_dir = package_dir.join("DEBIAN");
    fs::create_dir_all(&control_dir).fs_context("creating DEBIAN directory", &control_dir)?;

    let installed_size_kb = tree_size(package_dir)?.div_ceil(1024);
    let control = render_control(package, depends, installed_size_kb);
    let control_path = control_dir.join("control");
    fs::write(&control_path, control).fs_context("writing control file", &control_path)?;

    let md5sums = generate_md5sums(package_dir)?;
    let md5sums_path = control_dir.join("md5sums");
    fs::write(&md5sums_path, md5sums).fs_context("writing md5sums file", &md5sums_path)?;

    Ok(())
}

/// Render the `DEBIAN/control` file.
///
/// Deterministic for an unchanged manifest, which keeps repeated builds
/// byte-equivalent in their recorded metadata.
fn render_control(package: &PackageSettings, depends: &[String], installed_size_kb: u64) -> String {
    let mut control = String::new();
    let _ = writeln!(control, "Package: {}", package.name);
    let _ = writeln!(control, "Version: {}", package.version);
    let _ = writeln!(control, "Section: misc");
    let _ = writeln!(control, "Priority: optional");
    let _ = writeln!(control, "Architecture: all");
    let _ = writeln!(control, "Installed-Size: {installed_size_kb}");
    if !depends.is_empty() {
        let _ = writeln!(control, "Depends: {}", depends.join(", "));
    }
    let maintainer = package
        .maintainer
        .as_deref()
        .unwrap_or("unknown <unknown@localhost>");
    let _ = writeln!(control, "Maintainer: {maintainer}");
    if let Some(url) = &package.url {
        let _ = writeln!(control, "Homepage: {url}");
    }
    let _ = writeln!(control, "Description: {}", package.summary);
    control
}

/// Total byte size of regular files under `dir`, excluding `DEBIAN/`.
fn tree_size(dir: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.path().starts_with(dir.join("DEBIAN")) {
            continue;
        }
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// md5 checksums over the data tree, one `<hex>  <relative path>` line per
/// file, in deterministic order.
fn generate_md5sums(package_dir: &Path) -> Result<String> {
    let mut sums = String::new();
    for entry in WalkDir::new(package_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.path().starts_with(package_dir.join("DEBIAN")) {
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let contents = fs::read(entry.path()).fs_context("reading staged file", entry.path())?;
        let digest = md5::compute(&contents);
        let rel = entry.path().strip_prefix(package_dir)?;
        let _ = writeln!(sums, "{digest:x}  {}", rel.display());
    }
    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    #[test]
    fn depends_carry_runtime_entries_with_constraints() {
        let manifest = Manifest::builtin();
        let entries = manifest.resolve(Channel::Deb, false);
        let depends = deb_depends(&entries);
        assert!(depends.contains(&"pillow".to_string()));
        assert!(depends.contains(&"opencv (>= 3.0.0)".to_string()));
    }

    #[test]
    fn depends_exclude_build_and_optional_entries() {
        let manifest = Manifest::builtin();
        let entries = manifest.resolve(Channel::Deb, true);
        let depends = deb_depends(&entries);
        assert!(!depends.iter().any(|d| d.contains("python3-setuptools")));
        assert!(!depends.iter().any(|d| d.contains("autopy")));
    }

    #[test]
    fn control_file_records_runtime_metadata() {
        let manifest = Manifest::builtin();
        let entries = manifest.resolve(Channel::Deb, false);
        let control = render_control(&manifest.package, &deb_depends(&entries), 128);
        assert!(control.contains("Package: guibender\n"));
        assert!(control.contains("Depends: pillow, opencv (>= 3.0.0)\n"));
        assert!(control.contains("Installed-Size: 128\n"));
        assert!(!control.contains("python3-setuptools"));
    }

    #[test]
    fn control_rendering_is_idempotent() {
        let manifest = Manifest::builtin();
        let entries = manifest.resolve(Channel::Deb, false);
        let depends = deb_depends(&entries);
        let first = render_control(&manifest.package, &depends, 64);
        let second = render_control(&manifest.package, &depends, 64);
        assert_eq!(first, second);
    }

    #[test]
    fn md5sums_cover_payload_but_not_control_dir() {
        let staging = StagingEnv::acquire().expect("staging");
        let pkg = staging.subdir("guibender_1.1.0_all").expect("subdir");
        fs::create_dir_all(pkg.join("usr/share/guibender")).expect("mkdir");
        fs::create_dir_all(pkg.join("DEBIAN")).expect("mkdir");
        fs::write(pkg.join("usr/share/guibender/run.py"), b"print()").expect("write");
        fs::write(pkg.join("DEBIAN/control"), b"Package: guibender\n").expect("write");

        let sums = generate_md5sums(&pkg).expect("md5sums");
        assert!(sums.contains("usr/share/guibender/run.py"));
        assert!(!sums.contains("DEBIAN"));
        let line = sums.lines().next().expect("one line");
        let (digest, _) = line.split_once("  ").expect("two-space separator");
        assert_eq!(digest.len(), 32);
    }
}
