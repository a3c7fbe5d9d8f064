//! End-to-end tests for the packaging channels and the CLI surface.
//!
//! Native toolchains are not assumed on the test host: deb builds run
//! against a stand-in `dpkg-deb` script, and failure paths are exercised by
//! pointing builders at tools that do not exist.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command as CliCommand;
use guibender_dist::channel::{sidecar_path, Error};
use guibender_dist::{DebBuilder, Manifest, RpmBuilder, StaticProbe};
use predicates::prelude::*;
use semver::Version;
use tempfile::TempDir;

/// Probe describing a host that satisfies the builtin manifest.
fn satisfied_probe() -> StaticProbe {
    StaticProbe::default()
        .with("pillow", Version::new(9, 5, 0))
        .with("opencv", Version::new(4, 5, 5))
        .with("python3-setuptools", Version::new(59, 6, 0))
}

/// A small stand-in project tree to package.
fn sample_project(dir: &Path) -> PathBuf {
    let root = dir.join("project");
    fs::create_dir_all(root.join("guibender")).expect("mkdir");
    fs::write(root.join("guibender/run.py"), b"print('gui')\n").expect("write");
    fs::write(root.join("README"), b"guibender\n").expect("write");
    root
}

/// Stand-in for `dpkg-deb` that writes its last argument (the artifact).
#[cfg(unix)]
fn fake_dpkg_deb(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.join("fake-dpkg-deb");
    fs::write(
        &script,
        "#!/bin/sh\nfor arg in \"$@\"; do out=\"$arg\"; done\nprintf 'fake deb payload' > \"$out\"\n",
    )
    .expect("write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
    script
}

/// Stand-in for `dpkg-deb` that lists the staged tree into the artifact.
#[cfg(unix)]
fn recording_dpkg_deb(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.join("recording-dpkg-deb");
    fs::write(&script, "#!/bin/sh\nfind \"$3\" -type f | sort > \"$4\"\n").expect("write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
    script
}

#[tokio::test]
async fn version_constraint_violation_aborts_build_without_artifact() {
    let tmp = TempDir::new().expect("tempdir");
    let project = sample_project(tmp.path());
    let out_dir = tmp.path().join("dist");
    let probe = satisfied_probe().with("opencv", Version::new(2, 4, 13));

    // "sh" stands in for a present toolchain; verification fails first
    let err = DebBuilder::new(&out_dir)
        .with_tool("sh")
        .build(&project, &Manifest::builtin(), &probe)
        .await
        .unwrap_err();

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
    assert!(!out_dir.exists(), "no artifact may be produced on failure");
}

#[tokio::test]
async fn missing_mandatory_dependency_fails_build() {
    let tmp = TempDir::new().expect("tempdir");
    let project = sample_project(tmp.path());
    // a host missing pillow, which the deb channel needs at runtime
    let probe_without_pillow = StaticProbe::default()
        .with("opencv", Version::new(4, 5, 5))
        .with("python3-setuptools", Version::new(59, 6, 0));

    let err = DebBuilder::new(tmp.path().join("dist"))
        .with_tool("sh")
        .build(&project, &Manifest::builtin(), &probe_without_pillow)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DependencyUnsatisfied { entry, .. } if entry == "pillow"
    ));
}

#[tokio::test]
async fn missing_toolchain_fails_before_staging() {
    let tmp = TempDir::new().expect("tempdir");
    let project = sample_project(tmp.path());

    let err = RpmBuilder::new(tmp.path().join("dist"))
        .with_tool("definitely-not-a-packaging-tool")
        .build(&project, &Manifest::builtin(), &satisfied_probe())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolchainUnavailable { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn rpm_toolchain_failure_leaves_deb_channel_unaffected() {
    let tmp = TempDir::new().expect("tempdir");
    let project = sample_project(tmp.path());
    let manifest = Manifest::builtin();

    let rpm_err = RpmBuilder::new(tmp.path().join("dist"))
        .with_tool("definitely-not-a-packaging-tool")
        .build(&project, &manifest, &satisfied_probe())
        .await
        .unwrap_err();
    assert!(matches!(rpm_err, Error::ToolchainUnavailable { .. }));

    // The deb channel shares no state with the failed rpm build
    let dpkg = fake_dpkg_deb(tmp.path());
    let report = DebBuilder::new(tmp.path().join("dist"))
        .with_tool(dpkg.to_string_lossy().into_owned())
        .build(&project, &manifest, &satisfied_probe())
        .await
        .expect("deb build succeeds in a valid environment");
    assert!(report.artifact.path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn deb_build_records_identical_runtime_metadata_across_invocations() {
    let tmp = TempDir::new().expect("tempdir");
    let project = sample_project(tmp.path());
    let manifest = Manifest::builtin();
    let dpkg = fake_dpkg_deb(tmp.path());
    let out_dir = tmp.path().join("dist");

    let builder = DebBuilder::new(&out_dir).with_tool(dpkg.to_string_lossy().into_owned());
    let first = builder
        .build(&project, &manifest, &satisfied_probe())
        .await
        .expect("first build");
    let first_metadata =
        fs::read_to_string(sidecar_path(&first.artifact.path)).expect("first sidecar");

    let second = builder
        .build(&project, &manifest, &satisfied_probe())
        .await
        .expect("second build");
    let second_metadata =
        fs::read_to_string(sidecar_path(&second.artifact.path)).expect("second sidecar");

    let first_json: serde_json::Value = serde_json::from_str(&first_metadata).expect("json");
    let second_json: serde_json::Value = serde_json::from_str(&second_metadata).expect("json");
    assert_eq!(
        first_json["runtime_deps"], second_json["runtime_deps"],
        "recorded runtime-dependency metadata must be identical"
    );
    assert_eq!(first.artifact.runtime_deps, second.artifact.runtime_deps);
    assert!(!first.artifact.checksum.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn repeated_builds_do_not_restage_prior_artifacts() {
    let tmp = TempDir::new().expect("tempdir");
    let project = sample_project(tmp.path());
    let manifest = Manifest::builtin();
    let dpkg = recording_dpkg_deb(tmp.path());
    // default layout: the artifact directory sits inside the project tree
    let out_dir = project.join("dist");

    let builder = DebBuilder::new(&out_dir).with_tool(dpkg.to_string_lossy().into_owned());
    builder
        .build(&project, &manifest, &satisfied_probe())
        .await
        .expect("first build");
    let second = builder
        .build(&project, &manifest, &satisfied_probe())
        .await
        .expect("second build");

    let staged = fs::read_to_string(&second.artifact.path).expect("staged listing");
    assert!(staged.contains("usr/share/guibender/guibender/run.py"));
    assert!(
        !staged.contains("usr/share/guibender/dist/"),
        "prior artifacts must not be staged into the payload"
    );
}

#[test]
fn cli_requirements_core_lists_mandatory_entries_only() {
    CliCommand::cargo_bin("guibender-dist")
        .expect("binary")
        .arg("requirements")
        .assert()
        .success()
        .stdout(predicate::str::contains("pillow"))
        .stdout(predicate::str::contains("opencv>=3.0.0"))
        .stdout(predicate::str::contains("opencv-contrib").not());
}

#[test]
fn cli_requirements_full_is_superset_with_extras() {
    CliCommand::cargo_bin("guibender-dist")
        .expect("binary")
        .args(["requirements", "--profile", "full"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pillow"))
        .stdout(predicate::str::contains("opencv-contrib"))
        .stdout(predicate::str::contains("vncdotool"));
}

#[test]
fn cli_rejects_invalid_project_root() {
    CliCommand::cargo_bin("guibender-dist")
        .expect("binary")
        .args(["deb", "--project-root", "/definitely/not/a/real/path"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid arguments"));
}

#[test]
fn cli_help_names_every_channel() {
    CliCommand::cargo_bin("guibender-dist")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rpm"))
        .stdout(predicate::str::contains("deb"))
        .stdout(predicate::str::contains("install"));
}
