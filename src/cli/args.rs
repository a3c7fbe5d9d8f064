//! Command line argument parsing and validation.
//!
//! One subcommand per distribution channel, plus a requirements export for
//! the index path. A caller selects exactly one channel per invocation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::channel::index::Profile;

/// Multi-channel distribution pipeline for guibender
#[derive(Parser, Debug)]
#[command(
    name = "guibender-dist",
    version,
    about = "Build or install guibender through its distribution channels",
    long_about = "Multi-channel distribution pipeline for the guibender GUI automation tool.

Usage:
  guibender-dist rpm
  guibender-dist deb
  guibender-dist install --profile full
  guibender-dist requirements --profile core"
)]
pub struct Args {
    /// Channel to drive
    #[command(subcommand)]
    pub command: Command,

    /// Dependency manifest file (default: <project-root>/dist-manifest.toml,
    /// falling back to the built-in guibender manifest)
    #[arg(long, global = true, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Project source tree to package
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub project_root: PathBuf,

    /// Directory receiving built artifacts
    #[arg(long, global = true, value_name = "DIR", default_value = "dist")]
    pub out_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// One command per channel
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a native RPM package through rpmbuild
    Rpm,

    /// Build a native Debian package through dpkg-deb
    Deb,

    /// Install through the host's package index
    Install {
        /// Install profile: core (mandatory only) or full (all extras)
        #[arg(long, value_enum, default_value_t = Profile::Core)]
        profile: Profile,
    },

    /// Print the ordered requirements list for the index channel
    Requirements {
        /// Profile to list: full is a strict superset of core
        #[arg(long, value_enum, default_value_t = Profile::Core)]
        profile: Profile,
    },
}

impl Command {
    /// Command name for error reporting
    pub fn name(&self) -> &'static str {
        match self {
            Command::Rpm => "rpm",
            Command::Deb => "deb",
            Command::Install { .. } => "install",
            Command::Requirements { .. } => "requirements",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.command, Command::Rpm | Command::Deb)
            && !self.project_root.is_dir()
        {
            return Err(format!(
                "project root '{}' is not a directory",
                self.project_root.display()
            ));
        }
        if let Some(manifest) = &self.manifest
            && !manifest.is_file()
        {
            return Err(format!(
                "manifest '{}' does not exist",
                manifest.display()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_subcommands() {
        let args = Args::try_parse_from(["guibender-dist", "rpm"]).expect("parse");
        assert_eq!(args.command.name(), "rpm");

        let args =
            Args::try_parse_from(["guibender-dist", "install", "--profile", "full"])
                .expect("parse");
        match args.command {
            Command::Install { profile } => assert_eq!(profile, Profile::Full),
            other => panic!("unexpected command: {}", other.name()),
        }
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["guibender-dist", "deb", "-v", "-q"]).is_err());
    }

    #[test]
    fn validate_rejects_missing_project_root() {
        let args = Args::try_parse_from([
            "guibender-dist",
            "deb",
            "--project-root",
            "/definitely/not/here",
        ])
        .expect("parse");
        assert!(args.validate().is_err());
    }
}
