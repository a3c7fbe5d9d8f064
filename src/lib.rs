//! # guibender-dist
//!
//! Multi-channel distribution pipeline for the guibender GUI automation tool.
//!
//! guibender itself (image matching, input simulation, GUI backends) is an
//! external product; this crate only packages and ships it. Three delivery
//! channels are supported, each with its own dependency staging:
//!
//! - **index**: install through the host's package index, with a `core` and a
//!   `full` (all optional extras) profile
//! - **rpm**: native RPM package built through `rpmbuild`
//! - **deb**: native Debian package built through `dpkg-deb`
//!
//! A declarative dependency manifest is the single source of truth for what
//! must or may be installed per channel, which entries are build-time only,
//! and which version constraints apply (e.g. the computer-vision backend
//! needs 3.0.0+ for feature matching, and the generic index variant lacks
//! the contrib modules required for text matching).
//!
//! ## Usage
//!
//! ```bash
//! guibender-dist rpm                     # build an .rpm artifact
//! guibender-dist deb                     # build a .deb artifact
//! guibender-dist install --profile full  # index install with all extras
//! guibender-dist requirements            # print the core requirements list
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod channel;
pub mod cli;
pub mod error;
pub mod manifest;

// Re-export main types for public API
pub use channel::deb::DebBuilder;
pub use channel::index::{IndexInstaller, PipFetcher, Profile};
pub use channel::probe::{DependencyProbe, HostProbe, StaticProbe};
pub use channel::rpm::RpmBuilder;
pub use channel::{Advisory, BuildArtifact, BuildReport, Channel, InstallReport};
pub use error::{DistError, Result};
pub use manifest::{DependencyEntry, DependencyKind, Manifest, PackageSettings};
