//! Command execution coordinating manifest resolution, channel builds, and
//! user feedback.

mod build;
mod install;

use crate::channel::Channel;
use crate::cli::{Args, Command, OutputManager};
use crate::error::Result;
use crate::manifest::Manifest;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {validation_error}"));
        return Ok(2);
    }

    let output = OutputManager::new(args.verbose, args.quiet);
    let manifest = load_manifest(&args)?;

    let result = match &args.command {
        Command::Rpm => build::execute_build(Channel::Rpm, &args, &manifest, &output).await,
        Command::Deb => build::execute_build(Channel::Deb, &args, &manifest, &output).await,
        Command::Install { profile } => install::execute_install(*profile, &manifest, &output),
        Command::Requirements { profile } => {
            install::execute_requirements(*profile, &manifest);
            Ok(0)
        }
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            output.error(&format!("Command '{}' failed: {e}", args.command.name()));
            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.println("\nRecovery suggestions:");
                for suggestion in suggestions {
                    output.indent(&suggestion);
                }
            }
            Ok(1)
        }
    }
}

/// Load the manifest: explicit path, then `dist-manifest.toml` next to the
/// project, then the built-in guibender set.
fn load_manifest(args: &Args) -> Result<Manifest> {
    if let Some(path) = &args.manifest {
        return Ok(Manifest::load(path)?);
    }
    let local = args.project_root.join("dist-manifest.toml");
    if local.is_file() {
        return Ok(Manifest::load(&local)?);
    }
    Ok(Manifest::builtin())
}
