//! guibender-dist - multi-channel distribution pipeline for guibender.
//!
//! A caller selects exactly one channel per invocation; the chosen builder
//! reads the dependency manifest, stages dependencies, invokes the native
//! packaging toolchain, and produces a single installable artifact or a
//! non-zero exit.

use std::process;

use guibender_dist::cli;
use guibender_dist::cli::OutputManager;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.println("\nRecovery suggestions:");
                for suggestion in suggestions {
                    output.indent(&suggestion);
                }
            }

            process::exit(1);
        }
    }
}
