//! Display formatting for CLI output

use console::style;
use serde::Serialize;
use std::path::Path;

use solas_pull::{PullMethod, PullResult};

/// One pulled artifact, as printed by `--json`
#[derive(Debug, Serialize)]
pub struct PulledArtifact<'a> {
    pub name: &'a str,
    pub method: PullMethod,
    pub directory: &'a Path,
    pub version: &'a str,
}

impl<'a> PulledArtifact<'a> {
    pub fn new(name: &'a str, method: PullMethod, result: &'a PullResult) -> Self {
        Self {
            name,
            method,
            directory: &result.directory,
            version: &result.version,
        }
    }
}

/// Print a single pull outcome
pub fn print_pulled(pulled: &PulledArtifact<'_>) {
    println!(
        "{} {} {} -> {}",
        style("✓").green().bold(),
        style(pulled.name).bold(),
        style(pulled.version).cyan(),
        pulled.directory.display()
    );
}

/// Print pull outcomes as a JSON array
pub fn print_json(pulled: &[PulledArtifact<'_>]) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(pulled)?);
    Ok(())
}

/// Print the outcome of a vendor run
pub fn print_vendored(dependency: &str, version: &str, vendor_dir: &Path) {
    println!(
        "{} {} {} -> {}",
        style("✓").green().bold(),
        style(dependency).bold(),
        style(version).cyan(),
        vendor_dir.display()
    );
}
