//! Version information display
//!
//! Prints version metadata in human or JSON format.

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};

/// Renders version information.
#[must_use]
pub fn render(format: OutputFormat) -> String {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    match format {
        OutputFormat::Human => format!("{name} {version}"),
        OutputFormat::Json => json!({ "name": name, "version": version }).to_string(),
    }
}

/// Print version information.
pub fn run(args: &VersionArgs) {
    println!("{}", render(args.format));
}
