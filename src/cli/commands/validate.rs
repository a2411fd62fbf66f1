//! `validate` command
//!
//! Loads each configuration file through the full pipeline and reports
//! the outcome without starting anything.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{AcklineError, ConfigError, Severity, ValidationIssue};

/// Outcome of validating one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// File that was validated.
    pub file: PathBuf,
    /// Whether the file loaded without errors.
    pub valid: bool,
    /// Error messages.
    pub errors: Vec<String>,
    /// Warning messages.
    pub warnings: Vec<String>,
}

/// Loads one file and reports every issue found.
///
/// With `strict`, warnings are reported as errors and make the file
/// invalid. Returns the report and the first failure for exit-code mapping.
#[must_use]
pub fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> (FileReport, Option<ConfigError>) {
    let mut report = FileReport {
        file: path.to_path_buf(),
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    match loader.load(path) {
        Ok(result) if strict && !result.warnings.is_empty() => {
            let issues: Vec<ValidationIssue> = result
                .warnings
                .into_iter()
                .map(|w| ValidationIssue {
                    path: w.location.unwrap_or_default(),
                    message: w.message,
                    severity: Severity::Error,
                })
                .collect();
            report.valid = false;
            report.errors = issues.iter().map(ToString::to_string).collect();
            let error = ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: issues,
            };
            (report, Some(error))
        }
        Ok(result) => {
            report.warnings = result.warnings.iter().map(ToString::to_string).collect();
            (report, None)
        }
        Err(ConfigError::ValidationError { path: file, errors }) => {
            report.valid = false;
            report.errors = errors.iter().map(ToString::to_string).collect();
            (report, Some(ConfigError::ValidationError { path: file, errors }))
        }
        Err(e) => {
            report.valid = false;
            report.errors.push(e.to_string());
            (report, Some(e))
        }
    }
}

/// Validate configuration files without starting the service.
///
/// Every file is checked even after a failure.
///
/// # Errors
///
/// Returns the first configuration error encountered.
pub fn run(args: &ValidateArgs) -> Result<(), AcklineError> {
    let loader = ConfigLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let (report, error) = check(&loader, path, args.strict);
        if let Some(e) = error {
            first_error.get_or_insert(e);
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let verdict = if report.valid { "ok" } else { "invalid" };
                println!("{}: {verdict}", report.file.display());
                for line in report.errors.iter().chain(&report.warnings) {
                    println!("  {line}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}
