//! Configuration loader.
//!
//! Pipeline:
//! 1. Size check and UTF-8 BOM strip
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML parsing into [`AlarmConfig`]
//! 4. Validation
//! 5. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::AlarmConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Limits applied while loading.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("ACKLINE_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<AlarmConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Creates a loader with limits taken from the environment.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads, validates and freezes a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, an environment
    /// reference is unresolvable, the YAML does not match the schema, or
    /// validation reports any error.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.limits.max_config_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, path)
    }

    /// Runs the pipeline on already-read text. `path` is used for messages.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_str(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env = EnvSubstitution::new(path);
        let expanded = env.expand(raw)?;
        let mut warnings = env.warnings;

        if expanded.trim().is_empty() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Configuration file is empty".to_string(),
            });
        }

        let config: AlarmConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable expansion.
///
/// Runs on raw YAML text before parsing so expanded values keep YAML type
/// inference. Supports:
/// - `${VAR}`: value, or empty string with a warning if unset
/// - `${VAR:-default}`: default if unset
/// - `${VAR:?message}`: error if unset
/// - `$$`: literal `$`
struct EnvSubstitution {
    source: PathBuf,
    warnings: Vec<LoadWarning>,
}

/// What to do when a referenced variable is unset.
enum Fallback<'a> {
    Warn,
    Default(&'a str),
    Fail(&'a str),
}

impl EnvSubstitution {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            warnings: Vec::new(),
        }
    }

    fn expand(&mut self, raw: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(idx) = rest.find('$') {
            out.push_str(&rest[..idx]);
            let tail = &rest[idx + 1..];

            if let Some(after) = tail.strip_prefix('$') {
                out.push('$');
                rest = after;
            } else if let Some(body) = tail.strip_prefix('{') {
                let end = closing_brace(body).ok_or_else(|| ConfigError::ParseError {
                    path: self.source.clone(),
                    line: None,
                    message: format!(
                        "Unclosed environment variable reference: ${{{}",
                        body.lines().next().unwrap_or_default()
                    ),
                })?;
                self.resolve(&body[..end], &mut out)?;
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = tail;
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn resolve(&mut self, reference: &str, out: &mut String) -> Result<(), ConfigError> {
        let (name, fallback) = match reference.split_once(':') {
            Some((name, spec)) if spec.starts_with('-') => (name, Fallback::Default(&spec[1..])),
            Some((name, spec)) if spec.starts_with('?') => (name, Fallback::Fail(&spec[1..])),
            _ => (reference, Fallback::Warn),
        };

        if let Ok(value) = std::env::var(name) {
            out.push_str(&value);
            return Ok(());
        }

        match fallback {
            Fallback::Default(default) => out.push_str(default),
            Fallback::Fail(message) => {
                return Err(ConfigError::EnvVarNotSet {
                    var: name.to_string(),
                    location: message.to_string(),
                });
            }
            Fallback::Warn => self.warnings.push(LoadWarning {
                message: format!("Environment variable '{name}' is not set, using empty string"),
                location: Some(self.source.display().to_string()),
            }),
        }
        Ok(())
    }
}

/// Byte offset of the `}` closing a `${` whose body starts at `body[0]`.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ============================================================================
// Helpers
// ============================================================================

/// Reads an environment variable and parses it, falling back to `default`.
pub(crate) fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(input: &str) -> (Result<String, ConfigError>, Vec<LoadWarning>) {
        let mut sub = EnvSubstitution::new(Path::new("test.yaml"));
        let result = sub.expand(input);
        (result, sub.warnings)
    }

    #[test]
    fn test_env_substitution_simple() {
        // PATH is set on every platform the tests run on
        let (result, warnings) = expand("path: ${PATH}");
        let result = result.unwrap();
        assert!(!result.contains("${PATH}"));
        assert!(result.len() > "path: ".len());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_env_substitution_default() {
        let (result, _) = expand("value: ${ACKLINE_TEST_NONEXISTENT_VAR_XYZ123:-fallback}");
        assert_eq!(result.unwrap(), "value: fallback");
    }

    #[test]
    fn test_env_substitution_required_missing() {
        let (result, _) = expand("value: ${ACKLINE_TEST_REQUIRED_XYZ123:?token needed}");
        match result {
            Err(ConfigError::EnvVarNotSet { var, location }) => {
                assert_eq!(var, "ACKLINE_TEST_REQUIRED_XYZ123");
                assert_eq!(location, "token needed");
            }
            other => panic!("Expected EnvVarNotSet error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_substitution_escaped_dollar() {
        let (result, _) = expand("price: $$100 and $5");
        assert_eq!(result.unwrap(), "price: $100 and $5");
    }

    #[test]
    fn test_env_substitution_missing_warning() {
        let (result, warnings) = expand("value: ${ACKLINE_TEST_WARN_XYZ123}");
        assert_eq!(result.unwrap(), "value: ");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("ACKLINE_TEST_WARN_XYZ123"));
    }

    #[test]
    fn test_env_substitution_unclosed() {
        let (result, _) = expand("value: ${OOPS");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_str_rejects_empty() {
        let loader = ConfigLoader::with_defaults();
        let err = loader.load_str("\u{feff}  \n", Path::new("empty.yaml")).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_load_str_reports_validation_errors() {
        let loader = ConfigLoader::with_defaults();
        let err = loader
            .load_str("transport: { kind: log }\n", Path::new("alarm.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.yaml");
        std::fs::write(&path, "x".repeat(64)).unwrap();
        let loader = ConfigLoader::new(ConfigLimits {
            max_config_size: 16,
        });
        let err = loader.load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
