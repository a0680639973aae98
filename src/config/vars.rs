//! Environment variable interpolation for config files.
//!
//! Supports the following syntax:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::Regex;
use std::env;
use std::sync::LazyLock;

/// Regex pattern for environment variable interpolation.
/// Matches:
/// - `$$` (escape sequence)
/// - `${VAR:-default}` or `${VAR-default}` (with optional default)
/// - `${VAR}` (braced variable)
/// - `$VAR` (unbraced variable)
static ENV_VAR_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # Escape sequence $$
        |
        \$\{                           # Opening ${
            ([A-Za-z_][A-Za-z0-9_]*)   # Variable name (capture group 1)
            (?:                        # Optional default value group
                (:?-)                  # :- or just - (capture group 2)
                ([^}]*)                # Default value (capture group 3)
            )?
        \}                             # Closing }
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # Unbraced $VAR (capture group 4)
        ",
    )
    .ok()
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Any errors encountered during interpolation.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// How a `${VAR...}` reference falls back when the variable is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback<'a> {
    /// No default: a missing variable is an error.
    Required,
    /// `${VAR-default}`: used only when unset.
    Unset(&'a str),
    /// `${VAR:-default}`: used when unset or empty.
    UnsetOrEmpty(&'a str),
}

fn fallback<'a>(caps: &regex::Captures<'a>) -> Fallback<'a> {
    let default = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
    match caps.get(2).map(|m| m.as_str()) {
        Some(":-") => Fallback::UnsetOrEmpty(default),
        Some(_) => Fallback::Unset(default),
        None => Fallback::Required,
    }
}

fn substitute(caps: &regex::Captures, errors: &mut Vec<String>) -> String {
    let full_match = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
    if full_match == "$$" {
        return "$".to_string();
    }

    let name = caps
        .get(1)
        .or_else(|| caps.get(4))
        .map(|m| m.as_str())
        .unwrap_or_default();

    match (env::var(name), fallback(caps)) {
        // Values are spliced into YAML; a newline would inject keys.
        (Ok(value), _) if value.contains(['\n', '\r']) => {
            errors.push(format!(
                "environment variable '{name}' contains newlines, which is not allowed"
            ));
            full_match.to_string()
        }
        (Ok(value), Fallback::UnsetOrEmpty(default)) if value.is_empty() => default.to_string(),
        (Ok(value), _) => value,
        (Err(_), Fallback::Unset(default) | Fallback::UnsetOrEmpty(default)) => {
            default.to_string()
        }
        (Err(_), Fallback::Required) => {
            errors.push(format!("environment variable '{name}' is not set"));
            full_match.to_string()
        }
    }
}

/// Interpolate environment variables in the given text.
///
/// Every problem is collected so a config with several missing variables
/// reports all of them at once.
pub fn interpolate(input: &str) -> InterpolationResult {
    let Some(pattern) = ENV_VAR_PATTERN.as_ref() else {
        return InterpolationResult {
            text: input.to_string(),
            errors: vec!["environment variable pattern failed to compile".to_string()],
        };
    };

    let mut errors = Vec::new();
    let text = pattern
        .replace_all(input, |caps: &regex::Captures| substitute(caps, &mut errors))
        .into_owned();

    InterpolationResult { text, errors }
}
