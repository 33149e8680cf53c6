//! Environment variable interpolation for config files.
//!
//! Supported forms:
//! - `$VAR`, `${VAR}`: value of `VAR`, an error when unset
//! - `${VAR:-fallback}`: `fallback` when `VAR` is unset or empty
//! - `${VAR-fallback}`: `fallback` only when `VAR` is unset
//! - `$$`: a literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        | \$\{ (?P<braced>[A-Za-z_][A-Za-z0-9_]*) (?: (?P<op>:?-) (?P<fallback>[^}]*) )? \}
        | \$ (?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("placeholder pattern is valid")
});

/// Outcome of interpolating a document.
#[derive(Debug)]
pub struct Interpolated {
    /// Text with every resolvable placeholder substituted.
    pub text: String,
    /// One message per placeholder that could not be resolved.
    pub errors: Vec<String>,
}

impl Interpolated {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Substitute environment variables into `input`.
///
/// Unresolvable placeholders are left in place and reported, so a single
/// pass surfaces every missing variable.
pub fn interpolate(input: &str) -> Interpolated {
    let mut errors = Vec::new();

    let text = PLACEHOLDER
        .replace_all(input, |caps: &Captures| resolve(caps, &mut errors))
        .into_owned();

    Interpolated { text, errors }
}

fn resolve(caps: &Captures, errors: &mut Vec<String>) -> String {
    let whole = &caps[0];
    if whole == "$$" {
        return "$".to_string();
    }

    let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
        return whole.to_string();
    };
    let name = name.as_str();
    let fallback = caps.name("fallback").map(|m| m.as_str());
    let empty_means_unset = caps.name("op").is_some_and(|m| m.as_str() == ":-");

    match env::var(name) {
        Ok(value) if value.contains(['\n', '\r']) => {
            errors.push(format!(
                "environment variable '{name}' contains newlines, which is not allowed"
            ));
            whole.to_string()
        }
        Ok(value) if value.is_empty() && empty_means_unset => {
            fallback.unwrap_or_default().to_string()
        }
        Ok(value) => value,
        Err(_) => match fallback {
            Some(fallback) => fallback.to_string(),
            None => {
                errors.push(format!("environment variable '{name}' is not set"));
                whole.to_string()
            }
        },
    }
}
