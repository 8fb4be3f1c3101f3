use std::fmt::Display;
use std::str::FromStr;

use tracing::warn;

/// Read an environment variable, treating unset and non-unicode values alike.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse `raw` for the variable `key`, logging and discarding malformed values.
pub fn parse_var<T>(key: &str, raw: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("failed to parse {key}={raw:?}, keeping previous value: {e}");
            None
        }
    }
}

/// Overwrite `target` with the parsed value of `key`, if present and valid.
pub fn override_from<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key)
        && let Some(value) = parse_var(key, &raw)
    {
        *target = value;
    }
}

/// Strip everything after the first two path segments so tokens embedded in
/// webhook paths never reach the logs.
pub fn redact_path(path: &str) -> String {
    let mut segments = path.trim_start_matches('/').split('/');
    match segments.next() {
        Some(first) if !first.is_empty() => {
            if segments.next().is_some() {
                format!("/{first}/***")
            } else {
                format!("/{first}")
            }
        }
        _ => "/".to_string(),
    }
}
