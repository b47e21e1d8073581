//! Environment variable helpers for the `from_env` constructors

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Parse `name` as `T`, or return `default` when unset or blank
pub(crate) fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("invalid {name}={raw:?}: {e}"))),
        _ => Ok(default),
    }
}

/// Parse a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`)
pub(crate) fn env_flag(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(format!("invalid {name}={raw:?}: expected a boolean"))),
        },
        _ => Ok(default),
    }
}

/// Path from `name`, `None` when unset or blank
pub(crate) fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Optional path: unset keeps `default`, set-but-empty disables
pub(crate) fn env_optional_path(name: &str, default: Option<PathBuf>) -> Option<PathBuf> {
    match std::env::var_os(name) {
        Some(v) if v.is_empty() => None,
        Some(v) => Some(PathBuf::from(v)),
        None => default,
    }
}
