//! Converters: total `&str → Value` functions.
//!
//! Converters run while the logging system is still being configured, so
//! they must never log. Failures surface as configuration errors carrying
//! the offending input.

use foundation_core::{FoundationError, Level, Result, Value};
use std::fs;

/// Resolves `file://` indirection: a value of `file://path` is replaced by
/// the trimmed contents of that file. Anything else passes through.
pub fn resolve_indirection(raw: &str) -> Result<String> {
    match raw.strip_prefix("file://") {
        None => Ok(raw.to_owned()),
        Some(path) => {
            let contents = fs::read_to_string(path).map_err(|err| {
                FoundationError::configuration(format!(
                    "could not read indirect value from {:?}",
                    path
                ))
                .with_context("config.indirection", path)
                .with_cause(err)
            })?;
            Ok(contents.trim().to_owned())
        }
    }
}

/// Parses a log level name, case-insensitively.
pub fn parse_level(raw: &str) -> Result<Value> {
    let level: Level = raw.parse().map_err(|err: foundation_core::ParseLevelError| {
        FoundationError::configuration(err.to_string()).with_context("config.input", raw)
    })?;
    Ok(Value::Str(level.as_str().to_owned()))
}

/// Parses a `"module:LEVEL,other.module:LEVEL"` mapping.
pub fn parse_module_levels(raw: &str) -> Result<Value> {
    let mut entries = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (module, level) = item.split_once(':').ok_or_else(|| {
            FoundationError::configuration(format!(
                "expected module:LEVEL, got {:?}",
                item
            ))
            .with_context("config.input", raw)
        })?;
        let level = parse_level(level.trim())?;
        entries.push((module.trim().to_owned(), level));
    }
    Ok(Value::Map(entries))
}

/// Returns a converter that parses a float and requires it to fall in
/// `[min, max]`.
pub fn parse_float_in_range(min: f64, max: f64) -> impl Fn(&str) -> Result<Value> + Send + Sync {
    move |raw: &str| {
        let parsed: f64 = raw.trim().parse().map_err(|_| {
            FoundationError::configuration(format!("{:?} is not a number", raw))
                .with_context("config.input", raw)
        })?;
        if parsed < min || parsed > max {
            return Err(FoundationError::configuration(format!(
                "{} is outside [{}, {}]",
                parsed, min, max
            ))
            .with_context("config.input", raw));
        }
        Ok(Value::Float(parsed))
    }
}

/// Parses a comma-separated set of HTTP status codes.
pub fn parse_status_codes(raw: &str) -> Result<Value> {
    let mut codes = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let code: u16 = item.parse().map_err(|_| {
            FoundationError::configuration(format!("{:?} is not a status code", item))
                .with_context("config.input", raw)
        })?;
        codes.push(Value::Uint(u64::from(code)));
    }
    Ok(Value::List(codes))
}

/// Parses a `"key=value,key=value"` header list, preserving order.
pub fn parse_header_list(raw: &str) -> Result<Value> {
    let mut headers = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = item.split_once('=').ok_or_else(|| {
            FoundationError::configuration(format!("expected key=value, got {:?}", item))
                .with_context("config.input", raw)
        })?;
        headers.push((key.trim().to_owned(), Value::Str(value.trim().to_owned())));
    }
    Ok(Value::Map(headers))
}

/// Parses a boolean: `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn parse_bool(raw: &str) -> Result<Value> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
        "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
        _ => Err(
            FoundationError::configuration(format!("{:?} is not a boolean", raw))
                .with_context("config.input", raw),
        ),
    }
}

/// Parses a duration given as (possibly fractional) seconds.
pub fn parse_duration_secs(raw: &str) -> Result<Value> {
    let secs: f64 = raw.trim().parse().map_err(|_| {
        FoundationError::configuration(format!("{:?} is not a duration in seconds", raw))
            .with_context("config.input", raw)
    })?;
    if secs < 0.0 {
        return Err(
            FoundationError::configuration("durations cannot be negative")
                .with_context("config.input", raw),
        );
    }
    Ok(Value::Float(secs))
}
