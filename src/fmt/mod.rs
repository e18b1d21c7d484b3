//! Record rendering.
//!
//! Three formats are supported, selected by configuration:
//!
//! - `key_value` — space-separated `k=v` pairs, values with whitespace
//!   quoted; the fallback-safe machine format;
//! - `json` — one object per line with `timestamp`, `level`, `logger`,
//!   `event` first, then the structured attributes;
//! - `human` — a colored, optionally emoji-prefixed line for terminals.
//!
//! Color and emoji are resolved once at pipeline construction: the
//! configured [`ColorChoice`] against whether the target stream is a TTY.
//!
//! [`ColorChoice`]: crate::config::ColorChoice

use ansi_term::{Colour, Style};
use chrono::SecondsFormat;
use foundation_core::{FoundationError, Level, LogRecord, Value};
use std::fmt::Write as _;
use std::str::FromStr;

/// The configured output format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Space-separated `k=v` pairs.
    KeyValue,
    /// One JSON object per line.
    Json,
    /// Colored, human-friendly lines.
    Human,
}

impl LogFormat {
    /// The format's configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::KeyValue => "key_value",
            LogFormat::Json => "json",
            LogFormat::Human => "human",
        }
    }
}

impl FromStr for LogFormat {
    type Err = FoundationError;
    fn from_str(s: &str) -> Result<Self, FoundationError> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("key_value") => Ok(LogFormat::KeyValue),
            s if s.eq_ignore_ascii_case("json") => Ok(LogFormat::Json),
            s if s.eq_ignore_ascii_case("human") => Ok(LogFormat::Human),
            other => Err(FoundationError::configuration(format!(
                "unknown formatter {:?}, expected json, key_value, or human",
                other
            ))),
        }
    }
}

/// Renders records to bytes in one of the [`LogFormat`]s.
#[derive(Debug, Clone)]
pub struct Renderer {
    format: LogFormat,
    ansi: bool,
}

impl Renderer {
    /// A renderer for `format`; `ansi` enables color in `human` output.
    pub fn new(format: LogFormat, ansi: bool) -> Self {
        Renderer { format, ansi }
    }

    /// The renderer's format.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Renders one record, without a trailing newline.
    pub fn render(&self, record: &LogRecord) -> Vec<u8> {
        match self.format {
            LogFormat::KeyValue => render_key_value(record).into_bytes(),
            LogFormat::Json => render_json(record),
            LogFormat::Human => render_human(record, self.ansi).into_bytes(),
        }
    }
}

/// Renders `k=v` form, quoting values that contain whitespace or quotes.
pub fn render_key_value(record: &LogRecord) -> String {
    let mut out = String::with_capacity(128);
    push_pair(&mut out, "timestamp", &record.timestamp_rfc3339());
    push_pair(&mut out, "level", record.level().as_str());
    push_pair(&mut out, "logger", record.logger());
    push_pair(&mut out, "event", record.event());
    for (key, value) in record.attributes().iter() {
        push_pair(&mut out, key, &value.to_string());
    }
    if let Some(trace_id) = record.trace_id() {
        push_pair(&mut out, "trace_id", trace_id);
    }
    if let Some(span_id) = record.span_id() {
        push_pair(&mut out, "span_id", span_id);
    }
    if let Some(error) = record.error() {
        push_pair(&mut out, "error.type", &error.type_name);
        push_pair(&mut out, "error.message", &error.message);
    }
    out
}

fn push_pair(out: &mut String, key: &str, value: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(key);
    out.push('=');
    if needs_quoting(value) {
        out.push('"');
        for c in value.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                c => out.push(c),
            }
        }
        out.push('"');
    } else {
        out.push_str(value);
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '"')
}

fn render_json(record: &LogRecord) -> Vec<u8> {
    let mut object = serde_json::Map::new();
    object.insert(
        "timestamp".to_owned(),
        serde_json::Value::String(record.timestamp_rfc3339()),
    );
    object.insert(
        "level".to_owned(),
        serde_json::Value::String(record.level().as_str().to_owned()),
    );
    object.insert(
        "logger".to_owned(),
        serde_json::Value::String(record.logger().to_owned()),
    );
    object.insert(
        "event".to_owned(),
        serde_json::Value::String(record.event().to_owned()),
    );
    for (key, value) in record.attributes().iter() {
        // The reserved keys always describe the record itself.
        if !object.contains_key(key) {
            object.insert(key.to_owned(), value.to_json());
        }
    }
    if let Some(trace_id) = record.trace_id() {
        object.insert(
            "trace_id".to_owned(),
            serde_json::Value::String(trace_id.to_owned()),
        );
    }
    if let Some(span_id) = record.span_id() {
        object.insert(
            "span_id".to_owned(),
            serde_json::Value::String(span_id.to_owned()),
        );
    }
    if let Some(error) = record.error() {
        object.insert("error".to_owned(), error.to_value().to_json());
    }
    serde_json::to_vec(&serde_json::Value::Object(object))
        .unwrap_or_else(|_| render_key_value(record).into_bytes())
}

fn render_human(record: &LogRecord, ansi: bool) -> String {
    let mut out = String::with_capacity(128);
    let time = record
        .timestamp()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let time = time.split('T').nth(1).unwrap_or(&time).trim_end_matches('Z');

    if ansi {
        let _ = write!(out, "{}", Style::new().dimmed().paint(time));
        let _ = write!(
            out,
            " {:>8}",
            level_style(record.level()).paint(record.level().as_str())
        );
        let _ = write!(out, " {}", Style::new().dimmed().paint(record.logger()));
        let _ = write!(out, ": {}", record.event());
    } else {
        let _ = write!(
            out,
            "{} {:>8} {}: {}",
            time,
            record.level(),
            record.logger(),
            record.event()
        );
    }

    for (key, value) in record.attributes().iter() {
        // Compound values collapse to compact JSON so the line stays flat.
        let rendered = value.to_string();
        if ansi {
            let _ = write!(
                out,
                " {}",
                Style::new().dimmed().paint(format!("{}={}", key, rendered))
            );
        } else {
            let _ = write!(out, " {}={}", key, rendered);
        }
    }
    if let Some(error) = record.error() {
        let text = format!(" [{}: {}]", error.type_name, error.message);
        if ansi {
            let _ = write!(out, "{}", Colour::Red.paint(text));
        } else {
            out.push_str(&text);
        }
    }
    out
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Trace => Style::new().dimmed(),
        Level::Debug => Colour::Blue.normal(),
        Level::Info => Colour::Green.normal(),
        Level::Warning => Colour::Yellow.normal(),
        Level::Error => Colour::Red.normal(),
        Level::Critical => Colour::Red.bold(),
    }
}
