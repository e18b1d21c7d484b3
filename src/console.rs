//! Console I/O: `pout`, `perr`, `pin`.
//!
//! These are the toolkit's user-facing output calls, distinct from the
//! logging pipeline: scripts and CLI commands print results here while
//! diagnostics go through the logger. JSON mode (configuration or the
//! `PROVIDE_JSON_OUTPUT` environment flag) turns every write into a
//! machine-readable line: structured values are emitted as canonical
//! JSON, scalars are wrapped as `{json_key: value}`. Color and markers
//! are dropped automatically off-TTY or when `NO_COLOR` is set.

use crate::config::TelemetryConfig;
use crate::hub;
use ansi_term::{Colour, Style};
use foundation_core::Value;
use std::io::{self, BufRead, Write};

/// Foreground colors for console output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Yellow.
    Yellow,
    /// Blue.
    Blue,
    /// Magenta.
    Magenta,
    /// Cyan.
    Cyan,
}

impl Color {
    fn to_ansi(self) -> Colour {
        match self {
            Color::Red => Colour::Red,
            Color::Green => Colour::Green,
            Color::Yellow => Colour::Yellow,
            Color::Blue => Colour::Blue,
            Color::Magenta => Colour::Purple,
            Color::Cyan => Colour::Cyan,
        }
    }
}

/// Styling and structure options for one write.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Foreground color, when color is active.
    pub color: Option<Color>,
    /// Bold text.
    pub bold: bool,
    /// Dim text.
    pub dim: bool,
    /// Suppress the trailing newline.
    pub no_newline: bool,
    /// A marker (emoji or tag) prefixed when decoration is active.
    pub marker: Option<String>,
    /// The wrapping key used for scalar values in JSON mode. Defaults to
    /// `"message"`.
    pub json_key: Option<String>,
}

impl OutputOptions {
    /// The default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the color.
    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Dim.
    pub fn dim(mut self) -> Self {
        self.dim = true;
        self
    }

    /// Suppresses the trailing newline.
    pub fn no_newline(mut self) -> Self {
        self.no_newline = true;
        self
    }

    /// Sets the marker prefix.
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Sets the JSON wrapping key.
    pub fn json_key(mut self, key: impl Into<String>) -> Self {
        self.json_key = Some(key.into());
        self
    }
}

/// Whether JSON mode is active: the registered telemetry config first,
/// the environment flag as the pre-bootstrap fallback.
pub fn json_mode_active() -> bool {
    if let Some(config) = hub::hub().config::<TelemetryConfig>() {
        return config.json_output;
    }
    matches!(
        std::env::var("PROVIDE_JSON_OUTPUT").ok().as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

fn decoration_active(is_tty: bool) -> bool {
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    is_tty
}

fn format_plain(value: &Value, options: &OutputOptions, is_tty: bool) -> String {
    let body = match value {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    };
    if !decoration_active(is_tty) {
        return body;
    }
    let mut out = String::new();
    if let Some(marker) = &options.marker {
        out.push_str(marker);
        out.push(' ');
    }
    let mut style = match options.color {
        Some(color) => color.to_ansi().normal(),
        None => Style::new(),
    };
    if options.bold {
        style = style.bold();
    }
    if options.dim {
        style = style.dimmed();
    }
    out.push_str(&style.paint(body).to_string());
    out
}

fn format_json(value: &Value, options: &OutputOptions) -> String {
    let json = match value {
        Value::List(_) | Value::Map(_) => value.to_json(),
        scalar => {
            let key = options.json_key.as_deref().unwrap_or("message");
            let mut object = serde_json::Map::new();
            object.insert(key.to_owned(), scalar.to_json());
            serde_json::Value::Object(object)
        }
    };
    json.to_string()
}

fn write_value(
    target: &mut dyn Write,
    is_tty: bool,
    value: Value,
    options: &OutputOptions,
) -> io::Result<()> {
    let line = if json_mode_active() {
        format_json(&value, options)
    } else {
        format_plain(&value, options, is_tty)
    };
    target.write_all(line.as_bytes())?;
    if !options.no_newline {
        target.write_all(b"\n")?;
    }
    target.flush()
}

/// Writes `value` to stdout. Errors are swallowed — console output is
/// best effort.
pub fn pout(value: impl Into<Value>, options: &OutputOptions) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write_value(
        &mut handle,
        atty::is(atty::Stream::Stdout),
        value.into(),
        options,
    );
}

/// Writes `value` to stderr. Errors are swallowed.
pub fn perr(value: impl Into<Value>, options: &OutputOptions) {
    let stderr = io::stderr();
    let mut handle = stderr.lock();
    let _ = write_value(
        &mut handle,
        atty::is(atty::Stream::Stderr),
        value.into(),
        options,
    );
}

/// Prompts on stderr and reads one line from stdin, without the trailing
/// newline.
pub fn pin(prompt: &str, options: &OutputOptions) -> io::Result<String> {
    if !prompt.is_empty() {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        let rendered = if json_mode_active() {
            format_json(&Value::Str(prompt.to_owned()), options)
        } else {
            format_plain(
                &Value::Str(prompt.to_owned()),
                options,
                atty::is(atty::Stream::Stderr),
            )
        };
        handle.write_all(rendered.as_bytes())?;
        if !options.no_newline {
            handle.write_all(b" ")?;
        }
        handle.flush()?;
    }
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_wrap_under_the_json_key() {
        let options = OutputOptions::new().json_key("status");
        assert_eq!(
            format_json(&Value::Str("ready".into()), &options),
            r#"{"status":"ready"}"#
        );
        assert_eq!(
            format_json(&Value::Uint(3), &OutputOptions::new()),
            r#"{"message":3}"#
        );
    }

    #[test]
    fn structured_values_emit_canonical_json() {
        let value = Value::Map(vec![
            ("name".to_owned(), Value::Str("csv".into())),
            ("rows".to_owned(), Value::Uint(10)),
        ]);
        assert_eq!(
            format_json(&value, &OutputOptions::new()),
            r#"{"name":"csv","rows":10}"#
        );
    }

    #[test]
    fn plain_formatting_off_tty_is_bare() {
        let options = OutputOptions::new()
            .color(Color::Green)
            .bold()
            .marker("✅");
        let rendered = format_plain(&Value::Str("done".into()), &options, false);
        assert_eq!(rendered, "done");
    }
}
