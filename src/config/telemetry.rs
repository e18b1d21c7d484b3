//! The telemetry configuration consumed at bootstrap.

use super::converters::{
    parse_bool, parse_float_in_range, parse_header_list, parse_level, parse_module_levels,
};
use super::field::{FieldSpec, Schema};
use super::loader::{ConfigSchema, Resolved};
use crate::fmt::LogFormat;
use foundation_core::{FoundationError, Level, Result, Value};
use std::path::PathBuf;

/// Whether console output may use color and emoji.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorChoice {
    /// Color iff the stream is a terminal.
    Auto,
    /// Color regardless of the stream.
    Always,
    /// Never color.
    Never,
}

impl ColorChoice {
    /// Resolves the choice against a stream's TTY-ness.
    pub fn enabled_for(self, is_tty: bool) -> bool {
        match self {
            ColorChoice::Auto => is_tty,
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

/// Everything the Hub needs to assemble the logging pipeline.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// The level applied when no module override matches.
    pub default_level: Level,
    /// Per-module level overrides, matched by longest dotted prefix.
    pub module_levels: Vec<(String, Level)>,
    /// The output format.
    pub formatter: LogFormat,
    /// `service.name` for enrichment and export.
    pub service_name: Option<String>,
    /// `service.version` for enrichment and export.
    pub service_version: Option<String>,
    /// Deployment environment name.
    pub environment: Option<String>,
    /// OTLP collector base URL; export is disabled when absent.
    pub otlp_endpoint: Option<String>,
    /// Headers sent with OTLP exports.
    pub otlp_headers: Vec<(String, String)>,
    /// Trace sampling rate in `[0, 1]`.
    pub trace_sample_rate: f64,
    /// Force JSON mode for console I/O.
    pub json_output: bool,
    /// Console color policy, derived from `NO_COLOR` / `FORCE_COLOR`.
    pub color: ColorChoice,
    /// Whether the console sink is installed at all.
    pub console_enabled: bool,
    /// Token-bucket rate limiting as `(capacity, refill_per_second)`;
    /// disabled when absent.
    pub rate_limit: Option<(f64, f64)>,
    /// Probabilistic log sampling rate in `[0, 1]`; 1.0 passes every
    /// record.
    pub log_sample_rate: f64,
    /// Path for the rotating file sink; file output is disabled when
    /// absent.
    pub log_file: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            default_level: Level::Info,
            module_levels: Vec::new(),
            formatter: LogFormat::KeyValue,
            service_name: None,
            service_version: None,
            environment: None,
            otlp_endpoint: None,
            otlp_headers: Vec::new(),
            trace_sample_rate: 1.0,
            json_output: false,
            color: ColorChoice::Auto,
            console_enabled: true,
            rate_limit: None,
            log_sample_rate: 1.0,
            log_file: None,
        }
    }
}

/// Parses `"capacity:refill_per_second"` for the rate limiter.
fn parse_rate_limit(raw: &str) -> Result<Value> {
    let (capacity, refill) = raw.split_once(':').ok_or_else(|| {
        FoundationError::configuration(format!(
            "expected capacity:refill_per_second, got {:?}",
            raw
        ))
        .with_context("config.input", raw)
    })?;
    let parse = |part: &str| -> Result<f64> {
        let value: f64 = part.trim().parse().map_err(|_| {
            FoundationError::configuration(format!("{:?} is not a number", part))
                .with_context("config.input", raw)
        })?;
        if value < 0.0 {
            return Err(
                FoundationError::configuration("rate limits cannot be negative")
                    .with_context("config.input", raw),
            );
        }
        Ok(value)
    };
    Ok(Value::Map(vec![
        ("capacity".to_owned(), Value::Float(parse(capacity)?)),
        ("refill_per_second".to_owned(), Value::Float(parse(refill)?)),
    ]))
}

impl ConfigSchema for TelemetryConfig {
    fn schema() -> Schema {
        Schema::new()
            .field(
                FieldSpec::new("default_level")
                    .describe("level applied when no module override matches")
                    .env("PROVIDE_LOG_LEVEL")
                    .converter(parse_level)
                    .default_value("INFO"),
            )
            .field(
                FieldSpec::new("module_levels")
                    .describe("per-module level overrides, module:LEVEL pairs")
                    .env("PROVIDE_LOG_MODULE_LEVELS")
                    .converter(parse_module_levels),
            )
            .field(
                FieldSpec::new("formatter")
                    .describe("output format: json, key_value, or human")
                    .env("PROVIDE_LOG_FORMATTER")
                    .converter(|raw| {
                        let format: LogFormat = raw.parse()?;
                        Ok(Value::Str(format.as_str().to_owned()))
                    })
                    .default_value("key_value"),
            )
            .field(
                FieldSpec::new("service_name")
                    .describe("service name; OTEL_SERVICE_NAME wins over PROVIDE_SERVICE_NAME")
                    .env("OTEL_SERVICE_NAME")
                    .env("PROVIDE_SERVICE_NAME"),
            )
            .field(
                FieldSpec::new("service_version")
                    .describe("service version resource attribute")
                    .env("PROVIDE_SERVICE_VERSION"),
            )
            .field(
                FieldSpec::new("environment")
                    .describe("deployment environment name")
                    .env("PROVIDE_ENV")
                    .env("ENVIRONMENT"),
            )
            .field(
                FieldSpec::new("otlp_endpoint")
                    .describe("OTLP collector base URL")
                    .env("OTEL_EXPORTER_OTLP_ENDPOINT"),
            )
            .field(
                FieldSpec::new("otlp_headers")
                    .describe("headers sent with OTLP exports, key=value pairs")
                    .env("OTEL_EXPORTER_OTLP_HEADERS")
                    .converter(parse_header_list)
                    .sensitive(),
            )
            .field(
                FieldSpec::new("trace_sample_rate")
                    .describe("trace sampling rate in [0, 1]")
                    .env("OTEL_TRACE_SAMPLE_RATE")
                    .converter(parse_float_in_range(0.0, 1.0))
                    .default_value(1.0),
            )
            .field(
                FieldSpec::new("json_output")
                    .describe("force JSON mode for console I/O")
                    .env("PROVIDE_JSON_OUTPUT")
                    .converter(parse_bool)
                    .default_value(false),
            )
            .field(
                FieldSpec::new("no_color")
                    .describe("disable console color (any value counts)")
                    .env("NO_COLOR"),
            )
            .field(
                FieldSpec::new("force_color")
                    .describe("force console color even off-TTY")
                    .env("FORCE_COLOR"),
            )
            .field(
                FieldSpec::new("console_enabled")
                    .describe("install the console sink")
                    .env("PROVIDE_LOG_CONSOLE")
                    .converter(parse_bool)
                    .default_value(true),
            )
            .field(
                FieldSpec::new("rate_limit")
                    .describe("token-bucket rate limiting, capacity:refill_per_second")
                    .env("PROVIDE_LOG_RATE_LIMIT")
                    .converter(parse_rate_limit),
            )
            .field(
                FieldSpec::new("log_sample_rate")
                    .describe("probabilistic log sampling rate in [0, 1]")
                    .env("PROVIDE_LOG_SAMPLE_RATE")
                    .converter(parse_float_in_range(0.0, 1.0))
                    .default_value(1.0),
            )
            .field(
                FieldSpec::new("log_file")
                    .describe("path for the rotating file sink")
                    .env("PROVIDE_LOG_FILE"),
            )
    }

    fn from_resolved(resolved: &Resolved) -> Result<Self> {
        let default_level = parse_level_field(resolved, "default_level")?;

        let mut module_levels = Vec::new();
        if let Some(Value::Map(entries)) = resolved.get("module_levels") {
            for (module, level) in entries {
                let level = level.as_str().unwrap_or_default().parse().map_err(
                    |err: foundation_core::ParseLevelError| {
                        FoundationError::configuration(err.to_string())
                            .with_context("config.field", "module_levels")
                            .with_context("config.module", module.as_str())
                    },
                )?;
                module_levels.push((module.clone(), level));
            }
        }

        let formatter = resolved
            .str_field("formatter")?
            .parse()
            .map_err(|err: FoundationError| err.with_context("config.field", "formatter"))?;

        let mut otlp_headers = Vec::new();
        if let Some(Value::Map(entries)) = resolved.get("otlp_headers") {
            for (key, value) in entries {
                otlp_headers.push((key.clone(), value.as_str().unwrap_or_default().to_owned()));
            }
        }

        // FORCE_COLOR wins over NO_COLOR; either is significant merely by
        // being set.
        let color = if resolved.get("force_color").is_some() {
            ColorChoice::Always
        } else if resolved.get("no_color").is_some() {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };

        let rate_limit = match resolved.get("rate_limit") {
            Some(Value::Map(entries)) => {
                let find = |key: &str| {
                    entries
                        .iter()
                        .find(|(k, _)| k == key)
                        .and_then(|(_, v)| v.as_f64())
                };
                match (find("capacity"), find("refill_per_second")) {
                    (Some(capacity), Some(refill)) => Some((capacity, refill)),
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(TelemetryConfig {
            default_level,
            module_levels,
            formatter,
            service_name: resolved.opt_str_field("service_name").map(str::to_owned),
            service_version: resolved.opt_str_field("service_version").map(str::to_owned),
            environment: resolved.opt_str_field("environment").map(str::to_owned),
            otlp_endpoint: resolved.opt_str_field("otlp_endpoint").map(str::to_owned),
            otlp_headers,
            trace_sample_rate: resolved.float_field("trace_sample_rate")?,
            json_output: resolved.bool_field("json_output")?,
            color,
            console_enabled: resolved.bool_field("console_enabled")?,
            rate_limit,
            log_sample_rate: resolved.float_field("log_sample_rate")?,
            log_file: resolved.opt_str_field("log_file").map(PathBuf::from),
        })
    }
}

fn parse_level_field(resolved: &Resolved, field: &'static str) -> Result<Level> {
    resolved.str_field(field)?.parse().map_err(
        |err: foundation_core::ParseLevelError| {
            FoundationError::configuration(err.to_string()).with_context("config.field", field)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    #[test]
    fn defaults_match_the_documented_table() {
        let (config, _) = ConfigLoader::new().load::<TelemetryConfig>().unwrap();
        assert_eq!(config.default_level, Level::Info);
        assert!(config.module_levels.is_empty());
        assert_eq!(config.formatter, LogFormat::KeyValue);
        assert_eq!(config.trace_sample_rate, 1.0);
        assert!(!config.json_output);
    }

    #[test]
    fn explicit_layers_feed_module_levels() {
        let loader = ConfigLoader::new()
            .explicit(
                "module_levels",
                Value::Map(vec![
                    ("app.db".to_owned(), Value::Str("DEBUG".into())),
                    ("ext".to_owned(), Value::Str("ERROR".into())),
                ]),
            )
            .explicit("default_level", "WARNING");
        let (config, _) = loader.load::<TelemetryConfig>().unwrap();
        assert_eq!(config.default_level, Level::Warning);
        assert_eq!(
            config.module_levels,
            vec![
                ("app.db".to_owned(), Level::Debug),
                ("ext".to_owned(), Level::Error)
            ]
        );
    }

    #[test]
    fn color_choice_resolution() {
        assert!(ColorChoice::Auto.enabled_for(true));
        assert!(!ColorChoice::Auto.enabled_for(false));
        assert!(ColorChoice::Always.enabled_for(false));
        assert!(!ColorChoice::Never.enabled_for(true));
    }

    #[test]
    fn bad_formatter_fails_loudly() {
        let loader = ConfigLoader::new().explicit("formatter", "xml");
        assert!(loader.load::<TelemetryConfig>().is_err());
    }

    #[test]
    fn rate_limit_parses_capacity_and_refill() {
        assert_eq!(
            parse_rate_limit("100:2.5").unwrap(),
            Value::Map(vec![
                ("capacity".to_owned(), Value::Float(100.0)),
                ("refill_per_second".to_owned(), Value::Float(2.5)),
            ])
        );
        assert!(parse_rate_limit("100").is_err());
        assert!(parse_rate_limit("-1:5").is_err());

        let loader = ConfigLoader::new().explicit(
            "rate_limit",
            parse_rate_limit("50:1").unwrap(),
        );
        let (config, _) = loader.load::<TelemetryConfig>().unwrap();
        assert_eq!(config.rate_limit, Some((50.0, 1.0)));
    }
}
