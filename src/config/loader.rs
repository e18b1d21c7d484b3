//! Layered resolution.

use super::converters::resolve_indirection;
use super::field::Schema;
use super::Source;
use foundation_core::{FoundationError, Result, Value};
use std::collections::HashMap;
use std::env;

/// The result of resolving a [`Schema`] across layers: every field's value
/// and the source it came from.
#[derive(Debug, Default)]
pub struct Resolved {
    values: Vec<(String, Value, Source)>,
}

impl Resolved {
    /// Looks up a field's value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, v, _)| v)
    }

    /// Looks up a field's value together with its provenance.
    pub fn get_with_source(&self, name: &str) -> Option<(&Value, Source)> {
        self.values
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, v, s)| (v, *s))
    }

    /// A required string field.
    pub fn str_field(&self, name: &str) -> Result<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(name))
    }

    /// An optional string field; `Null` and absence both read as `None`.
    pub fn opt_str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// A required boolean field.
    pub fn bool_field(&self, name: &str) -> Result<bool> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(name))
    }

    /// A required float field.
    pub fn float_field(&self, name: &str) -> Result<f64> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(name))
    }

    /// The per-field source map, for provenance introspection.
    pub fn sources(&self) -> HashMap<String, Source> {
        self.values
            .iter()
            .map(|(n, _, s)| (n.clone(), *s))
            .collect()
    }
}

fn missing(name: &str) -> FoundationError {
    FoundationError::configuration(format!("missing required field {:?}", name))
        .with_context("config.field", name)
}

/// A typed configuration: a schema plus construction from resolved values.
pub trait ConfigSchema: Sized + Send + Sync + 'static {
    /// The declared fields.
    fn schema() -> Schema;

    /// Builds the typed value from a resolution.
    fn from_resolved(resolved: &Resolved) -> Result<Self>;
}

/// Resolves schemas across layered sources.
///
/// Precedence, strongest first: explicit overrides, runtime overrides, the
/// file layer, environment variables, declared defaults.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    env_prefix: Option<String>,
    file_layer: Vec<(String, Value)>,
    runtime: Vec<(String, Value)>,
    explicit: Vec<(String, Value)>,
}

impl ConfigLoader {
    /// A loader reading only environment variables and defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespaces env lookups: for a field bound to `VAR`, the variable
    /// `PREFIX_VAR` is consulted first and wins when set.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Supplies pre-parsed file values. Format readers (JSON, YAML, TOML)
    /// are external collaborators; the loader takes their output.
    pub fn file_layer(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.file_layer.extend(values);
        self
    }

    /// Adds a runtime override.
    pub fn runtime(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.runtime.push((name.into(), value.into()));
        self
    }

    /// Adds an explicit override, the strongest layer.
    pub fn explicit(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.explicit.push((name.into(), value.into()));
        self
    }

    /// Resolves `schema` and records provenance per field.
    pub fn resolve(&self, schema: &Schema) -> Result<Resolved> {
        let mut resolved = Resolved::default();
        for field in schema.fields() {
            let value_and_source = self
                .layered(field.name)
                .map(Ok)
                .or_else(|| self.from_env(field).transpose())
                .or_else(|| {
                    field
                        .default
                        .clone()
                        .map(|v| Ok((v, Source::Default)))
                })
                .transpose()?;

            if let Some((value, source)) = value_and_source {
                if let Some(validator) = &field.validator {
                    validator(&value).map_err(|err| {
                        FoundationError::configuration(format!(
                            "invalid value for {:?}",
                            field.name
                        ))
                        .with_context("config.field", field.name)
                        .with_context("config.source", source.to_string())
                        .with_cause(err)
                    })?;
                }
                resolved.values.push((field.name.to_owned(), value, source));
            }
        }
        Ok(resolved)
    }

    /// Loads a typed configuration.
    pub fn load<T: ConfigSchema>(&self) -> Result<(T, Resolved)> {
        let schema = T::schema();
        let resolved = self.resolve(&schema)?;
        let value = T::from_resolved(&resolved)?;
        Ok((value, resolved))
    }

    fn layered(&self, name: &str) -> Option<(Value, Source)> {
        let find = |layer: &[(String, Value)]| {
            layer
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        };
        find(&self.explicit)
            .map(|v| (v, Source::Explicit))
            .or_else(|| find(&self.runtime).map(|v| (v, Source::Runtime)))
            .or_else(|| find(&self.file_layer).map(|v| (v, Source::File)))
    }

    fn from_env(&self, field: &super::field::FieldSpec) -> Result<Option<(Value, Source)>> {
        let candidates = field.env_vars.iter().flat_map(|var| {
            let prefixed = self
                .env_prefix
                .as_ref()
                .map(|prefix| format!("{}_{}", prefix, var));
            prefixed.into_iter().chain(std::iter::once((*var).to_owned()))
        });
        for var in candidates {
            let var = var.as_str();
            let raw = match env::var(var) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            let raw = resolve_indirection(&raw).map_err(|err| {
                FoundationError::configuration(format!(
                    "could not resolve {:?} for field {:?}",
                    var, field.name
                ))
                .with_context("config.field", field.name)
                .with_context("config.source", "env")
                .with_cause(err)
            })?;
            let value = match &field.converter {
                Some(convert) => convert(&raw).map_err(|err| {
                    FoundationError::configuration(format!(
                        "invalid value in {:?} for field {:?}",
                        var, field.name
                    ))
                    .with_context("config.field", field.name)
                    .with_context("config.source", "env")
                    .with_context("config.env_var", var)
                    .with_cause(err)
                })?,
                None => Value::Str(raw),
            };
            return Ok(Some((value, Source::Env)));
        }
        Ok(None)
    }
}

/// Loads `T` from environment variables and defaults only.
pub fn from_env<T: ConfigSchema>() -> Result<T> {
    ConfigLoader::new().load::<T>().map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::converters::parse_bool;
    use crate::config::field::FieldSpec;

    #[derive(Debug)]
    struct Sample {
        retries: i64,
        verbose: bool,
        label: String,
    }

    impl ConfigSchema for Sample {
        fn schema() -> Schema {
            Schema::new()
                .field(FieldSpec::new("retries").default_value(3))
                .field(
                    FieldSpec::new("verbose")
                        .env("FOUNDATION_TEST_SAMPLE_VERBOSE")
                        .converter(parse_bool)
                        .default_value(false),
                )
                .field(FieldSpec::new("label").default_value("default-label"))
        }

        fn from_resolved(resolved: &Resolved) -> Result<Self> {
            Ok(Sample {
                retries: resolved
                    .get("retries")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                verbose: resolved.bool_field("verbose")?,
                label: resolved.str_field("label")?.to_owned(),
            })
        }
    }

    #[test]
    fn defaults_apply_when_nothing_else_does() {
        let (sample, resolved) = ConfigLoader::new().load::<Sample>().unwrap();
        assert_eq!(sample.retries, 3);
        assert!(!sample.verbose);
        assert_eq!(sample.label, "default-label");
        assert_eq!(
            resolved.get_with_source("retries").map(|(_, s)| s),
            Some(Source::Default)
        );
    }

    #[test]
    fn explicit_beats_runtime_beats_file() {
        let loader = ConfigLoader::new()
            .file_layer(vec![("retries".to_owned(), Value::Int(5))])
            .runtime("retries", 7)
            .explicit("retries", 9);
        let (sample, resolved) = loader.load::<Sample>().unwrap();
        assert_eq!(sample.retries, 9);
        assert_eq!(
            resolved.get_with_source("retries").map(|(_, s)| s),
            Some(Source::Explicit)
        );

        let loader = ConfigLoader::new()
            .file_layer(vec![("retries".to_owned(), Value::Int(5))])
            .runtime("retries", 7);
        let (sample, _) = loader.load::<Sample>().unwrap();
        assert_eq!(sample.retries, 7);

        let loader = ConfigLoader::new().file_layer(vec![("retries".to_owned(), Value::Int(5))]);
        let (sample, resolved) = loader.load::<Sample>().unwrap();
        assert_eq!(sample.retries, 5);
        assert_eq!(
            resolved.get_with_source("retries").map(|(_, s)| s),
            Some(Source::File)
        );
    }

    // Serializes the tests that touch the process environment.
    lazy_static::lazy_static! {
        static ref ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
    }

    #[test]
    fn env_values_run_through_the_converter() {
        let _env = ENV_LOCK.lock();
        env::set_var("FOUNDATION_TEST_SAMPLE_VERBOSE", "yes");
        let (sample, resolved) = ConfigLoader::new().load::<Sample>().unwrap();
        env::remove_var("FOUNDATION_TEST_SAMPLE_VERBOSE");
        assert!(sample.verbose);
        assert_eq!(
            resolved.get_with_source("verbose").map(|(_, s)| s),
            Some(Source::Env)
        );
    }

    #[test]
    fn env_prefix_namespaces_lookups() {
        let _env = ENV_LOCK.lock();
        env::set_var("ACME_FOUNDATION_TEST_SAMPLE_VERBOSE", "true");
        env::set_var("FOUNDATION_TEST_SAMPLE_VERBOSE", "false");
        let (sample, _) = ConfigLoader::new()
            .env_prefix("ACME")
            .load::<Sample>()
            .unwrap();
        env::remove_var("ACME_FOUNDATION_TEST_SAMPLE_VERBOSE");
        env::remove_var("FOUNDATION_TEST_SAMPLE_VERBOSE");
        assert!(sample.verbose, "the prefixed variable wins");
    }

    #[test]
    fn converter_failures_name_the_field() {
        let _env = ENV_LOCK.lock();
        env::set_var("FOUNDATION_TEST_SAMPLE_VERBOSE", "maybe");
        let err = ConfigLoader::new().load::<Sample>().unwrap_err();
        env::remove_var("FOUNDATION_TEST_SAMPLE_VERBOSE");
        assert_eq!(
            err.context("config.field").and_then(Value::as_str),
            Some("verbose")
        );
        assert_eq!(
            err.context("config.source").and_then(Value::as_str),
            Some("env")
        );
    }

    #[test]
    fn validators_run_on_any_source() {
        #[derive(Debug)]
        struct Bounded;
        impl ConfigSchema for Bounded {
            fn schema() -> Schema {
                Schema::new().field(
                    FieldSpec::new("rate")
                        .default_value(2.0)
                        .validator(|value| {
                            let rate = value.as_f64().unwrap_or(-1.0);
                            if (0.0..=1.0).contains(&rate) {
                                Ok(())
                            } else {
                                Err(FoundationError::validation("rate must be in [0, 1]"))
                            }
                        }),
                )
            }
            fn from_resolved(_: &Resolved) -> Result<Self> {
                Ok(Bounded)
            }
        }
        let err = ConfigLoader::new().load::<Bounded>().unwrap_err();
        assert_eq!(
            err.context("config.field").and_then(Value::as_str),
            Some("rate")
        );
    }
}
