//! Field declarations.

use foundation_core::{Result, Value};
use std::fmt;

pub(crate) type Converter = Box<dyn Fn(&str) -> Result<Value> + Send + Sync>;
pub(crate) type Validator = Box<dyn Fn(&Value) -> Result<()> + Send + Sync>;

/// Declares one configuration field: its name, where it can come from,
/// and how raw input becomes a typed value.
pub struct FieldSpec {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) env_vars: Vec<&'static str>,
    pub(crate) default: Option<Value>,
    pub(crate) converter: Option<Converter>,
    pub(crate) validator: Option<Validator>,
    pub(crate) sensitive: bool,
}

impl FieldSpec {
    /// A field with no env binding, no default, and identity conversion.
    pub fn new(name: &'static str) -> Self {
        FieldSpec {
            name,
            description: "",
            env_vars: Vec::new(),
            default: None,
            converter: None,
            validator: None,
            sensitive: false,
        }
    }

    /// Documents the field.
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Binds an environment variable. May be called more than once; the
    /// first set variable wins (later bindings are fallbacks).
    pub fn env(mut self, var: &'static str) -> Self {
        self.env_vars.push(var);
        self
    }

    /// Sets the default used when no layer provides the field.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Installs the string converter applied to env-sourced raw values.
    pub fn converter(
        mut self,
        converter: impl Fn(&str) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    /// Installs a validator applied to the final value, whatever its
    /// source.
    pub fn validator(
        mut self,
        validator: impl Fn(&Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Marks the value as secret; it renders redacted in `Debug` output.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// The field's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field's description.
    pub fn description(&self) -> &'static str {
        self.description
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("FieldSpec");
        s.field("name", &self.name).field("env_vars", &self.env_vars);
        if self.sensitive {
            s.field("default", &"[REDACTED]");
        } else {
            s.field("default", &self.default);
        }
        s.finish()
    }
}

/// An ordered collection of [`FieldSpec`]s.
#[derive(Debug, Default)]
pub struct Schema {
    pub(crate) fields: Vec<FieldSpec>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Schema { fields: Vec::new() }
    }

    /// Appends a field.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        debug_assert!(
            !self.fields.iter().any(|f| f.name == spec.name),
            "duplicate field {:?}",
            spec.name
        );
        self.fields.push(spec);
        self
    }

    /// Iterates the declared fields in order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }
}
