//! Layered, typed configuration with source provenance.
//!
//! Configuration structs declare a [`Schema`] — an ordered list of
//! [`FieldSpec`]s with env bindings, converters, and validators — and
//! implement [`ConfigSchema`] to build themselves from the resolved
//! values. The [`ConfigLoader`] resolves each field across layers in
//! precedence order (explicit > runtime > file > env > default) and
//! records where every value came from, so a deployment can always answer
//! "why is this setting what it is".
//!
//! Any environment value may be `file://path`: the file is read and its
//! trimmed contents become the value (secret indirection).
//!
//! Converters are total `&str → Value` functions and must never touch the
//! logging system — the logger's own configuration loads through them.

mod converters;
mod field;
mod loader;
mod registry;
mod telemetry;

pub use self::converters::{
    parse_bool, parse_duration_secs, parse_float_in_range, parse_header_list, parse_level,
    parse_module_levels, parse_status_codes, resolve_indirection,
};
pub use self::field::{FieldSpec, Schema};
pub use self::loader::{from_env, ConfigLoader, ConfigSchema, Resolved};
pub use self::registry::ConfigRegistry;
pub use self::telemetry::{ColorChoice, TelemetryConfig};

use std::fmt;

/// Where a configuration value came from.
///
/// The ordering is the precedence: a later variant beats an earlier one
/// when both layers provide the field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// The field's declared default.
    Default,
    /// An environment variable.
    Env,
    /// A caller-supplied file layer.
    File,
    /// A runtime override.
    Runtime,
    /// An explicit override, set programmatically.
    Explicit,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Default => "default",
            Source::Env => "env",
            Source::File => "file",
            Source::Runtime => "runtime",
            Source::Explicit => "explicit",
        };
        f.pad(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_order() {
        assert!(Source::Explicit > Source::Runtime);
        assert!(Source::Runtime > Source::File);
        assert!(Source::File > Source::Env);
        assert!(Source::Env > Source::Default);
    }
}
