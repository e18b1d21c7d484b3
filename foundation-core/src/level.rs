//! Severity levels.
//!
//! Levels form a total order (`Trace < Debug < Info < Warning < Error <
//! Critical`) and carry stable numeric values so that records can be
//! compared, filtered, and exported without string comparisons.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// Describes the severity of a log record.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Level {
    /// Very low priority, often extremely verbose, information.
    Trace = 5,
    /// Lower priority information useful while diagnosing.
    Debug = 10,
    /// Useful information about normal operation.
    Info = 20,
    /// Hazardous situations that do not stop the program.
    Warning = 30,
    /// Serious errors.
    Error = 40,
    /// Errors after which the process cannot meaningfully continue.
    Critical = 50,
}

impl Level {
    /// All levels, in ascending order of severity.
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    /// Returns the level's stable numeric value.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Returns the level's canonical uppercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Level) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Level) -> Ordering {
        self.value().cmp(&other.value())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;
    fn from_str(s: &str) -> Result<Self, ParseLevelError> {
        let trimmed = s.trim();
        match trimmed {
            s if s.eq_ignore_ascii_case("trace") => Ok(Level::Trace),
            s if s.eq_ignore_ascii_case("debug") => Ok(Level::Debug),
            s if s.eq_ignore_ascii_case("info") => Ok(Level::Info),
            s if s.eq_ignore_ascii_case("warning") => Ok(Level::Warning),
            s if s.eq_ignore_ascii_case("warn") => Ok(Level::Warning),
            s if s.eq_ignore_ascii_case("error") => Ok(Level::Error),
            s if s.eq_ignore_ascii_case("critical") => Ok(Level::Critical),
            _ => Err(ParseLevelError {
                input: trimmed.to_owned(),
            }),
        }
    }
}

impl serde::Serialize for Level {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Indicates that a string did not name a known level.
///
/// Unknown level names fail loudly at configuration time rather than being
/// silently mapped to a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError {
    input: String,
}

impl ParseLevelError {
    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown level {:?}, expected one of TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL",
            self.input
        )
    }
}

impl Error for ParseLevelError {}
