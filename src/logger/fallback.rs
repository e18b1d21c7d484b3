//! The bootstrap fallback writer.

use crate::fmt::render_key_value;
use foundation_core::{AttributeMap, ErrorInfo, Level, LogRecord};
use std::io::Write;

// Debug and trace records are suppressed here: the fallback exists so
// warnings and errors surface while the real pipeline is unavailable, not
// to mirror its verbosity.
const FALLBACK_THRESHOLD: Level = Level::Info;

/// Writes one `key=value` line straight to stderr.
pub(crate) fn fallback_write(
    name: &str,
    level: Level,
    event: &str,
    attributes: &AttributeMap,
    error: Option<&ErrorInfo>,
) {
    if level < FALLBACK_THRESHOLD {
        return;
    }
    let mut record = LogRecord::new(name, level, event, attributes.clone());
    if let Some(error) = error {
        record.set_error(error.clone());
    }
    let line = render_key_value(&record);
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = handle.write_all(line.as_bytes());
    let _ = handle.write_all(b"\n");
}
