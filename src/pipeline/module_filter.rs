//! Per-module level filtering.
//!
//! Logger names are dotted paths; a module-levels map assigns levels to
//! name prefixes. The effective level of a logger is the value at the
//! longest matching prefix, or the default when no prefix matches. A
//! prefix matches whole segments only: `app.db` matches `app.db.query`
//! but not `app.db2`.

use super::{Outcome, Processor};
use foundation_core::{Level, LogRecord};
use smallvec::SmallVec;

/// The module-levels map plus the default level.
#[derive(Debug, Clone)]
pub struct ModuleLevels {
    default: Level,
    // Sorted longest-prefix-first so the first match is the winner, the
    // same most-specific-first discipline an env-filter uses.
    overrides: SmallVec<[(String, Level); 8]>,
}

impl ModuleLevels {
    /// Builds the map; `overrides` may arrive in any order.
    pub fn new(default: Level, overrides: impl IntoIterator<Item = (String, Level)>) -> Self {
        let mut overrides: SmallVec<[(String, Level); 8]> = overrides.into_iter().collect();
        overrides.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        ModuleLevels { default, overrides }
    }

    /// The default level.
    pub fn default_level(&self) -> Level {
        self.default
    }

    /// The effective level for `logger`: the longest matching prefix's
    /// level, else the default.
    pub fn effective_level(&self, logger: &str) -> Level {
        self.overrides
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, logger))
            .map(|(_, level)| *level)
            .unwrap_or(self.default)
    }

    /// True if a record at `level` from `logger` passes.
    pub fn enabled(&self, logger: &str, level: Level) -> bool {
        level >= self.effective_level(logger)
    }
}

fn prefix_matches(prefix: &str, logger: &str) -> bool {
    if !logger.starts_with(prefix) {
        return false;
    }
    logger.len() == prefix.len() || logger.as_bytes()[prefix.len()] == b'.'
}

/// The processor dropping records below their logger's effective level.
#[derive(Debug)]
pub struct ModuleFilter {
    levels: ModuleLevels,
}

impl ModuleFilter {
    /// A filter over the given map.
    pub fn new(levels: ModuleLevels) -> Self {
        ModuleFilter { levels }
    }
}

impl Processor for ModuleFilter {
    fn name(&self) -> &'static str {
        "module_filter"
    }

    fn process(&self, record: &mut LogRecord) -> Outcome {
        if self.levels.enabled(record.logger(), record.level()) {
            Outcome::Continue
        } else {
            Outcome::Drop
        }
    }
}
