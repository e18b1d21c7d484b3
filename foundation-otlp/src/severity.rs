//! Level → OTLP severity mapping.

use foundation_core::Level;

/// Maps an internal level onto the OTLP log data model's severity number.
pub fn severity_number(level: Level) -> i32 {
    match level {
        Level::Trace => 1,
        Level::Debug => 5,
        Level::Info => 9,
        Level::Warning => 13,
        Level::Error => 17,
        Level::Critical => 21,
    }
}

/// The severity text exported alongside the number.
pub fn severity_text(level: Level) -> &'static str {
    level.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table() {
        let expected = [
            (Level::Trace, 1),
            (Level::Debug, 5),
            (Level::Info, 9),
            (Level::Warning, 13),
            (Level::Error, 17),
            (Level::Critical, 21),
        ];
        for (level, number) in expected {
            assert_eq!(severity_number(level), number);
        }
    }

    #[test]
    fn severity_text_matches_level_names() {
        assert_eq!(severity_text(Level::Warning), "WARNING");
    }
}
