//! Tracing subscriber setup

use tracing::Level;

use crate::config::LoggingSettings;

/// Parse a level name, case-insensitively
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global fmt subscriber.
///
/// Returns false when a subscriber was already installed; unknown level names
/// fall back to INFO.
pub fn init(settings: &LoggingSettings) -> bool {
    let level = parse_level(&settings.level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level(" warning "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_init_is_idempotent() {
        let settings = LoggingSettings::default();
        let _ = init(&settings);
        assert!(!init(&settings));
    }
}
