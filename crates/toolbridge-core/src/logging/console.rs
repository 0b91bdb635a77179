//! Console logger implementation

use super::traits::{LogLevel, Logger};

/// A logger that outputs to the console (stdout/stderr)
///
/// Info goes to stdout, everything else to stderr. Messages below
/// `min_level` are dropped.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    prefix: String,
    min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self {
            prefix: "[toolbridge]".to_string(),
            min_level: LogLevel::Info,
        }
    }

    /// Build from `TOOLBRIDGE_LOG_LEVEL`, falling back to info
    pub fn from_env() -> Self {
        let min_level = std::env::var("TOOLBRIDGE_LOG_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LogLevel::Info);
        Self::new().with_min_level(min_level)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        match level {
            LogLevel::Info => println!("{} {}: {}", self.prefix, level, message),
            _ => eprintln!("{} {}: {}", self.prefix, level, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let logger = ConsoleLogger::new().with_min_level(LogLevel::Warn);
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Warn));
        assert!(logger.enabled(LogLevel::Error));
    }

    #[test]
    fn test_custom_prefix() {
        let logger = ConsoleLogger::new().with_prefix("[host]");
        assert_eq!(logger.prefix, "[host]");
        logger.debug("filtered out");
        logger.info("printed");
    }
}
