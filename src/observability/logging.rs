//! Structured logging configuration.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_FILTER_ENV: &str = "LEDGERIO_LOG";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "LEDGERIO_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `ledgerio=debug`.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Applies environment overrides and the CLI verbosity flag.
    ///
    /// `verbose` raises the crate's own level to `debug` unless an explicit
    /// filter was given through [`LOG_FILTER_ENV`].
    #[must_use]
    pub fn with_env_overrides(mut self, verbose: bool) -> Self {
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            self.filter = filter;
        } else if verbose {
            self.filter = format!("{},ledgerio=debug", self.filter);
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            self.format = LogFormat::parse(&format);
        }
        self
    }

    /// Builds the `EnvFilter`, falling back to `warn` on an invalid directive.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Pretty);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "warn");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
    }
}
