//! Logging configuration.
//!
//! `MAILBATCH_LOG` and `MAILBATCH_LOG_FORMAT` set the defaults, CLI flags
//! override them. A valid `RUST_LOG` replaces the whole filter at init.

use clap::ValueEnum;

/// Environment variable holding the log level.
pub const ENV_LOG_LEVEL: &str = "MAILBATCH_LOG";
/// Environment variable holding the log format.
pub const ENV_LOG_FORMAT: &str = "MAILBATCH_LOG_FORMAT";

/// Where stderr log lines go: a console or a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    #[value(alias = "console")]
    Human,
    #[value(alias = "json")]
    Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
    #[value(alias = "quiet")]
    Off,
}

impl LogLevel {
    /// Shift by `-v`/`-q` counts: each `-v` is one step more verbose.
    pub fn adjust(self, verbose: u8, quiet: bool) -> Self {
        if quiet {
            return LogLevel::Error.max(self);
        }
        (0..verbose).fold(self, |level, _| match level {
            LogLevel::Off => LogLevel::Error,
            LogLevel::Error => LogLevel::Warn,
            LogLevel::Warn => LogLevel::Info,
            LogLevel::Info => LogLevel::Debug,
            LogLevel::Debug | LogLevel::Trace => LogLevel::Trace,
        })
    }

    /// Directive spelling understood by `EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Include timestamps in human output.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Environment defaults, then CLI overrides. Unparseable values are ignored.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        let env_value = |name| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
        };
        let defaults = LogConfig::default();
        LogConfig {
            level: cli_level
                .or_else(|| env_value(ENV_LOG_LEVEL).and_then(|v| LogLevel::from_str(&v, true).ok()))
                .unwrap_or(defaults.level),
            format: cli_format
                .or_else(|| {
                    env_value(ENV_LOG_FORMAT).and_then(|v| LogFormat::from_str(&v, true).ok())
                })
                .unwrap_or(defaults.format),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_parse_case_insensitively() {
        assert_eq!(LogFormat::from_str("JSON", true), Ok(LogFormat::Jsonl));
        assert_eq!(LogLevel::from_str("Warning", true), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("quiet", true), Ok(LogLevel::Off));
        assert!(LogLevel::from_str("loud", true).is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = LogConfig::from_env(Some(LogLevel::Trace), Some(LogFormat::Jsonl));
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Jsonl);
        assert!(config.timestamps);
    }

    #[test]
    fn test_verbosity_steps() {
        let steps: Vec<_> = (0..=5).map(|v| LogLevel::Warn.adjust(v, false)).collect();
        assert_eq!(
            steps,
            vec![
                LogLevel::Warn,
                LogLevel::Info,
                LogLevel::Debug,
                LogLevel::Trace,
                LogLevel::Trace,
                LogLevel::Trace
            ]
        );
        assert_eq!(LogLevel::Debug.adjust(2, true), LogLevel::Error);
        assert_eq!(LogLevel::Off.adjust(0, true), LogLevel::Off);
    }
}
