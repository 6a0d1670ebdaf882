//! Monitor configuration
//!
//! Loaded once at startup from an optional TOML file, then overridden by
//! command-line flags. Nothing is reconfigured at runtime.

use crate::areas::DEFAULT_AREA_COUNT;
use crate::protocol::{get_grammar, MessageGrammar};
use crate::serial::ingest::{IngestSettings, DEFAULT_BUFFER_LIMIT};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extra room above the longest template the buffer must always hold
const BUFFER_SLACK: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Serial device path; auto-detected when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    pub area_count: usize,
    /// Blocks per row in the terminal grid
    pub columns: usize,
    /// Maximum bytes of unmatched text kept while waiting for a message
    pub buffer_limit: usize,
    /// Message grammar id
    pub grammar: String,
    /// Event journal path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,
    /// Renderer poll period in milliseconds
    pub refresh_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            timeout_ms: 1000,
            area_count: DEFAULT_AREA_COUNT,
            columns: 8,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            grammar: "v1".to_string(),
            journal: None,
            refresh_ms: 200,
        }
    }
}

impl MonitorConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// File config if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.area_count == 0 {
            bail!("area_count must be at least 1");
        }
        if self.columns == 0 {
            bail!("columns must be at least 1");
        }
        if self.timeout_ms == 0 {
            bail!("timeout_ms must be at least 1");
        }
        if self.refresh_ms == 0 {
            bail!("refresh_ms must be at least 1");
        }

        let grammar = self.message_grammar()?;
        let minimum = grammar.longest_template() + BUFFER_SLACK;
        if self.buffer_limit < minimum {
            bail!(
                "buffer_limit {} is too small for grammar {} (minimum {})",
                self.buffer_limit,
                grammar.id,
                minimum
            );
        }

        Ok(())
    }

    pub fn message_grammar(&self) -> Result<&'static MessageGrammar> {
        get_grammar(&self.grammar).with_context(|| {
            format!(
                "Unknown grammar: {}. Use 'fire-monitor grammar list' to see available grammars.",
                self.grammar
            )
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn ingest_settings(&self) -> Result<IngestSettings> {
        Ok(IngestSettings {
            grammar: self.message_grammar()?.clone(),
            buffer_limit: self.buffer_limit,
            journal: self.journal.clone(),
        })
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.area_count, 32);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = MonitorConfig::parse(
            r#"
            port = "/dev/ttyACM0"
            area_count = 16
            journal = "/var/log/fire.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.area_count, 16);
        assert_eq!(config.journal, Some(PathBuf::from("/var/log/fire.log")));
        assert_eq!(config.columns, 8);
        assert_eq!(config.grammar, "v1");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(MonitorConfig::parse("area_count = 0").is_err());
        assert!(MonitorConfig::parse("columns = 0").is_err());
        assert!(MonitorConfig::parse("timeout_ms = 0").is_err());
        assert!(MonitorConfig::parse("grammar = \"v9\"").is_err());
        assert!(MonitorConfig::parse("buffer_limit = 10").is_err());
        assert!(MonitorConfig::parse("unknown_key = 1").is_err());
    }

    #[test]
    fn test_generated_config_parses_back() {
        let config = MonitorConfig {
            port: Some("/dev/ttyUSB1".to_string()),
            ..MonitorConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(MonitorConfig::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "baud_rate = 115200").unwrap();

        let config = MonitorConfig::load(file.path()).unwrap();
        assert_eq!(config.baud_rate, 115200);

        assert!(MonitorConfig::load(Path::new("/nonexistent/fire-monitor.toml")).is_err());
    }

    #[test]
    fn test_ingest_settings() {
        let settings = MonitorConfig::default().ingest_settings().unwrap();
        assert_eq!(settings.grammar.id, "v1");
        assert_eq!(settings.buffer_limit, DEFAULT_BUFFER_LIMIT);
    }
}
