use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::limits::DEFAULT_LOCK_RETRIES;

/// Engine settings. Every field has a default, so a partial JSON document or
/// a bare environment both produce a usable config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// Journal file name inside `data_dir`. `None` runs purely in memory.
    pub journal: Option<String>,
    /// Appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    pub compact_interval_secs: u64,
    pub lock_retries: u32,
    pub journal_channel_capacity: usize,
    pub metrics_port: Option<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            journal: Some("confbook.journal".into()),
            compact_threshold: 1000,
            compact_interval_secs: 30,
            lock_retries: DEFAULT_LOCK_RETRIES,
            journal_channel_capacity: 4096,
            metrics_port: None,
        }
    }
}

impl EngineConfig {
    /// No journal, defaults everywhere else.
    pub fn in_memory() -> Self {
        Self {
            journal: None,
            ..Self::default()
        }
    }

    /// Reads `CONFBOOK_*` variables; unset or unparsable ones keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let journal = match std::env::var("CONFBOOK_JOURNAL") {
            Ok(name) if name.is_empty() || name == "none" => None,
            Ok(name) => Some(name),
            Err(_) => defaults.journal,
        };
        Self {
            data_dir: std::env::var("CONFBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            journal,
            compact_threshold: env_or("CONFBOOK_COMPACT_THRESHOLD", defaults.compact_threshold),
            compact_interval_secs: env_or(
                "CONFBOOK_COMPACT_INTERVAL_SECS",
                defaults.compact_interval_secs,
            ),
            lock_retries: env_or("CONFBOOK_LOCK_RETRIES", defaults.lock_retries),
            journal_channel_capacity: env_or(
                "CONFBOOK_JOURNAL_CHANNEL_CAPACITY",
                defaults.journal_channel_capacity,
            ),
            metrics_port: std::env::var("CONFBOOK_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn journal_path(&self) -> Option<PathBuf> {
        self.journal.as_ref().map(|name| self.data_dir.join(name))
    }

    pub fn compact_interval(&self) -> Duration {
        Duration::from_secs(self.compact_interval_secs.max(1))
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(r#"{"data_dir": "/var/lib/confbook", "lock_retries": 3}"#)
            .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/confbook"));
        assert_eq!(cfg.lock_retries, 3);
        assert_eq!(cfg.compact_threshold, 1000);
        assert_eq!(
            cfg.journal_path(),
            Some(PathBuf::from("/var/lib/confbook/confbook.journal"))
        );
    }

    #[test]
    fn null_journal_means_in_memory() {
        let cfg = EngineConfig::from_json(r#"{"journal": null}"#).unwrap();
        assert_eq!(cfg.journal_path(), None);
        assert_eq!(EngineConfig::in_memory().journal_path(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(EngineConfig::from_json(r#"{"lock_retries": "many"}"#).is_err());
    }

    #[test]
    fn compact_interval_never_zero() {
        let cfg = EngineConfig {
            compact_interval_secs: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.compact_interval(), Duration::from_secs(1));
    }
}
