//! Session configuration: mode, log path, and initial snapshot name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Process-wide record/replay mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Pass-through: no logging, no queuing.
    #[default]
    #[serde(alias = "off")]
    None,
    Record,
    #[serde(alias = "replay")]
    Play,
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Record => write!(f, "record"),
            Self::Play => write!(f, "play"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid icount rr option: {0}")]
    InvalidMode(String),
    #[error("rrfile option must be specified")]
    MissingFile,
    #[error("malformed option '{0}' (expected key=value)")]
    Malformed(String),
}

/// Configuration for a record/replay session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub mode: ReplayMode,
    /// Log file. Required unless `mode` is `None`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// VM snapshot taken (RECORD) or loaded (PLAY) before execution starts.
    #[serde(default)]
    pub snapshot: Option<String>,
}

impl ReplayConfig {
    pub fn record(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: ReplayMode::Record,
            path: Some(path.into()),
            snapshot: None,
        }
    }

    pub fn play(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: ReplayMode::Play,
            path: Some(path.into()),
            snapshot: None,
        }
    }

    /// Parse the icount option group, e.g. `shift=auto,rr=record,rrfile=vm.rr`.
    ///
    /// Keys other than `rr`, `rrfile` and `rrsnapshot` belong to the icount
    /// subsystem and are skipped.
    pub fn from_options(options: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for item in options.split(',').filter(|s| !s.is_empty()) {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| ConfigError::Malformed(item.to_string()))?;
            match key {
                "rr" => {
                    config.mode = match value {
                        "off" => ReplayMode::None,
                        "record" => ReplayMode::Record,
                        "replay" => ReplayMode::Play,
                        other => return Err(ConfigError::InvalidMode(other.to_string())),
                    }
                }
                "rrfile" => config.path = Some(PathBuf::from(value)),
                "rrsnapshot" => config.snapshot = Some(value.to_string()),
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode != ReplayMode::None && self.path.is_none() {
            return Err(ConfigError::MissingFile);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_record_options() {
        let config =
            ReplayConfig::from_options("shift=auto,rr=record,rrfile=vm.rr,rrsnapshot=init")
                .unwrap();
        assert_eq!(config.mode, ReplayMode::Record);
        assert_eq!(config.path, Some(PathBuf::from("vm.rr")));
        assert_eq!(config.snapshot.as_deref(), Some("init"));
    }

    #[test]
    fn parse_replay_and_off() {
        assert_eq!(
            ReplayConfig::from_options("rr=replay,rrfile=a").unwrap().mode,
            ReplayMode::Play
        );
        let off = ReplayConfig::from_options("rr=off").unwrap();
        assert_eq!(off.mode, ReplayMode::None);
        assert!(off.path.is_none());
    }

    #[test]
    fn missing_file_is_rejected() {
        assert_eq!(
            ReplayConfig::from_options("rr=record"),
            Err(ConfigError::MissingFile)
        );
    }

    #[test]
    fn bad_mode_and_malformed_item() {
        assert_eq!(
            ReplayConfig::from_options("rr=rewind,rrfile=a"),
            Err(ConfigError::InvalidMode("rewind".to_string()))
        );
        assert_eq!(
            ReplayConfig::from_options("rr"),
            Err(ConfigError::Malformed("rr".to_string()))
        );
    }

    #[test]
    fn deserialize_from_json() {
        let config: ReplayConfig =
            serde_json::from_str(r#"{"mode":"replay","path":"/tmp/vm.rr"}"#).unwrap();
        assert_eq!(config.mode, ReplayMode::Play);
        assert!(config.snapshot.is_none());

        let off: ReplayConfig = serde_json::from_str(r#"{"mode":"off"}"#).unwrap();
        assert_eq!(off, ReplayConfig::default());
    }
}
