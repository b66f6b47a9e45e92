use crate::constants::*;
use crate::error::Result;
use crate::relay::ReconnectPolicy;
use crate::schedule::Delays;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Runtime settings. Every field has a default, so a config file only needs the keys it changes.

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MelleeConfig {
    pub data_dir: PathBuf,
    pub game_ws_prefix: String,
    pub lobby_ws_url: String,
    pub heartbeat_secs: u64,
    pub lobby_stale_ms: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_max_attempts: u32,
    pub combat_lead_ms: u64,
    pub round_display_ms: u64,
    pub timeout_display_ms: u64,
    pub seed: Option<u64>,
}

impl Default for MelleeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".emoji-mellee"),
            game_ws_prefix: GAME_WS_URL_PREFIX.to_string(),
            lobby_ws_url: LOBBY_WS_URL.to_string(),
            heartbeat_secs: HEARTBEAT_SECS,
            lobby_stale_ms: LOBBY_STALE_MS,
            reconnect_base_ms: RECONNECT_BASE_MS,
            reconnect_max_ms: RECONNECT_MAX_MS,
            reconnect_max_attempts: RECONNECT_MAX_ATTEMPTS,
            combat_lead_ms: COMBAT_LEAD_MS,
            round_display_ms: ROUND_DISPLAY_MS,
            timeout_display_ms: TIMEOUT_DISPLAY_MS,
            seed: None,
        }
    }
}

impl MelleeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base: Duration::from_millis(self.reconnect_base_ms),
            max: Duration::from_millis(self.reconnect_max_ms),
            max_attempts: self.reconnect_max_attempts,
        }
    }

    pub fn delays(&self) -> Delays {
        Delays {
            tick: Duration::from_millis(TICK_MS),
            combat_lead: Duration::from_millis(self.combat_lead_ms),
            round_display: Duration::from_millis(self.round_display_ms),
            timeout_display: Duration::from_millis(self.timeout_display_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"heartbeatSecs": 10, "seed": 99}}"#).unwrap();
        let config = MelleeConfig::load(file.path()).unwrap();
        assert_eq!(config.heartbeat(), Duration::from_secs(10));
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.lobby_ws_url, LOBBY_WS_URL);
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.delays(), Delays::default());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MelleeConfig::load(&dir.path().join("absent.json")).is_err());
        assert!(MelleeConfig::load_or_default(None).is_ok());
    }
}
