use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Combination that toggles recording, e.g. "ctrl+shift+r".
    #[serde(default = "default_toggle_hotkey")]
    pub toggle_hotkey: String,
    /// Combination that cancels an in-flight pipeline.
    #[serde(default = "default_cancel_hotkey")]
    pub cancel_hotkey: String,
    #[serde(default = "default_timer_tick_ms")]
    pub timer_tick_ms: u64,
    /// Register the combinations with the OS. Off by default so the shell
    /// also runs where no display server is available.
    #[serde(default)]
    pub global_hotkeys: bool,
}

fn default_toggle_hotkey() -> String {
    "ctrl+shift+r".to_string()
}

fn default_cancel_hotkey() -> String {
    "ctrl+shift+x".to_string()
}

fn default_timer_tick_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toggle_hotkey: default_toggle_hotkey(),
            cancel_hotkey: default_cancel_hotkey(),
            timer_tick_ms: default_timer_tick_ms(),
            global_hotkeys: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".voxbridge")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}
