use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub blacklist_apps: Vec<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: "YOUR_API_KEY".into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            blacklist_apps: Vec::new(),
        }
    }
}

impl AiSettings {
    /// True when requests can actually be sent: enabled and a real key.
    pub fn usable(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty() && !self.api_key.starts_with("YOUR")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    pub trigger_key: String,
    /// "double_press", "single_press" or "select_move".
    pub trigger_type: String,
    /// Max gap between presses for double-press detection, in milliseconds.
    pub trigger_interval: u64,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            trigger_key: "Ctrl".into(),
            trigger_type: "double_press".into(),
            trigger_interval: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    #[serde(default)]
    ai: AiSettings,
    #[serde(default)]
    hotkey: HotkeyConfig,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn ai(&self) -> AiSettings {
        self.data.read().unwrap().ai.clone()
    }

    pub fn hotkey(&self) -> HotkeyConfig {
        self.data.read().unwrap().hotkey.clone()
    }

    pub fn update_hotkey(&self, config: HotkeyConfig) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.hotkey = config;
        self.persist(&guard)
    }

    /// Replace the whole settings document from a raw JSON string.
    pub fn replace_raw(&self, raw: &str) -> Result<()> {
        let parsed: UserSettings =
            serde_json::from_str(raw).context("settings payload is not valid")?;
        let mut guard = self.data.write().unwrap();
        *guard = parsed;
        self.persist(&guard)
    }

    pub fn as_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.data.read().unwrap().clone())?)
    }

    /// Apps on the blacklist never get AI actions offered.
    pub fn is_blacklisted(&self, app_id: &str) -> bool {
        let app_lower = app_id.to_lowercase();
        self.data
            .read()
            .unwrap()
            .ai
            .blacklist_apps
            .iter()
            .any(|entry| {
                let entry_lower = entry.to_lowercase();
                entry_lower == app_lower || app_lower.contains(&entry_lower)
            })
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("store");
        (dir, store)
    }

    #[test]
    fn defaults_disable_ai() {
        let (_dir, store) = temp_settings();
        assert!(!store.ai().usable());
    }

    #[test]
    fn blacklist_matches_are_case_insensitive_and_partial() {
        let (_dir, store) = temp_settings();
        store
            .replace_raw(
                r#"{"ai": {"enabled": true, "api_key": "sk-test", "base_url": "https://x",
                     "model": "m", "blacklist_apps": ["KeePass"]},
                    "hotkey": {"trigger_key": "Ctrl", "trigger_type": "double_press", "trigger_interval": 400}}"#,
            )
            .expect("replace");

        assert!(store.is_blacklisted("keepass.exe"));
        assert!(store.is_blacklisted("KEEPASS"));
        assert!(!store.is_blacklisted("notepad.exe"));
    }

    #[test]
    fn hotkey_update_round_trips_through_disk() {
        let (dir, store) = temp_settings();
        store
            .update_hotkey(HotkeyConfig {
                trigger_key: "Shift".into(),
                trigger_type: "select_move".into(),
                trigger_interval: 250,
            })
            .expect("update");

        let reloaded = SettingsStore::new(dir.path().join("settings.json")).expect("reload");
        let hotkey = reloaded.hotkey();
        assert_eq!(hotkey.trigger_key, "Shift");
        assert_eq!(hotkey.trigger_type, "select_move");
        assert_eq!(hotkey.trigger_interval, 250);
    }
}
