use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arc_swap::ArcSwap;
use snafu::ResultExt;

use super::state::{SerializeSettingsSnafu, SettingsError, default_config_dir, write_atomically};

pub const PREFERENCES_FILE_NAME: &str = "preferences.json";
pub const SEARCH_ENABLED_KEY: &str = "ideasense.searchEnabled";

/// Small key/value store for UI preferences, kept apart from connection settings.
pub struct PreferenceStore {
    values: ArcSwap<BTreeMap<String, String>>,
    path: Option<PathBuf>,
}

impl PreferenceStore {
    pub fn default_path() -> PathBuf {
        default_config_dir().join(PREFERENCES_FILE_NAME)
    }

    pub fn new(path: PathBuf) -> Self {
        let values = Self::load_from_disk(&path);
        Self {
            values: ArcSwap::from_pointee(values),
            path: Some(path),
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_path())
    }

    /// Preferences that live only as long as the process.
    pub fn ephemeral() -> Self {
        Self {
            values: ArcSwap::from_pointee(BTreeMap::new()),
            path: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.load().get(key).cloned()
    }

    /// Updates the value in memory first, so a failed write still takes
    /// effect for the running session.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), SettingsError> {
        let value = value.into();
        self.values.rcu(|current| {
            let mut next = BTreeMap::clone(current);
            next.insert(key.to_string(), value.clone());
            next
        });
        self.persist()
    }

    pub fn search_enabled(&self) -> bool {
        self.get(SEARCH_ENABLED_KEY)
            .map(|raw| parse_stored_flag(&raw))
            .unwrap_or(true)
    }

    pub fn set_search_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.set(SEARCH_ENABLED_KEY, if enabled { "1" } else { "0" })
    }

    /// Returns the new value.
    pub fn toggle_search_enabled(&self) -> Result<bool, SettingsError> {
        let enabled = !self.search_enabled();
        self.set_search_enabled(enabled)?;
        Ok(enabled)
    }

    fn load_from_disk(path: &Path) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::info!("preferences file not found at {:?}, using defaults", path);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(values) => values,
            Err(error) => {
                tracing::warn!(
                    "failed to parse preferences from {:?}: {}. using defaults",
                    path,
                    error
                );
                BTreeMap::new()
            }
        }
    }

    fn persist(&self) -> Result<(), SettingsError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let values = self.values.load_full();
        let content = serde_json::to_string_pretty(values.as_ref()).context(
            SerializeSettingsSnafu {
                stage: "serialize-preferences-json",
            },
        )?;
        write_atomically(path, &content)?;

        tracing::debug!("saved preferences to {:?}", path);
        Ok(())
    }
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PreferenceStore")
            .field("values", &self.values.load_full())
            .field("path", &self.path)
            .finish()
    }
}

fn parse_stored_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_defaults_to_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join(PREFERENCES_FILE_NAME));
        assert!(store.search_enabled());
        assert!(PreferenceStore::ephemeral().search_enabled());
    }

    #[test]
    fn toggles_are_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE_NAME);
        let store = PreferenceStore::new(path.clone());

        assert!(!store.toggle_search_enabled().unwrap());
        assert_eq!(store.get(SEARCH_ENABLED_KEY).as_deref(), Some("0"));

        let reloaded = PreferenceStore::new(path.clone());
        assert!(!reloaded.search_enabled());
        assert!(reloaded.toggle_search_enabled().unwrap());
        assert!(PreferenceStore::new(path).search_enabled());
    }

    #[test]
    fn stored_values_are_read_leniently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE_NAME);
        std::fs::write(&path, r#"{ "ideasense.searchEnabled": " Yes " }"#).unwrap();
        assert!(PreferenceStore::new(path.clone()).search_enabled());

        std::fs::write(&path, r#"{ "ideasense.searchEnabled": "off" }"#).unwrap();
        assert!(!PreferenceStore::new(path.clone()).search_enabled());

        std::fs::write(&path, "[1, 2").unwrap();
        assert!(PreferenceStore::new(path).search_enabled());
    }
}
