pub mod preferences;
pub mod state;

pub use preferences::{PREFERENCES_FILE_NAME, PreferenceStore, SEARCH_ENABLED_KEY};
pub use state::{
    ChatSettings, DEFAULT_API_BASE_URL, ENV_PREFIX, SETTINGS_FILE_NAME, SettingsError,
    SettingsStore, default_config_dir,
};
