use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::persist::{read_json, write_json, PersistError};

// ── LLM provider types ──────────────────────────────────────────

/// Which chat-completion provider to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    Anthropic,
    OpenAiCompatible,
}

impl LlmProvider {
    /// Environment variable consulted when no credentials file exists.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAiCompatible => "OPENAI_API_KEY",
        }
    }
}

/// Full configuration for the chosen LLM provider.
///
/// The `api_key` field is never written to `settings.json`. It is stored in a
/// separate credentials file and loaded/saved via [`load_api_key`]/[`save_api_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub provider: LlmProvider,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL for OpenAI-compatible providers (ignored for Anthropic).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model override. None = use provider default.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAiCompatible,
            api_key: None,
            base_url: None,
            model: None,
        }
    }
}

/// Redacted view of the LLM config for display (no raw API key).
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfigInfo {
    pub provider: LlmProvider,
    pub has_api_key: bool,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl LlmConfigInfo {
    #[must_use]
    pub fn from_config(config: &LlmProviderConfig) -> Self {
        Self {
            provider: config.provider,
            has_api_key: config.api_key.as_ref().is_some_and(|k| !k.is_empty()),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }
}

// ── Bridge ───────────────────────────────────────────────────────

/// Where the Hue bridge lives and the username it issued at pairing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

// ── App settings ─────────────────────────────────────────────────

/// Application-level settings stored in the OS config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub version: u32,
    /// Display name for the assistant in chat output.
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub llm: LlmProviderConfig,
    /// Free-form facts about the household appended to the mission prompt.
    #[serde(default)]
    pub household_notes: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

const SETTINGS_VERSION: u32 = 1;

fn default_persona() -> String {
    "Assistant".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            persona: default_persona(),
            bridge: BridgeSettings::default(),
            llm: LlmProviderConfig::default(),
            household_notes: None,
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Settings as shown by `hue-chat settings`.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsInfo {
    pub persona: String,
    pub bridge: BridgeSettings,
    pub llm: LlmConfigInfo,
    pub household_notes: Option<String>,
    pub request_timeout_secs: u64,
}

impl SettingsInfo {
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            persona: settings.persona.clone(),
            bridge: settings.bridge.clone(),
            llm: LlmConfigInfo::from_config(&settings.llm),
            household_notes: settings.household_notes.clone(),
            request_timeout_secs: settings.request_timeout_secs,
        }
    }
}

/// Load the API key from the separate credentials file.
pub fn load_api_key(app_config_dir: &Path) -> Option<String> {
    let path = crate::paths::credentials_path(app_config_dir);
    std::fs::read_to_string(path)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Save the API key to the separate credentials file (atomic write).
pub fn save_api_key(app_config_dir: &Path, key: &str) -> Result<(), PersistError> {
    std::fs::create_dir_all(app_config_dir)?;
    let path = crate::paths::credentials_path(app_config_dir);
    if key.is_empty() {
        let _ = std::fs::remove_file(&path);
    } else {
        crate::persist::atomic_write(&path, key.as_bytes())?;
    }
    Ok(())
}

/// Load settings from the app config directory. Returns None if no settings file exists.
pub fn load_settings(app_config_dir: &Path) -> Result<Option<AppSettings>, PersistError> {
    let path = crate::paths::settings_path(app_config_dir);
    if !path.exists() {
        return Ok(None);
    }
    let mut settings = read_json::<AppSettings>(&path)?;
    settings.llm.api_key = load_api_key(app_config_dir);
    Ok(Some(settings))
}

/// Settings from disk, or defaults when none were saved yet. The API key
/// falls back to the provider's environment variable.
pub fn load_or_default(app_config_dir: &Path) -> Result<AppSettings, PersistError> {
    let mut settings = load_settings(app_config_dir)?.unwrap_or_default();
    if settings.llm.api_key.is_none() {
        settings.llm.api_key = load_api_key(app_config_dir).or_else(|| {
            std::env::var(settings.llm.provider.api_key_env_var())
                .ok()
                .filter(|k| !k.is_empty())
        });
    }
    Ok(settings)
}

/// Save settings to the app config directory.
pub fn save_settings(app_config_dir: &Path, settings: &AppSettings) -> Result<(), PersistError> {
    std::fs::create_dir_all(app_config_dir)?;
    write_json(&crate::paths::settings_path(app_config_dir), settings)
}
