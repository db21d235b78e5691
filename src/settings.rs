//! Typed settings with explicit defaults.
//!
//! Settings live in a JSON file that older builds and hand edits may leave
//! partial. Each field is merged individually: a present, well-typed value
//! overrides the default, anything else keeps it. Unknown keys are ignored.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

/// Signed-in identity as known before the profile row has been read back.
/// `provisional` flips to false once the database row supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CurrentUser {
    pub(crate) user_id: String,
    pub(crate) display_name: String,
    pub(crate) provisional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    /// Signed-in user id; `None` means progress is never recorded.
    pub(crate) user_id: Option<String>,
    /// Display name for the profile row. Default: the user id.
    pub(crate) display_name: Option<String>,
    /// Native player binary. Default: `mpv`.
    pub(crate) player_bin: String,
    /// Start the next lesson automatically when one completes. Default: true.
    pub(crate) autoplay_next: bool,
    /// Remote catalog to sync from; `None` disables `sync`.
    pub(crate) catalog_url: Option<String>,
    /// UI label language, `en` or `ar`. Default: `en`.
    pub(crate) interface_language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_id: None,
            display_name: None,
            player_bin: "mpv".to_string(),
            autoplay_next: true,
            catalog_url: None,
            interface_language: "en".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with whatever the settings file provides. A missing
    /// file yields plain defaults; an unreadable one is an error.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings at {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("settings file {} is not valid JSON", path.display()))?;
        Ok(Self::default().merged_with(&value))
    }

    pub(crate) fn merged_with(mut self, value: &Value) -> Self {
        if let Some(user_id) = non_empty_string(value.get("user_id")) {
            self.user_id = Some(user_id);
        }
        if let Some(name) = non_empty_string(value.get("display_name")) {
            self.display_name = Some(name);
        }
        if let Some(bin) = non_empty_string(value.get("player_bin")) {
            self.player_bin = bin;
        }
        if let Some(autoplay) = value.get("autoplay_next").and_then(Value::as_bool) {
            self.autoplay_next = autoplay;
        }
        if let Some(url) = non_empty_string(value.get("catalog_url")) {
            self.catalog_url = Some(url);
        }
        if let Some(lang) = non_empty_string(value.get("interface_language")) {
            self.interface_language = lang;
        }
        self
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }
        let mut map = Map::new();
        if let Some(user_id) = &self.user_id {
            map.insert("user_id".to_string(), json!(user_id));
        }
        if let Some(name) = &self.display_name {
            map.insert("display_name".to_string(), json!(name));
        }
        map.insert("player_bin".to_string(), json!(self.player_bin));
        map.insert("autoplay_next".to_string(), json!(self.autoplay_next));
        if let Some(url) = &self.catalog_url {
            map.insert("catalog_url".to_string(), json!(url));
        }
        map.insert(
            "interface_language".to_string(),
            json!(self.interface_language),
        );
        let rendered = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(path, rendered)
            .with_context(|| format!("failed to write settings at {}", path.display()))?;
        Ok(())
    }

    /// Provisional identity, visible immediately. The environment wins over
    /// the settings file so a shared machine can switch users per shell.
    pub(crate) fn resolve_user(&self) -> Option<CurrentUser> {
        self.resolve_user_with_env(std::env::var("LESSONTRACK_USER").ok())
    }

    pub(crate) fn resolve_user_with_env(&self, env_value: Option<String>) -> Option<CurrentUser> {
        let from_env = env_value.filter(|value| !value.trim().is_empty());
        let user_id = from_env.or_else(|| self.user_id.clone())?;
        let display_name = self
            .display_name
            .clone()
            .unwrap_or_else(|| user_id.clone());
        Some(CurrentUser {
            user_id,
            display_name,
            provisional: true,
        })
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
