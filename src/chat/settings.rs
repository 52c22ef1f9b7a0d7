use serde::de::DeserializeOwned;
use serde_json::json;

use super::store::{
    API_KEY_KEY, BASE_URL_KEY, KvStore, MODEL_KEY, SYSTEM_PROMPT_KEY, TEMPERATURE_KEY,
};
use crate::core::{AppConfig, DEFAULT_TEMPERATURE};

/// Generation settings the client sends with every request.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub system_prompt: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub base_url: Option<String>,
}

fn load_key<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    serde_json::from_value(store.get(key)?).ok()
}

fn save_optional(store: &dyn KvStore, key: &str, value: &Option<String>) {
    match value {
        Some(value) => store.set(key, &json!(value)),
        None => store.remove(key),
    }
}

impl Settings {
    /// Settings for a fresh install. The credential and upstream are
    /// left unset so the relay's own defaults apply.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            system_prompt: config.system_message.clone(),
            api_key: None,
            model: config.openai_model.clone(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: None,
        }
    }

    /// Read settings from the store, falling back to `config` for any
    /// key that is missing or unreadable.
    pub fn load(store: &dyn KvStore, config: &AppConfig) -> Self {
        let defaults = Self::from_config(config);
        Self {
            system_prompt: load_key(store, SYSTEM_PROMPT_KEY).unwrap_or(defaults.system_prompt),
            api_key: load_key::<String>(store, API_KEY_KEY).filter(|k| !k.is_empty()),
            model: load_key(store, MODEL_KEY).unwrap_or(defaults.model),
            temperature: load_key(store, TEMPERATURE_KEY).unwrap_or(defaults.temperature),
            base_url: load_key::<String>(store, BASE_URL_KEY).filter(|u| !u.is_empty()),
        }
    }

    pub fn save(&self, store: &dyn KvStore) {
        store.set(SYSTEM_PROMPT_KEY, &json!(self.system_prompt));
        save_optional(store, API_KEY_KEY, &self.api_key);
        store.set(MODEL_KEY, &json!(self.model));
        store.set(TEMPERATURE_KEY, &json!(self.temperature));
        save_optional(store, BASE_URL_KEY, &self.base_url);
    }
}
