use std::env;
use std::fmt::{self, Debug};

/// Sampling temperature used when a request doesn't specify one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Process-wide defaults for the relay. Built once at startup and
/// handed to the server so that handlers never read the environment
/// directly.
#[derive(Clone)]
pub struct AppConfig {
    pub openai_api_hostname: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub system_message: String,
    pub storage_path: String,
    pub static_dir: String,
    // Path the API routes are nested under. Requests that ask for a
    // `baseUrl` under this prefix are pointed back at the default
    // upstream instead of themselves.
    pub mount_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("CHATRELAY_STORAGE_PATH").unwrap_or("./".to_string());
        let static_dir = env::var("CHATRELAY_STATIC_DIR").unwrap_or("./web-ui".to_string());
        let openai_api_hostname = env::var("CHATRELAY_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        // An empty key is the same as no key at all
        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let openai_model =
            env::var("CHATRELAY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let system_message = env::var("CHATRELAY_SYSTEM_MESSAGE")
            .unwrap_or_else(|_| "You are a helpful assistant.".to_string());

        Self {
            openai_api_hostname,
            openai_api_key,
            openai_model,
            system_message,
            storage_path,
            static_dir,
            mount_prefix: "/api".to_string(),
        }
    }
}

impl Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("openai_api_hostname", &self.openai_api_hostname)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openai_model", &self.openai_model)
            .field("system_message", &self.system_message)
            .field("storage_path", &self.storage_path)
            .field("static_dir", &self.static_dir)
            .field("mount_prefix", &self.mount_prefix)
            .finish()
    }
}
