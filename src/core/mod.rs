mod config;
pub use config::{AppConfig, DEFAULT_TEMPERATURE};
