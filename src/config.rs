use std::env;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

pub const DEFAULT_COMPOSITE_ENDPOINT: &str = "/api/gemini-dress";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: String,
    pub host: String,
    pub port: u16,
    pub composite_endpoint: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_image_model: String,
    pub gemini_timeout_seconds: u64,
    pub max_body_bytes: usize,
    pub api_base: String,
    pub ui_language: String,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_port(name: &str, default: u16) -> u16 {
    match env::var(name) {
        Ok(value) => match value.trim().parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                warn!("Invalid {} value '{}'; using {}.", name, value, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn normalize_endpoint(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_COMPOSITE_ENDPOINT.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn normalize_ui_language(value: String) -> String {
    let lowered = value.trim().to_lowercase();
    match lowered.as_str() {
        "ko" | "en" => lowered,
        "" => "ko".to_string(),
        _ => {
            warn!("Unknown UI_LANGUAGE value '{}'; defaulting to ko.", value);
            "ko".to_string()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: env_string("LOG_DIR", "logs"),
            host: env_string("HOST", "0.0.0.0"),
            port: env_port("PORT", 3000),
            composite_endpoint: normalize_endpoint(env_string(
                "COMPOSITE_ENDPOINT",
                DEFAULT_COMPOSITE_ENDPOINT,
            )),
            gemini_api_key: env_string("GEMINI_API_KEY", "").trim().to_string(),
            gemini_api_base: env_string("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE)
                .trim()
                .trim_end_matches('/')
                .to_string(),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", DEFAULT_GEMINI_IMAGE_MODEL),
            gemini_timeout_seconds: env_u64("GEMINI_TIMEOUT_SECONDS", 90).max(1),
            max_body_bytes: env_usize("MAX_BODY_BYTES", 16 * 1024 * 1024),
            api_base: env_string("API_BASE", "").trim().to_string(),
            ui_language: normalize_ui_language(env_string("UI_LANGUAGE", "ko")),
        })
    }

    /// The provider credential, if one is configured.
    pub fn gemini_api_key(&self) -> Option<&str> {
        let key = self.gemini_api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            composite_endpoint: DEFAULT_COMPOSITE_ENDPOINT.to_string(),
            gemini_api_key: String::new(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            gemini_image_model: DEFAULT_GEMINI_IMAGE_MODEL.to_string(),
            gemini_timeout_seconds: 90,
            max_body_bytes: 16 * 1024 * 1024,
            api_base: String::new(),
            ui_language: "ko".to_string(),
        }
    }
}

pub const COMPOSITOR_INSTRUCTION: &str =
    "You are an expert image compositor. Combine the provided character and clothing images.";
