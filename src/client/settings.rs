use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

/// Settings the client keeps between runs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(rename = "API_BASE", default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ClientSettings {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dress-up")
            .join("settings.json")
    }

    /// A missing file is an empty settings object; an unreadable one is logged
    /// and ignored.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return ClientSettings::default();
        }

        let raw = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read client settings at {}: {}", path.display(), err);
                return ClientSettings::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Failed to parse client settings at {}: {}", path.display(), err);
                ClientSettings::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved client settings to {}", path.display());
        Ok(())
    }

    /// Stores a new API base; blank clears the setting.
    pub fn set_api_base(&mut self, value: &str) -> Result<()> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.api_base = None;
            return Ok(());
        }
        let base = ApiBase::parse(trimmed)?;
        self.api_base = Some(base.as_str().to_string());
        Ok(())
    }
}

/// Where the proxy lives. Empty means "same origin as the client".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiBase(String);

impl ApiBase {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(ApiBase::default());
        }

        let url = Url::parse(trimmed).map_err(|err| anyhow!("Invalid API base URL {trimmed}: {err}"))?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(anyhow!(
                "API base URL must be an absolute http(s) URL: {trimmed}"
            ));
        }
        Ok(ApiBase(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Full URL for `endpoint`, using `local_origin` when the base is empty.
    pub fn endpoint_url(&self, endpoint: &str, local_origin: &str) -> String {
        let origin = if self.is_empty() {
            local_origin.trim_end_matches('/')
        } else {
            self.as_str()
        };
        format!("{}/{}", origin, endpoint.trim_start_matches('/'))
    }
}

/// First non-blank of: explicit override, persisted setting, environment.
pub fn resolve_api_base(
    override_value: Option<&str>,
    persisted: Option<&str>,
    environment: Option<&str>,
) -> Result<ApiBase> {
    let chosen = [override_value, persisted, environment]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default();
    ApiBase::parse(chosen)
}
