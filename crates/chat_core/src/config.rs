use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;
use shared::protocol::RequestShape;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "chat.toml";
pub const DEFAULT_GREETING: &str = "I'm ready. How can I help?";

/// Read-only session settings handed to the controller at construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub greeting: String,
    /// Pinned request body shape; inferred from the endpoint path when unset.
    pub request_shape: Option<RequestShape>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/chat".into(),
            model: "llama3".into(),
            api_key: None,
            greeting: DEFAULT_GREETING.into(),
            request_shape: None,
        }
    }
}

impl ChatConfig {
    pub fn request_shape(&self) -> RequestShape {
        if let Some(shape) = self.request_shape {
            return shape;
        }
        match Url::parse(&self.endpoint) {
            Ok(url) => RequestShape::infer_from_path(url.path()),
            Err(_) => RequestShape::infer_from_path(&self.endpoint),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(self.endpoint.trim())
            .with_context(|| format!("invalid inference endpoint '{}'", self.endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "inference endpoint '{}' must use http or https, got '{}'",
                self.endpoint,
                url.scheme()
            );
        }
        if self.model.trim().is_empty() {
            bail!("model identifier must not be empty");
        }
        Ok(())
    }
}

/// Layered config, validated. Callers that apply further overrides use
/// [`load_layered`] and call [`ChatConfig::validate`] themselves.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ChatConfig> {
    let config = load_layered(path)?;
    config.validate()?;
    Ok(config)
}

/// Loads defaults, then `path` (or `chat.toml` when present), then environment overrides.
pub fn load_layered(path: Option<&Path>) -> anyhow::Result<ChatConfig> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_config_file(&default_path)?
            } else {
                ChatConfig::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn read_config_file(path: &Path) -> anyhow::Result<ChatConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_config(&raw).with_context(|| format!("failed to parse config file '{}'", path.display()))
}

pub fn parse_config(raw: &str) -> anyhow::Result<ChatConfig> {
    Ok(toml::from_str(raw)?)
}

/// Applies `CHAT_*` variables, then their `APP__*` aliases, through `lookup`.
pub fn apply_env_overrides(
    config: &mut ChatConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let var = |name: &str| {
        lookup(&format!("APP__{name}")).or_else(|| lookup(&format!("CHAT_{name}")))
    };

    if let Some(v) = var("ENDPOINT") {
        config.endpoint = v;
    }
    if let Some(v) = var("MODEL") {
        config.model = v;
    }
    if let Some(v) = var("API_KEY") {
        config.api_key = (!v.trim().is_empty()).then_some(v);
    }
    if let Some(v) = var("GREETING") {
        config.greeting = v;
    }
    if let Some(v) = var("REQUEST_SHAPE") {
        let shape = v
            .parse::<RequestShape>()
            .context("invalid request shape override")?;
        config.request_shape = Some(shape);
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
