use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path};

use crate::shared::types::ProviderKind;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersCfg {
    pub changenow_api_key: Option<String>,
    pub stealthex_api_key: Option<String>,
    /// Provider used when a command does not name one
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreCfg {
    pub path: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "swapgate.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersCfg,
    #[serde(default)]
    pub store: StoreCfg,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config {}", path.as_ref().display()))?;
        let cfg: Self = toml::from_str(&s).context("parse config file")?;
        Ok(cfg)
    }

    /// Load the config file if given; environment variables win for API keys
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        if let Ok(key) = env::var("CHANGENOW_API_KEY") {
            cfg.providers.changenow_api_key = Some(key);
        }
        if let Ok(key) = env::var("STEALTHEX_API_KEY") {
            cfg.providers.stealthex_api_key = Some(key);
        }

        Ok(cfg)
    }

    /// Provider used when the CLI does not name one
    pub fn default_provider(&self) -> ProviderKind {
        self.providers
            .default
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(ProviderKind::ChangeNow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.store.path, "swapgate.db");
        assert_eq!(cfg.default_provider(), ProviderKind::ChangeNow);
    }

    #[test]
    fn test_parse_toml() {
        let cfg: Config = toml::from_str(
            r#"
[providers]
changenow_api_key = "cn-key"
default = "stealthex"

[store]
path = "/tmp/orders.db"
"#,
        )
        .unwrap();

        assert_eq!(cfg.providers.changenow_api_key.as_deref(), Some("cn-key"));
        assert_eq!(cfg.default_provider(), ProviderKind::StealthEx);
        assert_eq!(cfg.store.path, "/tmp/orders.db");
    }
}
