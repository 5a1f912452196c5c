use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use ah_chain_evm::EvmConfig;
use ah_marketplace_core::{DispatchConfig, LoaderConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderSettings {
    pub request_fanout_limit: usize,
    pub featured_hub_limit: usize,
    pub featured_product_limit: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        let defaults = LoaderConfig::default();
        Self {
            request_fanout_limit: defaults.request_fanout_limit,
            featured_hub_limit: defaults.featured_hub_limit,
            featured_product_limit: defaults.featured_product_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActionSettings {
    pub withdraw_delay_ms: u64,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            withdraw_delay_ms: 1500,
        }
    }
}

/// Service configuration: TOML file, then `AGRIHUB_*` environment, then validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen_addr: String,
    pub chain: EvmConfig,
    pub loader: LoaderSettings,
    pub actions: ActionSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            chain: EvmConfig::default(),
            loader: LoaderSettings::default(),
            actions: ActionSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Read the file named by `AGRIHUB_CONFIG` (defaults when unset), then overlay the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("AGRIHUB_CONFIG") {
            Ok(path) => Self::parse_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
        Ok(config)
    }

    fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(toml)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("AGRIHUB_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        self.chain.apply_overrides(lookup);
    }

    pub fn validate(&self) -> Result<(), String> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("listen_addr '{}' is invalid: {}", self.listen_addr, e))?;

        self.chain.validate()?;

        if self.loader.request_fanout_limit == 0 {
            return Err("request_fanout_limit must be > 0".to_string());
        }
        if self.loader.request_fanout_limit > 64 {
            return Err("request_fanout_limit too large (max 64)".to_string());
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listen_addr.parse()?)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            request_fanout_limit: self.loader.request_fanout_limit,
            featured_hub_limit: self.loader.featured_hub_limit,
            featured_product_limit: self.loader.featured_product_limit,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            withdraw_delay: Duration::from_millis(self.actions.withdraw_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
        assert_eq!(config.loader_config(), LoaderConfig::default());
        assert_eq!(
            config.dispatch_config().withdraw_delay,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn parses_sections_from_toml() {
        let config = ServiceConfig::from_toml_str(
            r#"
            listen_addr = "127.0.0.1:9000"

            [chain]
            rpc_url = "https://rpc.example.org"
            confirmation_blocks = 2

            [loader]
            request_fanout_limit = 16

            [actions]
            withdraw_delay_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.confirmation_blocks, 2);
        assert_eq!(config.loader.request_fanout_limit, 16);
        assert_eq!(config.loader.featured_hub_limit, 3);
        assert_eq!(config.actions.withdraw_delay_ms, 0);
    }

    #[test]
    fn rejects_out_of_range_fanout() {
        let result = ServiceConfig::from_toml_str("[loader]\nrequest_fanout_limit = 65\n");
        assert!(result.unwrap_err().to_string().contains("request_fanout_limit"));

        let result = ServiceConfig::from_toml_str("[loader]\nrequest_fanout_limit = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn environment_wins_over_file() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| match key {
            "AGRIHUB_LISTEN_ADDR" => Some("127.0.0.1:3000".to_owned()),
            "AGRIHUB_CONTRACT_ADDRESS" => {
                Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".to_owned())
            }
            _ => None,
        });
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(
            config.chain.contract_address,
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );

        config.listen_addr = "not-an-address".to_owned();
        assert!(config.validate().unwrap_err().contains("listen_addr"));
    }
}
