use crate::error::{Error, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, str::FromStr, time::Duration};

pub const DEFAULT_RECEIPT_TIMEOUT: u64 = 300;
pub const DEFAULT_PROXY_CHECK_ATTEMPTS: u32 = 20;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkName {
    #[display(fmt = "ETH")]
    Eth,
    #[display(fmt = "Scroll")]
    Scroll,
}

impl FromStr for NetworkName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "eth" | "ethereum" => Ok(Self::Eth),
            "scroll" => Ok(Self::Scroll),
            other => Err(Error::Config(format!("unknown network \"{}\"", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub name: NetworkName,
    pub title: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,
    /// Fee ceiling in gwei, `None` means any price is accepted.
    pub max_gwei: Option<f64>,
    /// Chain id understood by the Rabby gas market.
    pub rabby_id: Option<String>,
}

impl Network {
    pub fn builtin(name: NetworkName) -> Self {
        match name {
            NetworkName::Eth => Network {
                name,
                title: "Ethereum Mainnet".to_string(),
                chain_id: 1,
                rpc_url: "https://rpc.ankr.com/eth".to_string(),
                explorer_url: "https://etherscan.io/tx/".to_string(),
                max_gwei: None,
                rabby_id: Some("eth".to_string()),
            },
            NetworkName::Scroll => Network {
                name,
                title: "Scroll".to_string(),
                chain_id: 534352,
                rpc_url: "https://rpc.ankr.com/scroll".to_string(),
                explorer_url: "https://scrollscan.com/tx/".to_string(),
                max_gwei: None,
                rabby_id: Some("scrl".to_string()),
            },
        }
    }

    pub fn tx_link(&self, hash: &web3::types::H256) -> String {
        format!("{}{:?}", self.explorer_url, hash)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (ID: {})", self.title, self.chain_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NetworkOverride {
    pub rpc: Option<String>,
    pub max_gwei: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default = "default_telegram_level")]
    pub log_level: String,
}

fn default_telegram_level() -> String {
    "info".to_string()
}

impl TelegramConfig {
    /// `Ok(None)` when the mirror is switched off.
    pub fn validated(&self) -> Result<Option<&Self>> {
        match (self.token.is_empty(), self.chat_id == 0) {
            (true, true) => Ok(None),
            (false, false) => Ok(Some(self)),
            (false, true) => Err(Error::Config("telegram chat_id is missing".to_string())),
            (true, false) => Err(Error::Config("telegram token is missing".to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub accounts: String,
    pub checkpoint: String,
    pub receipt_timeout: u64,
    pub proxy_check_attempts: u32,
    pub networks: HashMap<String, NetworkOverride>,
    pub telegram: Option<TelegramConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            accounts: "accounts.csv".to_string(),
            checkpoint: "last_state.json".to_string(),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            proxy_check_attempts: DEFAULT_PROXY_CHECK_ATTEMPTS,
            networks: HashMap::new(),
            telegram: None,
        }
    }
}

impl Config {
    pub fn parse_from_file(file: &Path) -> Result<Self> {
        let confstr = std::fs::read_to_string(file)?;
        Self::parse(&confstr)
    }

    /// A missing file is not an error, every field has a default.
    pub fn load_or_default(file: &Path) -> Result<Self> {
        if file.exists() {
            Self::parse_from_file(file)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(confstr: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(confstr)?;
        for name in config.networks.keys() {
            NetworkName::from_str(name)?;
        }
        if let Some(tg) = &config.telegram {
            tg.validated()?;
        }
        Ok(config)
    }

    pub fn network(&self, name: NetworkName) -> Network {
        let mut network = Network::builtin(name);
        let found = self
            .networks
            .iter()
            .find(|(k, _)| NetworkName::from_str(k).ok() == Some(name))
            .map(|(_, v)| v);
        if let Some(o) = found {
            if let Some(rpc) = &o.rpc {
                network.rpc_url = rpc.clone();
            }
            network.max_gwei = o.max_gwei;
        }
        network
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout)
    }

    pub fn show() -> Result<String> {
        let de: Self = Default::default();
        Ok(serde_json::to_string_pretty(&de)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_to_builtin_networks() {
        let config = Config::parse(
            r#"{"networks": {"scroll": {"rpc": "http://localhost:8545", "max_gwei": 0.5}}}"#,
        )
        .unwrap();
        let scroll = config.network(NetworkName::Scroll);
        assert_eq!(scroll.rpc_url, "http://localhost:8545");
        assert_eq!(scroll.max_gwei, Some(0.5));
        assert_eq!(scroll.chain_id, 534352);
        assert_eq!(config.checkpoint, "last_state.json");

        let eth = config.network(NetworkName::Eth);
        assert_eq!(eth.rpc_url, "https://rpc.ankr.com/eth");
        assert_eq!(eth.max_gwei, None);
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!(matches!(
            Config::parse(r#"{"networks": {"zksync": {}}}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn half_configured_telegram_is_rejected() {
        let err = Config::parse(r#"{"telegram": {"token": "abc"}}"#).unwrap_err();
        assert!(err.to_string().contains("chat_id"));
        let ok = Config::parse(r#"{"telegram": {"token": "", "chat_id": 0}}"#).unwrap();
        assert!(ok.telegram.unwrap().validated().unwrap().is_none());
    }
}
