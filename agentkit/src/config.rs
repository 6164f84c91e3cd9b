use std::env;
use std::path::{Path, PathBuf};

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const RPC_URL: &str = "RPC_URL";
    pub const NETWORK_ID: &str = "NETWORK_ID";
    pub const CONFIG_DIR: &str = "AGENTKIT_CONFIG_DIR";
    pub const PYTH_HERMES_URL: &str = "PYTH_HERMES_URL";
    pub const POLYMARKET_GAMMA_URL: &str = "POLYMARKET_GAMMA_URL";
    // Optional gas overrides, e.g. "1.5"
    pub const GAS_LIMIT_MULTIPLIER: &str = "GAS_LIMIT_MULTIPLIER";
    pub const FEE_PER_GAS_MULTIPLIER: &str = "FEE_PER_GAS_MULTIPLIER";
}

/// Default values
pub mod defaults {
    pub const NETWORK_ID: &str = "base-sepolia";
    pub const RPC_URL: &str = "https://sepolia.base.org";
    pub const CONFIG_DIR: &str = "config";
    pub const PYTH_HERMES_URL: &str = "https://hermes.pyth.network";
    pub const POLYMARKET_GAMMA_URL: &str = "https://gamma-api.polymarket.com";
}

/// Public RPC endpoint for a known network, used when RPC_URL is unset
pub fn default_rpc_url(network_id: &str) -> &'static str {
    match network_id {
        "base-mainnet" => "https://mainnet.base.org",
        "ethereum-mainnet" => "https://eth.llamarpc.com",
        "ethereum-sepolia" => "https://rpc.sepolia.org",
        "arbitrum-mainnet" => "https://arb1.arbitrum.io/rpc",
        "optimism-mainnet" => "https://mainnet.optimism.io",
        "polygon-mainnet" => "https://polygon-rpc.com",
        _ => defaults::RPC_URL,
    }
}

/// Repo root (parent of the agentkit crate)
pub fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_dir.to_path_buf())
}

#[derive(Clone, Debug)]
pub struct Config {
    pub private_key: Option<String>,
    pub rpc_url: String,
    pub network_id: String,
    pub config_dir: PathBuf,
    pub pyth_hermes_url: String,
    pub polymarket_gamma_url: String,
    pub gas_limit_multiplier: Option<f64>,
    pub fee_per_gas_multiplier: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build from any key -> value source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let network_id = lookup(env_vars::NETWORK_ID).unwrap_or_else(|| defaults::NETWORK_ID.to_string());
        let rpc_url = lookup(env_vars::RPC_URL).unwrap_or_else(|| default_rpc_url(&network_id).to_string());
        let config_dir = lookup(env_vars::CONFIG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| repo_root().join(defaults::CONFIG_DIR));

        let parse_multiplier = |key: &str| {
            lookup(key).and_then(|v| match v.parse::<f64>() {
                Ok(m) if m > 0.0 => Some(m),
                _ => {
                    log::warn!("[config] Ignoring invalid {}: '{}'", key, v);
                    None
                }
            })
        };

        Self {
            private_key: lookup(env_vars::PRIVATE_KEY),
            rpc_url,
            network_id,
            config_dir,
            pyth_hermes_url: lookup(env_vars::PYTH_HERMES_URL)
                .unwrap_or_else(|| defaults::PYTH_HERMES_URL.to_string()),
            polymarket_gamma_url: lookup(env_vars::POLYMARKET_GAMMA_URL)
                .unwrap_or_else(|| defaults::POLYMARKET_GAMMA_URL.to_string()),
            gas_limit_multiplier: parse_multiplier(env_vars::GAS_LIMIT_MULTIPLIER),
            fee_per_gas_multiplier: parse_multiplier(env_vars::FEE_PER_GAS_MULTIPLIER),
        }
    }
}
