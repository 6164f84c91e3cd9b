//! Network descriptors
//!
//! A wallet reports the network it is connected to; action providers use it
//! to decide whether their actions are available.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Blockchain protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProtocolFamily {
    Evm,
    Solana,
}

/// Static facts about a well-known EVM network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownNetwork {
    pub network_id: &'static str,
    pub chain_id: u64,
    pub native_currency: &'static str,
    pub explorer_url: &'static str,
}

pub const BASE_MAINNET: &str = "base-mainnet";
pub const BASE_SEPOLIA: &str = "base-sepolia";
pub const ETHEREUM_MAINNET: &str = "ethereum-mainnet";
pub const ETHEREUM_SEPOLIA: &str = "ethereum-sepolia";
pub const ARBITRUM_MAINNET: &str = "arbitrum-mainnet";
pub const OPTIMISM_MAINNET: &str = "optimism-mainnet";
pub const POLYGON_MAINNET: &str = "polygon-mainnet";

const KNOWN_NETWORKS: &[KnownNetwork] = &[
    KnownNetwork {
        network_id: BASE_MAINNET,
        chain_id: 8453,
        native_currency: "ETH",
        explorer_url: "https://basescan.org",
    },
    KnownNetwork {
        network_id: BASE_SEPOLIA,
        chain_id: 84532,
        native_currency: "ETH",
        explorer_url: "https://sepolia.basescan.org",
    },
    KnownNetwork {
        network_id: ETHEREUM_MAINNET,
        chain_id: 1,
        native_currency: "ETH",
        explorer_url: "https://etherscan.io",
    },
    KnownNetwork {
        network_id: ETHEREUM_SEPOLIA,
        chain_id: 11155111,
        native_currency: "ETH",
        explorer_url: "https://sepolia.etherscan.io",
    },
    KnownNetwork {
        network_id: ARBITRUM_MAINNET,
        chain_id: 42161,
        native_currency: "ETH",
        explorer_url: "https://arbiscan.io",
    },
    KnownNetwork {
        network_id: OPTIMISM_MAINNET,
        chain_id: 10,
        native_currency: "ETH",
        explorer_url: "https://optimistic.etherscan.io",
    },
    KnownNetwork {
        network_id: POLYGON_MAINNET,
        chain_id: 137,
        native_currency: "POL",
        explorer_url: "https://polygonscan.com",
    },
];

pub fn known_networks() -> &'static [KnownNetwork] {
    KNOWN_NETWORKS
}

pub fn known_network(network_id: &str) -> Option<&'static KnownNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.network_id == network_id)
}

pub fn known_network_by_chain_id(chain_id: u64) -> Option<&'static KnownNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// The network a wallet is connected to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub protocol_family: ProtocolFamily,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl Network {
    pub fn new(protocol_family: ProtocolFamily, network_id: Option<&str>, chain_id: Option<u64>) -> Self {
        Network {
            protocol_family,
            network_id: network_id.map(|s| s.to_string()),
            chain_id,
        }
    }

    /// EVM network from a known id such as "base-mainnet"
    pub fn from_network_id(network_id: &str) -> Option<Self> {
        known_network(network_id).map(|known| Network {
            protocol_family: ProtocolFamily::Evm,
            network_id: Some(known.network_id.to_string()),
            chain_id: Some(known.chain_id),
        })
    }

    /// EVM network from a chain id; the id is filled in when the chain is known
    pub fn from_chain_id(chain_id: u64) -> Self {
        Network {
            protocol_family: ProtocolFamily::Evm,
            network_id: known_network_by_chain_id(chain_id).map(|n| n.network_id.to_string()),
            chain_id: Some(chain_id),
        }
    }

    pub fn supports_evm(&self) -> bool {
        self.protocol_family == ProtocolFamily::Evm
    }

    pub fn network_id_str(&self) -> &str {
        self.network_id.as_deref().unwrap_or("unknown")
    }

    /// True when this is an EVM network whose id is in `ids`
    pub fn is_evm_network_in(&self, ids: &[&str]) -> bool {
        self.supports_evm()
            && self
                .network_id
                .as_deref()
                .map(|id| ids.contains(&id))
                .unwrap_or(false)
    }

    pub fn native_currency(&self) -> &'static str {
        self.network_id
            .as_deref()
            .and_then(known_network)
            .map(|n| n.native_currency)
            .unwrap_or("ETH")
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.network_id, self.chain_id) {
            (Some(id), Some(chain)) => write!(f, "{} ({}, chain {})", id, self.protocol_family, chain),
            (Some(id), None) => write!(f, "{} ({})", id, self.protocol_family),
            (None, Some(chain)) => write!(f, "chain {} ({})", chain, self.protocol_family),
            (None, None) => write!(f, "{}", self.protocol_family),
        }
    }
}
