//! Known token table
//!
//! Token data is loaded from config/tokens.ron at startup and never changes
//! afterwards. Lookups are keyed by network id and case-insensitive symbol.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global token storage (loaded once at startup)
static TOKENS: OnceLock<TokenTable> = OnceLock::new();

/// Token info loaded from config
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub decimals: u8,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenConfigError {
    #[error("Config file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse token table: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    networks: HashMap<String, HashMap<String, TokenInfo>>,
}

impl TokenTable {
    pub fn from_ron_str(content: &str) -> Result<Self, TokenConfigError> {
        let raw: HashMap<String, HashMap<String, TokenInfo>> = ron::from_str(content)?;
        let networks = raw
            .into_iter()
            .map(|(network, tokens)| {
                let tokens = tokens
                    .into_iter()
                    .map(|(symbol, info)| (symbol.to_uppercase(), info))
                    .collect();
                (network, tokens)
            })
            .collect();
        Ok(TokenTable { networks })
    }

    pub fn lookup(&self, network_id: &str, symbol: &str) -> Option<&TokenInfo> {
        self.networks
            .get(network_id)
            .and_then(|tokens| tokens.get(&symbol.to_uppercase()))
    }

    pub fn symbols(&self, network_id: &str) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .networks
            .get(network_id)
            .map(|tokens| tokens.keys().cloned().collect())
            .unwrap_or_default();
        symbols.sort();
        symbols
    }

    pub fn networks(&self) -> Vec<&str> {
        let mut networks: Vec<&str> = self.networks.keys().map(|s| s.as_str()).collect();
        networks.sort();
        networks
    }

    pub fn len(&self) -> usize {
        self.networks.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read `tokens.ron` from `config_dir` without installing it globally
pub fn read_tokens(config_dir: &Path) -> Result<TokenTable, TokenConfigError> {
    let tokens_path = config_dir.join("tokens.ron");

    if !tokens_path.exists() {
        return Err(TokenConfigError::NotFound(tokens_path));
    }

    let content = std::fs::read_to_string(&tokens_path).map_err(|source| TokenConfigError::Read {
        path: tokens_path.clone(),
        source,
    })?;

    TokenTable::from_ron_str(&content)
}

/// Load tokens from config directory into the global table.
/// A second call after a successful load leaves the first table in place.
pub fn load_tokens(config_dir: &Path) -> Result<&'static TokenTable, TokenConfigError> {
    let table = read_tokens(config_dir)?;

    log::info!(
        "[tokens] Loaded {} tokens across {} networks from {:?}",
        table.len(),
        table.networks().len(),
        config_dir.join("tokens.ron")
    );

    Ok(TOKENS.get_or_init(|| table))
}

/// The global token table, if `load_tokens` has been called
pub fn tokens() -> Option<&'static TokenTable> {
    TOKENS.get()
}

/// Look up a token in the global table
pub fn lookup_token(network_id: &str, symbol: &str) -> Option<TokenInfo> {
    tokens().and_then(|t| t.lookup(network_id, symbol)).cloned()
}
