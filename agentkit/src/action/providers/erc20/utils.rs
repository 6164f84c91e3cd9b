use ethers::abi::{Function, Token};
use ethers::types::{Address, U256};

use super::constants::*;
use crate::abi::encode_call;
use crate::amount::format_units;
use crate::tokens;
use crate::wallet::{parse_address, EvmWalletProvider, WalletError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDetails {
    pub name: String,
    pub decimals: u8,
    /// Raw balance of the queried owner
    pub balance: U256,
    pub formatted_balance: String,
}

fn multicall_address() -> Address {
    parse_address(MULTICALL3_ADDRESS).unwrap_or_default()
}

/// Run read-only calls against one target in a single aggregate3 round trip.
/// Each entry is `None` when that call reverted or returned malformed data.
pub async fn multicall(
    wallet: &dyn EvmWalletProvider,
    target: Address,
    calls: &[(&Function, Vec<Token>)],
) -> Result<Vec<Option<Vec<Token>>>, WalletError> {
    let mut encoded = Vec::with_capacity(calls.len());
    for (function, args) in calls {
        let data = encode_call(function, args)?;
        encoded.push(Token::Tuple(vec![
            Token::Address(target),
            Token::Bool(true),
            Token::Bytes(data),
        ]));
    }

    let output = wallet
        .read_contract(multicall_address(), &MULTICALL3_AGGREGATE3, &[Token::Array(encoded)])
        .await?;

    let results = match output.into_iter().next() {
        Some(Token::Array(results)) => results,
        other => return Err(WalletError::Abi(format!("Unexpected aggregate3 output: {:?}", other))),
    };
    if results.len() != calls.len() {
        return Err(WalletError::Abi(format!(
            "aggregate3 returned {} results for {} calls",
            results.len(),
            calls.len()
        )));
    }

    Ok(results
        .into_iter()
        .zip(calls)
        .map(|(result, (function, _))| match result {
            Token::Tuple(fields) => match fields.as_slice() {
                [Token::Bool(true), Token::Bytes(data)] => function.decode_output(data).ok(),
                _ => None,
            },
            _ => None,
        })
        .collect())
}

/// Name, decimals and balance of `owner` (wallet address when `None`).
/// `None` when the contract does not answer like an ERC20 token.
pub async fn get_token_details(
    wallet: &dyn EvmWalletProvider,
    contract: Address,
    owner: Option<Address>,
) -> Option<TokenDetails> {
    let owner = match owner {
        Some(o) => o,
        None => parse_address(&wallet.get_address()).ok()?,
    };

    let results = match multicall(
        wallet,
        contract,
        &[
            (&*ERC20_NAME, vec![]),
            (&*ERC20_DECIMALS, vec![]),
            (&*ERC20_BALANCE_OF, vec![Token::Address(owner)]),
        ],
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            log::warn!("[erc20] Token details multicall for {:?} failed: {}", contract, e);
            return None;
        }
    };

    let mut results = results.into_iter();
    let name = match results.next().flatten()?.into_iter().next()? {
        Token::String(s) => s,
        _ => return None,
    };
    let decimals = match results.next().flatten()?.into_iter().next()? {
        Token::Uint(d) if d <= U256::from(u8::MAX) => d.as_u32() as u8,
        _ => return None,
    };
    let balance = match results.next().flatten()?.into_iter().next()? {
        Token::Uint(b) => b,
        _ => return None,
    };

    Some(TokenDetails {
        formatted_balance: format_units(balance, decimals),
        name,
        decimals,
        balance,
    })
}

/// Accept a hex address or a symbol known for `network_id`
pub fn resolve_token_address(network_id: &str, token: &str) -> Result<Address, String> {
    if let Ok(address) = parse_address(token) {
        return Ok(address);
    }

    match tokens::lookup_token(network_id, token) {
        Some(info) => parse_address(&info.address)
            .map_err(|_| format!("Error: Token table has an invalid address for {}", token)),
        None => Err(format!(
            "Error: '{}' is neither a contract address nor a known token symbol on {}",
            token, network_id
        )),
    }
}
