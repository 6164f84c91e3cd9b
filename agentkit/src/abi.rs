//! Contract ABI helpers shared by the action providers

use ethers::abi::{Function, Param, ParamType, StateMutability, Token};

use crate::wallet::WalletError;

/// Build a function fragment from positional parameter types
pub fn function(
    name: &str,
    inputs: Vec<ParamType>,
    outputs: Vec<ParamType>,
    state_mutability: StateMutability,
) -> Function {
    let params = |kinds: Vec<ParamType>| {
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| Param {
                name: format!("arg{}", i),
                kind,
                internal_type: None,
            })
            .collect()
    };

    #[allow(deprecated)]
    Function {
        name: name.to_string(),
        inputs: params(inputs),
        outputs: params(outputs),
        constant: None,
        state_mutability,
    }
}

/// ABI-encode a call, mapping failures to a wallet ABI error
pub fn encode_call(function: &Function, args: &[Token]) -> Result<Vec<u8>, WalletError> {
    function
        .encode_input(args)
        .map_err(|e| WalletError::Abi(format!("Failed to encode {}: {}", function.name, e)))
}

pub fn expect_uint(tokens: &[Token], what: &str) -> Result<ethers::types::U256, WalletError> {
    match tokens.first() {
        Some(Token::Uint(v)) => Ok(*v),
        other => Err(WalletError::Abi(format!("Unexpected {} output: {:?}", what, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    #[test]
    fn test_function_signature() {
        let transfer = function(
            "transfer",
            vec![ParamType::Address, ParamType::Uint(256)],
            vec![ParamType::Bool],
            StateMutability::NonPayable,
        );
        // 0xa9059cbb is the well-known ERC20 transfer selector
        assert_eq!(transfer.short_signature(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_expect_uint() {
        assert_eq!(expect_uint(&[Token::Uint(U256::from(5))], "x").unwrap(), U256::from(5));
        assert!(expect_uint(&[Token::Bool(true)], "x").is_err());
        assert!(expect_uint(&[], "x").is_err());
    }
}
