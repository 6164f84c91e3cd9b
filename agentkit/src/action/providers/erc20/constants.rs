use ethers::abi::{Function, ParamType, StateMutability};
use once_cell::sync::Lazy;

use crate::abi::function;

/// Multicall3, deployed at the same address on every supported chain
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

pub static ERC20_NAME: Lazy<Function> =
    Lazy::new(|| function("name", vec![], vec![ParamType::String], StateMutability::View));

pub static ERC20_DECIMALS: Lazy<Function> =
    Lazy::new(|| function("decimals", vec![], vec![ParamType::Uint(8)], StateMutability::View));

pub static ERC20_BALANCE_OF: Lazy<Function> = Lazy::new(|| {
    function(
        "balanceOf",
        vec![ParamType::Address],
        vec![ParamType::Uint(256)],
        StateMutability::View,
    )
});

pub static ERC20_TRANSFER: Lazy<Function> = Lazy::new(|| {
    function(
        "transfer",
        vec![ParamType::Address, ParamType::Uint(256)],
        vec![ParamType::Bool],
        StateMutability::NonPayable,
    )
});

pub static ERC20_APPROVE: Lazy<Function> = Lazy::new(|| {
    function(
        "approve",
        vec![ParamType::Address, ParamType::Uint(256)],
        vec![ParamType::Bool],
        StateMutability::NonPayable,
    )
});

pub static ERC20_ALLOWANCE: Lazy<Function> = Lazy::new(|| {
    function(
        "allowance",
        vec![ParamType::Address, ParamType::Address],
        vec![ParamType::Uint(256)],
        StateMutability::View,
    )
});

/// aggregate3((address target, bool allowFailure, bytes callData)[]) returns ((bool success, bytes returnData)[])
pub static MULTICALL3_AGGREGATE3: Lazy<Function> = Lazy::new(|| {
    function(
        "aggregate3",
        vec![ParamType::Array(Box::new(ParamType::Tuple(vec![
            ParamType::Address,
            ParamType::Bool,
            ParamType::Bytes,
        ])))],
        vec![ParamType::Array(Box::new(ParamType::Tuple(vec![
            ParamType::Bool,
            ParamType::Bytes,
        ])))],
        StateMutability::Payable,
    )
});
