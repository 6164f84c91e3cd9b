//! Blockchain action providers for AI agents
//!
//! A wallet ([`wallet::WalletProvider`]) plus a set of action providers make up
//! an [`action::AgentKit`]. Each action takes JSON parameters and returns an
//! [`action::ActionResult`] an agent runtime can show to a model.

pub mod abi;
pub mod action;
pub mod amount;
pub mod config;
pub mod http;
pub mod network;
pub mod retry;
pub mod tokens;
pub mod wallet;
pub mod x402;
