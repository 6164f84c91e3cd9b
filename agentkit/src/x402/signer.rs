//! EIP-3009 TransferWithAuthorization signing for the `exact` scheme

use ethers::abi::{encode, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use rand::RngCore;

use super::types::*;
use crate::wallet::{format_address, parse_address, EvmWalletProvider};

const DOMAIN_TYPE: &[u8] = b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const TRANSFER_WITH_AUTHORIZATION_TYPE: &[u8] =
    b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn separator(&self) -> H256 {
        H256::from(keccak256(encode(&[
            Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
            Token::FixedBytes(keccak256(self.name.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(self.version.as_bytes()).to_vec()),
            Token::Uint(U256::from(self.chain_id)),
            Token::Address(self.verifying_contract),
        ])))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferWithAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: H256,
}

impl TransferWithAuthorization {
    pub fn struct_hash(&self) -> H256 {
        H256::from(keccak256(encode(&[
            Token::FixedBytes(keccak256(TRANSFER_WITH_AUTHORIZATION_TYPE).to_vec()),
            Token::Address(self.from),
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::Uint(self.valid_after),
            Token::Uint(self.valid_before),
            Token::FixedBytes(self.nonce.as_bytes().to_vec()),
        ])))
    }

    /// keccak256("\x19\x01" ++ domainSeparator ++ structHash)
    pub fn digest(&self, domain: &Eip712Domain) -> H256 {
        let mut preimage = Vec::with_capacity(66);
        preimage.extend_from_slice(&[0x19, 0x01]);
        preimage.extend_from_slice(domain.separator().as_bytes());
        preimage.extend_from_slice(self.struct_hash().as_bytes());
        H256::from(keccak256(preimage))
    }
}

pub fn random_nonce() -> H256 {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    H256::from(bytes)
}

/// EIP-712 domain of the asset named by `requirements`
pub fn domain_for(requirements: &PaymentRequirements) -> Result<Eip712Domain, X402Error> {
    let chain_id = chain_id_for_network(&requirements.network)
        .ok_or_else(|| X402Error::InvalidRequirements(format!("unknown network {}", requirements.network)))?;
    let verifying_contract = parse_address(&requirements.asset)
        .map_err(|_| X402Error::InvalidRequirements(format!("invalid asset address {}", requirements.asset)))?;
    Ok(Eip712Domain {
        name: requirements.token_name().to_string(),
        version: requirements.token_version().to_string(),
        chain_id,
        verifying_contract,
    })
}

/// Sign an `exact` payment valid from now for the requirement's timeout
pub async fn sign_exact_payment(
    wallet: &dyn EvmWalletProvider,
    requirements: &PaymentRequirements,
) -> Result<PaymentPayload, X402Error> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    sign_exact_payment_at(wallet, requirements, now, random_nonce()).await
}

pub async fn sign_exact_payment_at(
    wallet: &dyn EvmWalletProvider,
    requirements: &PaymentRequirements,
    now: u64,
    nonce: H256,
) -> Result<PaymentPayload, X402Error> {
    if requirements.scheme != EXACT_SCHEME {
        return Err(X402Error::UnsupportedScheme(requirements.scheme.clone()));
    }

    let domain = domain_for(requirements)?;
    let from = parse_address(&wallet.get_address()).map_err(|e| X402Error::Signing(e.to_string()))?;
    let to = parse_address(&requirements.pay_to)
        .map_err(|_| X402Error::InvalidRequirements(format!("invalid payTo address {}", requirements.pay_to)))?;
    let value = U256::from_dec_str(&requirements.max_amount_required).map_err(|_| {
        X402Error::InvalidRequirements(format!("invalid maxAmountRequired {}", requirements.max_amount_required))
    })?;
    let valid_before = now + requirements.validity_seconds();

    let message = TransferWithAuthorization {
        from,
        to,
        value,
        valid_after: U256::zero(),
        valid_before: U256::from(valid_before),
        nonce,
    };
    let signature = wallet
        .sign_hash(message.digest(&domain))
        .await
        .map_err(|e| X402Error::Signing(e.to_string()))?;

    log::info!(
        "[x402] Signed {} of {} to {} on {}",
        requirements.max_amount_required,
        requirements.asset,
        requirements.pay_to,
        requirements.network
    );

    Ok(PaymentPayload {
        x402_version: X402_VERSION,
        scheme: requirements.scheme.clone(),
        network: requirements.network.clone(),
        payload: ExactEvmPayload {
            signature: format!("0x{}", hex::encode(signature.to_vec())),
            authorization: Eip3009Authorization {
                from: format_address(from),
                to: format_address(to),
                value: value.to_string(),
                valid_after: "0".to_string(),
                valid_before: valid_before.to_string(),
                nonce: format!("{:?}", nonce),
            },
        },
    })
}
