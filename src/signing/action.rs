//! L1 action signing.
//!
//! An exchange action is hashed as
//! `keccak256(msgpack(action) || nonce_be64 || vault_flag [|| vault])`
//! into a `connectionId`, which is then signed as the EIP-712 struct
//! `Agent(string source,bytes32 connectionId)`.

use crate::error::{HypercopyError, Result};
use crate::signing::Wallet;
use ethers::types::{Address, Signature, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

/// Chain id fixed by the venue for agent signatures
pub const AGENT_CHAIN_ID: u64 = 1337;
pub const AGENT_DOMAIN_NAME: &str = "Exchange";
pub const AGENT_DOMAIN_VERSION: &str = "1";
/// `source` value for mainnet actions
pub const MAINNET_SOURCE: &str = "a";

/// Signature in the `{r, s, v}` shape the exchange endpoint expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureWire {
    pub r: String,
    pub s: String,
    pub v: u64,
}

impl From<&Signature> for SignatureWire {
    fn from(sig: &Signature) -> Self {
        Self {
            r: u256_hex(sig.r),
            s: u256_hex(sig.s),
            v: sig.v,
        }
    }
}

fn u256_hex(value: U256) -> String {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    format!("0x{}", hex::encode(buf))
}

/// Compute the `connectionId` for an action.
pub fn action_hash<T: Serialize>(action: &T, nonce: u64, vault: Option<Address>) -> Result<H256> {
    let mut bytes = rmp_serde::to_vec_named(action)?;
    bytes.extend_from_slice(&nonce.to_be_bytes());
    match vault {
        None => bytes.push(0),
        Some(vault) => {
            bytes.push(1);
            bytes.extend_from_slice(vault.as_bytes());
        }
    }
    Ok(H256::from(keccak256(&bytes)))
}

fn domain_separator() -> [u8; 32] {
    let type_hash = keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );
    let tokens = vec![
        ethers::abi::Token::FixedBytes(type_hash.to_vec()),
        ethers::abi::Token::FixedBytes(keccak256(AGENT_DOMAIN_NAME.as_bytes()).to_vec()),
        ethers::abi::Token::FixedBytes(keccak256(AGENT_DOMAIN_VERSION.as_bytes()).to_vec()),
        ethers::abi::Token::Uint(U256::from(AGENT_CHAIN_ID)),
        ethers::abi::Token::Address(Address::zero()),
    ];
    keccak256(ethers::abi::encode(&tokens))
}

fn agent_struct_hash(source: &str, connection_id: H256) -> [u8; 32] {
    let type_hash = keccak256(b"Agent(string source,bytes32 connectionId)");
    let tokens = vec![
        ethers::abi::Token::FixedBytes(type_hash.to_vec()),
        ethers::abi::Token::FixedBytes(keccak256(source.as_bytes()).to_vec()),
        ethers::abi::Token::FixedBytes(connection_id.as_bytes().to_vec()),
    ];
    keccak256(ethers::abi::encode(&tokens))
}

/// EIP-712 digest that the agent signature covers.
pub fn agent_signing_hash(connection_id: H256) -> H256 {
    let mut encoded = Vec::with_capacity(66);
    encoded.extend_from_slice(b"\x19\x01");
    encoded.extend_from_slice(&domain_separator());
    encoded.extend_from_slice(&agent_struct_hash(MAINNET_SOURCE, connection_id));
    H256::from(keccak256(&encoded))
}

/// Sign an exchange action for submission with `nonce`, routed to `vault`.
pub fn sign_l1_action<T: Serialize>(
    wallet: &Wallet,
    action: &T,
    nonce: u64,
    vault: Option<Address>,
) -> Result<SignatureWire> {
    let connection_id = action_hash(action, nonce, vault)?;
    let digest = agent_signing_hash(connection_id);
    let signature = wallet.sign_hash(digest)?;
    if signature.v != 27 && signature.v != 28 {
        return Err(HypercopyError::Signature(format!(
            "unexpected recovery id {}",
            signature.v
        )));
    }
    Ok(SignatureWire::from(&signature))
}
