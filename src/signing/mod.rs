pub mod action;
pub mod nonce;
pub mod wallet;

pub use action::{action_hash, sign_l1_action, SignatureWire};
pub use nonce::NonceClock;
pub use wallet::Wallet;
