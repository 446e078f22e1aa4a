//! Primitives shared by the reconciliation engine and server.
pub mod amounts;
mod evm;
pub mod helpers;
mod secret;

pub use evm::{EvmAddress, EvmParseError, TxHash};
pub use secret::Secret;
