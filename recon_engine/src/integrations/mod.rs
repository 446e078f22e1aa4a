//! Concrete backends for the engine's data sources.
//!
//! * [`blockscout`]: on-chain transfers from a Blockscout indexer.
//! * [`coinbase`]: spot prices from Coinbase.
//! * [`memory`]: fixed, in-memory data.
pub mod blockscout;
pub mod coinbase;
pub mod memory;
