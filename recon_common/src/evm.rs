//! Strongly-typed EVM identifiers.
//!
//! Addresses and transaction hashes arrive from several places (HTTP requests, indexer payloads, stored documents) in
//! whatever case the producer felt like using. Both types here normalise to lower case on construction, so equality
//! and hashing are case-insensitive by the time a value reaches the engine.
use std::{fmt, fmt::Display, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[a-f0-9]{40}$").unwrap());
static TX_HASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[a-f0-9]{64}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvmParseError {
    #[error("'{0}' is not a valid EVM address")]
    InvalidAddress(String),
    #[error("'{0}' is not a valid transaction hash")]
    InvalidTxHash(String),
}

/// A 20-byte EVM account or contract address, stored as lower-case `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EvmAddress(String);

impl EvmAddress {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if `s` would parse as an address.
    pub fn is_valid(s: &str) -> bool {
        ADDRESS_RE.is_match(&s.trim().to_ascii_lowercase())
    }
}

impl FromStr for EvmAddress {
    type Err = EvmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if ADDRESS_RE.is_match(&s) {
            Ok(Self(s))
        } else {
            Err(EvmParseError::InvalidAddress(s))
        }
    }
}

impl Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EvmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for EvmAddress {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A 32-byte transaction hash, stored as lower-case `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_valid(s: &str) -> bool {
        TX_HASH_RE.is_match(&s.trim().to_ascii_lowercase())
    }
}

impl FromStr for TxHash {
    type Err = EvmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if TX_HASH_RE.is_match(&s) {
            Ok(Self(s))
        } else {
            Err(EvmParseError::InvalidTxHash(s))
        }
    }
}

impl Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for TxHash {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
