//! Bech32 addresses and shard assignment

use crate::constants::{ADDRESS_HRP, ADDRESS_LEN};
use bech32::{FromBase32, ToBase32, Variant};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid bech32 address {0}: {1}")]
    Bech32(String, String),
    #[error("wrong address prefix, expected {expected}, got {got}")]
    Hrp { expected: String, got: String },
    #[error("wrong public key length, expected {expected}, got {got}")]
    Length { expected: usize, got: usize },
}

/// Converts raw public keys to human readable addresses and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubkeyConverter {
    hrp: String,
    len: usize,
}

impl Default for PubkeyConverter {
    fn default() -> Self {
        Self {
            hrp: ADDRESS_HRP.into(),
            len: ADDRESS_LEN,
        }
    }
}

impl PubkeyConverter {
    pub fn new(hrp: impl Into<String>, len: usize) -> Self {
        Self {
            hrp: hrp.into(),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn encode(&self, pubkey: &[u8]) -> Result<String, AddressError> {
        if pubkey.len() != self.len {
            return Err(AddressError::Length {
                expected: self.len,
                got: pubkey.len(),
            });
        }

        bech32::encode(&self.hrp, pubkey.to_base32(), Variant::Bech32)
            .map_err(|e| AddressError::Bech32(hex::encode(pubkey), e.to_string()))
    }

    pub fn decode(&self, address: &str) -> Result<Vec<u8>, AddressError> {
        let bech32_err = |e: bech32::Error| AddressError::Bech32(address.into(), e.to_string());
        let (hrp, data, _) = bech32::decode(address).map_err(bech32_err)?;
        if hrp != self.hrp {
            return Err(AddressError::Hrp {
                expected: self.hrp.clone(),
                got: hrp,
            });
        }

        let pubkey = Vec::<u8>::from_base32(&data).map_err(bech32_err)?;
        if pubkey.len() != self.len {
            return Err(AddressError::Length {
                expected: self.len,
                got: pubkey.len(),
            });
        }
        Ok(pubkey)
    }
}

/// Shard of an address given the number of shards, masking its last byte
pub fn compute_shard_id(pubkey: &[u8], num_shards: u32) -> u32 {
    let Some(last) = pubkey.last() else {
        return 0;
    };
    if num_shards <= 1 {
        return 0;
    }

    let n = (num_shards as f64).log2().ceil() as u32;
    let mask_high = (1u32 << n) - 1;
    let mask_low = (1u32 << (n - 1)) - 1;

    let shard = *last as u32 & mask_high;
    if shard > num_shards - 1 {
        *last as u32 & mask_low
    } else {
        shard
    }
}
