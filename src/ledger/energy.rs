//! Energy contract storage
//!
//! Entries live under `userEnergy` + raw public key. The value packs
//! `amount` (length prefixed, two's complement), `last_update_epoch` (u64)
//! and `total_locked_tokens` (length prefixed, unsigned), all big-endian.
//! Energy decays by `total_locked_tokens` every epoch since the last update.

use super::{decode_hex, ByteReader, DecodeError};
use crate::{
    account::{address::PubkeyConverter, AccountInfo, AccountsMap, EnergyDetails, StakeInfo},
    balance::to_float,
};
use num::{BigInt, BigUint, Signed};
use std::collections::HashMap;
use tracing::{info, trace, warn};

/// Hex of `userEnergy`
pub const ENERGY_KEY_PREFIX_HEX: &str = "75736572456e65726779";

/// Decoded energy entry with big integer fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyEntry {
    pub amount: BigInt,
    pub last_update_epoch: u32,
    pub total_locked_tokens: BigUint,
}

impl EnergyEntry {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(bytes);
        let amount = signed_from_be(reader.length_prefixed()?);
        // stored as u64, epochs fit in u32
        let last_update_epoch = reader.u64()? as u32;
        let total_locked_tokens = reader.biguint()?;

        Ok(Self {
            amount,
            last_update_epoch,
            total_locked_tokens,
        })
    }

    /// `amount - (current_epoch - last_update_epoch) * total_locked_tokens`.
    ///
    /// The epoch difference wraps like a `u32`, so an entry updated after
    /// `current_epoch` decays by about 2^32 epochs and ends up negative
    /// unless nothing is locked.
    pub fn value_at(&self, current_epoch: u32) -> BigInt {
        let elapsed = BigInt::from(current_epoch.wrapping_sub(self.last_update_epoch));
        let decay = elapsed * BigInt::from(self.total_locked_tokens.clone());
        &self.amount - decay
    }

    pub fn details(&self) -> EnergyDetails {
        EnergyDetails {
            amount: self.amount.to_string(),
            last_update_epoch: self.last_update_epoch,
            total_locked_tokens: self.total_locked_tokens.to_string(),
        }
    }
}

/// Two's complement big-endian bytes
fn signed_from_be(bytes: &[u8]) -> BigInt {
    let value = BigInt::from(BigUint::from_bytes_be(bytes));
    match bytes.first() {
        Some(msb) if msb & 0x80 != 0 => value - (BigInt::from(1) << (8 * bytes.len())),
        _ => value,
    }
}

/// Decodes a hex encoded energy value, logging and returning `None` on failure
pub fn decode_energy_entry(value: &str) -> Option<EnergyEntry> {
    match decode_hex(value).and_then(|bytes| EnergyEntry::decode(&bytes)) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(error = %e, "cannot decode energy entry");
            None
        }
    }
}

fn address_from_key(key: &str, converter: &PubkeyConverter) -> Option<String> {
    let address_hex = key.strip_prefix(ENERGY_KEY_PREFIX_HEX)?;
    let pubkey = match hex::decode(address_hex) {
        Ok(pubkey) => pubkey,
        Err(e) => {
            warn!(error = %e, key, "cannot decode address from energy key");
            return None;
        }
    };

    match converter.encode(&pubkey) {
        Ok(address) => Some(address),
        Err(e) => {
            warn!(error = %e, key, "cannot encode address from energy key");
            None
        }
    }
}

/// Accounts with non-negative energy at `current_epoch`.
/// Addresses whose decayed energy is negative are left out.
pub fn extract_accounts_with_energy(
    pairs: &HashMap<String, String>,
    current_epoch: u32,
    converter: &PubkeyConverter,
) -> AccountsMap {
    let mut accounts = AccountsMap::new();
    for (key, value) in pairs {
        let Some(address) = address_from_key(key, converter) else {
            continue;
        };
        let Some(entry) = decode_energy_entry(value) else {
            continue;
        };

        let energy = entry.value_at(current_epoch);
        trace!(
            current_epoch,
            last_update_epoch = entry.last_update_epoch,
            amount = to_float(&entry.amount.to_string()),
            total_locked_tokens = to_float(&entry.total_locked_tokens.to_string()),
            energy = to_float(&energy.to_string()),
            "energy at current epoch"
        );
        if energy.is_negative() {
            continue;
        }

        let mut account = AccountInfo::default();
        (account.stake.energy, account.stake.energy_num) = StakeInfo::pair(energy.to_string());
        account.stake.energy_details = Some(entry.details());
        accounts.insert(address, account);
    }

    info!(num = accounts.len(), "accounts with energy");
    accounts
}
