//! Legacy delegation contract storage
//!
//! The contract keeps one packed record per stake entry under keys starting
//! with `f`, attributed to an integer user id. A second key space,
//! `user_id` + raw public key, maps addresses to those ids.
//!
//! Record layout by leading tag byte:
//!
//! | tag | meaning  | layout                                                      |
//! |-----|----------|-------------------------------------------------------------|
//! | 4   | active   | `[1..5]` user id, `[5..9]` amount length, `[9..]` amount    |
//! | 1   | waiting  | `[1..9]` creation date, `[9..13]` user id, `[13..17]` length, `[17..]` amount |
//! | 5   | unstaked | same as waiting                                             |

use super::{decode_hex, ByteReader, DecodeError};
use crate::account::{address::PubkeyConverter, AccountsMap, StakeInfo};
use num::{BigUint, ToPrimitive, Zero};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

const ENTRY_KEY_PREFIX: &[u8] = b"f";
const NON_ENTRY_KEY_PREFIXES: [&[u8]; 3] = [b"f_max_id", b"ftype", b"fuser"];
const USER_ID_KEY_PREFIX: &[u8] = b"user_id";

const TAG_ACTIVE: u8 = 4;
const TAG_WAITING: u8 = 1;
const TAG_UNSTAKED: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyEntryKind {
    Active,
    Waiting,
    Unstaked,
}

impl TryFrom<u8> for LegacyEntryKind {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            TAG_ACTIVE => Ok(Self::Active),
            TAG_WAITING => Ok(Self::Waiting),
            TAG_UNSTAKED => Ok(Self::Unstaked),
            other => Err(DecodeError::UnknownTag(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEntry {
    pub kind: LegacyEntryKind,
    pub user_id: u64,
    pub amount: BigUint,
}

impl LegacyEntry {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(bytes);
        let kind = LegacyEntryKind::try_from(reader.u8().map_err(|_| DecodeError::Empty)?)?;
        if kind != LegacyEntryKind::Active {
            // creation date
            reader.skip(8)?;
        }

        let user_id = reader.u32()? as u64;
        let amount = reader.biguint()?;
        Ok(Self {
            kind,
            user_id,
            amount,
        })
    }
}

/// Decodes one hex encoded record, `None` when it is not a stake entry or
/// cannot be decoded
pub fn decode_legacy_delegation_entry(value: &str) -> Option<LegacyEntry> {
    let decoded = decode_hex(value).and_then(|bytes| LegacyEntry::decode(&bytes));
    match decoded {
        Ok(entry) => Some(entry),
        Err(DecodeError::UnknownTag(tag)) => {
            trace!(tag, "skipping legacy delegation record");
            None
        }
        Err(e) => {
            warn!(error = %e, value, "cannot decode legacy delegation record");
            None
        }
    }
}

/// Whether a raw storage key holds a stake record
pub fn is_entry_key(key: &[u8]) -> bool {
    key.starts_with(ENTRY_KEY_PREFIX)
        && !NON_ENTRY_KEY_PREFIXES
            .iter()
            .any(|prefix| key.starts_with(prefix))
}

/// Maps addresses to legacy contract user ids
pub fn build_address_user_id_table(
    pairs: &HashMap<String, String>,
    converter: &PubkeyConverter,
) -> HashMap<String, u64> {
    let mut table = HashMap::new();
    for (key, value) in pairs {
        let Ok(key) = hex::decode(key) else {
            warn!(key = %key, "cannot decode legacy delegation key");
            continue;
        };
        if !key.starts_with(USER_ID_KEY_PREFIX)
            || key.len() != USER_ID_KEY_PREFIX.len() + converter.len()
        {
            continue;
        }

        let address = match converter.encode(&key[USER_ID_KEY_PREFIX.len()..]) {
            Ok(address) => address,
            Err(e) => {
                warn!(error = %e, "cannot encode legacy delegation user address");
                continue;
            }
        };
        let user_id = decode_hex(value)
            .ok()
            .and_then(|bytes| BigUint::from_bytes_be(&bytes).to_u64());
        match user_id {
            Some(user_id) => {
                table.insert(address, user_id);
            }
            None => warn!(address = %address, value = %value, "invalid legacy delegation user id"),
        }
    }

    table
}

/// Per address totals of the legacy delegation contract
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyDelegationState {
    pub active: HashMap<String, BigUint>,
    pub waiting: HashMap<String, BigUint>,
    pub unstaked: HashMap<String, BigUint>,
}

impl LegacyDelegationState {
    /// Decodes the full storage dump of the contract
    pub fn from_pairs(pairs: &HashMap<String, String>, converter: &PubkeyConverter) -> Self {
        let users = build_address_user_id_table(pairs, converter);
        debug!(users = users.len(), "legacy delegation users");

        let mut totals: HashMap<LegacyEntryKind, HashMap<u64, BigUint>> = HashMap::new();
        for (key, value) in pairs {
            let Ok(key) = hex::decode(key) else {
                continue;
            };
            if !is_entry_key(&key) {
                continue;
            }
            let Some(entry) = decode_legacy_delegation_entry(value) else {
                continue;
            };

            *totals
                .entry(entry.kind)
                .or_default()
                .entry(entry.user_id)
                .or_insert_with(BigUint::zero) += entry.amount;
        }

        let join = |kind: LegacyEntryKind| -> HashMap<String, BigUint> {
            let Some(per_user) = totals.get(&kind) else {
                return HashMap::new();
            };
            users
                .iter()
                .filter_map(|(address, user_id)| {
                    per_user
                        .get(user_id)
                        .map(|amount| (address.clone(), amount.clone()))
                })
                .collect()
        };

        Self {
            active: join(LegacyEntryKind::Active),
            waiting: join(LegacyEntryKind::Waiting),
            unstaked: join(LegacyEntryKind::Unstaked),
        }
    }

    pub fn into_accounts(self) -> AccountsMap {
        let mut accounts = AccountsMap::new();
        for (address, amount) in self.active {
            let stake = &mut accounts.entry(address).or_default().stake;
            (stake.delegation_legacy_active, stake.delegation_legacy_active_num) =
                StakeInfo::pair(amount.to_string());
        }
        for (address, amount) in self.waiting {
            let stake = &mut accounts.entry(address).or_default().stake;
            (stake.delegation_legacy_waiting, stake.delegation_legacy_waiting_num) =
                StakeInfo::pair(amount.to_string());
        }
        for (address, amount) in self.unstaked {
            let stake = &mut accounts.entry(address).or_default().stake;
            (stake.un_delegate_legacy, stake.un_delegate_legacy_num) =
                StakeInfo::pair(amount.to_string());
        }

        accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_record(user_id: u32, amount: &[u8]) -> String {
        let mut bytes = vec![TAG_ACTIVE];
        bytes.extend(user_id.to_be_bytes());
        bytes.extend((amount.len() as u32).to_be_bytes());
        bytes.extend(amount);
        hex::encode(bytes)
    }

    fn dated_record(tag: u8, user_id: u32, amount: &[u8]) -> String {
        let mut bytes = vec![tag];
        bytes.extend(1_600_000_000u64.to_be_bytes());
        bytes.extend(user_id.to_be_bytes());
        bytes.extend((amount.len() as u32).to_be_bytes());
        bytes.extend(amount);
        hex::encode(bytes)
    }

    fn key(raw: &[u8]) -> String {
        hex::encode(raw)
    }

    #[test]
    fn decodes_tagged_records() {
        let active = decode_legacy_delegation_entry(&active_record(7, &[0x01, 0x00]));
        assert_eq!(
            active,
            Some(LegacyEntry {
                kind: LegacyEntryKind::Active,
                user_id: 7,
                amount: BigUint::from(256u32),
            })
        );

        let unstaked = decode_legacy_delegation_entry(&dated_record(TAG_UNSTAKED, 9, &[0x05]));
        assert_eq!(
            unstaked.map(|e| (e.kind, e.user_id, e.amount)),
            Some((LegacyEntryKind::Unstaked, 9, BigUint::from(5u32)))
        );
    }

    #[test]
    fn skips_bad_records() {
        assert_eq!(decode_legacy_delegation_entry("zz"), None);
        assert_eq!(decode_legacy_delegation_entry(""), None);
        assert_eq!(decode_legacy_delegation_entry("02000000"), None);
        // declared amount longer than the record
        assert_eq!(decode_legacy_delegation_entry("0400000001000000ff01"), None);
    }

    #[test]
    fn entry_key_filter() {
        assert!(is_entry_key(b"f\x00\x00\x00\x01"));
        assert!(is_entry_key(b"fund"));
        assert!(!is_entry_key(b"f_max_id"));
        assert!(!is_entry_key(b"ftype\x01"));
        assert!(!is_entry_key(b"fuser\x01"));
        assert!(!is_entry_key(b"user_id"));
    }

    #[test]
    fn accumulates_and_joins_by_user_id() {
        let converter = PubkeyConverter::default();
        let alice = [1u8; 32];
        let bob = [2u8; 32];
        let mut alice_key = USER_ID_KEY_PREFIX.to_vec();
        alice_key.extend(alice);
        let mut bob_key = USER_ID_KEY_PREFIX.to_vec();
        bob_key.extend(bob);
        // one byte short, not a user entry
        let mut short_key = USER_ID_KEY_PREFIX.to_vec();
        short_key.extend([3u8; 31]);

        let pairs = HashMap::from([
            (key(&alice_key), "01".to_string()),
            (key(&bob_key), "02".to_string()),
            (key(&short_key), "03".to_string()),
            (key(b"f\x00\x01"), active_record(1, &[10])),
            (key(b"f\x00\x02"), active_record(1, &[20])),
            (key(b"f\x00\x03"), dated_record(TAG_WAITING, 2, &[7])),
            (key(b"f\x00\x04"), dated_record(TAG_UNSTAKED, 2, &[3])),
            (key(b"f\x00\x05"), active_record(3, &[99])),
            (key(b"ftype"), active_record(1, &[50])),
            (key(b"f_max_id"), "05".to_string()),
        ]);

        let state = LegacyDelegationState::from_pairs(&pairs, &converter);
        let alice = converter.encode(&alice).unwrap();
        let bob = converter.encode(&bob).unwrap();

        assert_eq!(state.active.len(), 1);
        assert_eq!(state.active[&alice], BigUint::from(30u32));
        assert_eq!(state.waiting[&bob], BigUint::from(7u32));
        assert_eq!(state.unstaked[&bob], BigUint::from(3u32));

        let accounts = state.into_accounts();
        assert_eq!(accounts[&alice].stake.delegation_legacy_active, "30");
        assert_eq!(accounts[&bob].stake.delegation_legacy_waiting, "7");
        assert_eq!(accounts[&bob].stake.un_delegate_legacy, "3");
    }
}
