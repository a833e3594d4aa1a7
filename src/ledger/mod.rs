//! Decoders for contract storage dumps

pub mod energy;
pub mod legacy_delegation;

use crate::account::BlockInfo;
use num::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("entry truncated, needed {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("empty entry")]
    Empty,
    #[error("unknown entry tag {0}")]
    UnknownTag(u8),
}

/// Key/value storage of one account, both sides hex encoded.
/// Shape of the `data` field returned for `/address/<address>/keys`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDump {
    #[serde(default)]
    pub pairs: HashMap<String, String>,
    #[serde(default)]
    pub block_info: Option<BlockInfo>,
}

/// Cursor over a decoded storage value
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated {
                offset: self.offset,
                needed: n,
                len: self.bytes.len(),
            })?;

        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    /// 4-byte big-endian length followed by that many bytes
    pub fn length_prefixed(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn biguint(&mut self) -> Result<BigUint, DecodeError> {
        Ok(BigUint::from_bytes_be(self.length_prefixed()?))
    }
}

pub(crate) fn decode_hex(value: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(value).map_err(|e| DecodeError::Hex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_truncation() {
        let bytes = [0, 0, 0, 5, 1, 2];
        let mut reader = ByteReader::new(&bytes);

        assert_eq!(
            reader.length_prefixed(),
            Err(DecodeError::Truncated {
                offset: 4,
                needed: 5,
                len: 6
            })
        );
    }

    #[test]
    fn storage_dump_from_api_data() -> anyhow::Result<()> {
        let dump: StorageDump = serde_json::from_str(
            r#"{"pairs":{"6162":"01"},"blockInfo":{"hash":"aa","nonce":12,"rootHash":"bb"}}"#,
        )?;

        assert_eq!(dump.pairs.get("6162").map(String::as_str), Some("01"));
        assert_eq!(
            dump.block_info,
            Some(BlockInfo {
                hash: "aa".into(),
                nonce: 12,
                root_hash: "bb".into()
            })
        );
        Ok(())
    }
}
