//! Point-in-time snapshots of the store.
//!
//! The dump file starts with the magic header `REDIS0001`, carries a few
//! AUX metadata pairs and a SELECTDB marker, then one typed record per key
//! (string 0x00, list 0x01, stream 0x02) and a trailing EOF opcode with an
//! 8-byte checksum. The checksum is written as zero and not verified on
//! load. Lengths use the 6/14/32-bit prefix encoding described in
//! `encoding`.

mod encoding;
mod reader;
mod writer;

use std::path::Path;

use thiserror::Error;

use crate::key_value_store::KeyValueStore;

pub use reader::parse_snapshot;
pub use writer::serialize_snapshot;

pub(crate) const MAGIC_HEADER: &[u8; 9] = b"REDIS0001";
pub(crate) const AUX_OPCODE: u8 = 0xFA;
pub(crate) const SELECTDB_OPCODE: u8 = 0xFE;
pub(crate) const EXPIRY_MS_OPCODE: u8 = 0xFC;
pub(crate) const EOF_OPCODE: u8 = 0xFF;
pub(crate) const STRING_TYPE: u8 = 0x00;
pub(crate) const LIST_TYPE: u8 = 0x01;
pub(crate) const STREAM_TYPE: u8 = 0x02;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot header")]
    InvalidHeader,
    #[error("unexpected end of snapshot")]
    UnexpectedEof,
    #[error("invalid length encoding")]
    InvalidLengthEncoding,
    #[error("invalid UTF-8 in snapshot")]
    InvalidUtf8,
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("invalid entry ID in snapshot: {0}")]
    InvalidEntryId(String),
}

/// Serializes the store and writes it to `path`.
pub async fn save(path: &Path, store: &KeyValueStore) -> Result<(), SnapshotError> {
    let bytes = serialize_snapshot(store);
    tokio::fs::write(path, bytes).await?;

    Ok(())
}

/// Loads a snapshot from `path`. A missing file is not an error; it simply
/// yields `None` and the server starts empty.
pub async fn load(path: &Path) -> Result<Option<KeyValueStore>, SnapshotError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(parse_snapshot(&bytes)?)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(SnapshotError::Io(error)),
    }
}
