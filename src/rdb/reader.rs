use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::key_value_store::{DataType, EntryId, KeyValueStore, StreamEntry, Value};

use super::encoding::{read_byte, read_length, read_string};
use super::{
    AUX_OPCODE, EOF_OPCODE, EXPIRY_MS_OPCODE, LIST_TYPE, SELECTDB_OPCODE, SnapshotError,
    STREAM_TYPE, STRING_TYPE,
};

/// Parses a complete snapshot back into a store. Entries whose expiration
/// already passed are dropped during the load.
pub fn parse_snapshot(bytes: &[u8]) -> Result<KeyValueStore, SnapshotError> {
    let mut cursor = parse_header(bytes)?;
    let now_unix_ms = jiff::Timestamp::now().as_millisecond();

    let mut store = KeyValueStore::new();

    loop {
        let (opcode, next) = read_byte(bytes, cursor)?;
        cursor = next;

        match opcode {
            AUX_OPCODE => {
                let (aux_key, next) = read_string(bytes, cursor)?;
                let (aux_value, next) = read_string(bytes, next)?;
                cursor = next;

                debug!(key = %aux_key, value = %aux_value, "snapshot metadata");
            }
            SELECTDB_OPCODE => {
                let (_database_index, next) = read_length(bytes, cursor)?;
                cursor = next;
            }
            STRING_TYPE => {
                let (key, next) = read_string(bytes, cursor)?;
                cursor = next;

                let mut expiry_unix_ms: Option<u64> = None;
                let (marker, _) = read_byte(bytes, cursor)?;
                if marker == EXPIRY_MS_OPCODE {
                    let slice = bytes
                        .get(cursor + 1..cursor + 9)
                        .ok_or(SnapshotError::UnexpectedEof)?;
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(slice);
                    expiry_unix_ms = Some(u64::from_le_bytes(raw));
                    cursor += 9;
                }

                let (content, next) = read_string(bytes, cursor)?;
                cursor = next;

                match resolve_expiration(expiry_unix_ms, now_unix_ms) {
                    Expiration::Expired => {}
                    Expiration::At(expiration) => {
                        store.insert(
                            key,
                            Value {
                                data: DataType::String(content),
                                expiration,
                            },
                        );
                    }
                }
            }
            LIST_TYPE => {
                let (key, next) = read_string(bytes, cursor)?;
                let (length, mut next) = read_length(bytes, next)?;

                let mut list = VecDeque::with_capacity(length as usize);
                for _ in 0..length {
                    let (element, after) = read_string(bytes, next)?;
                    list.push_back(element);
                    next = after;
                }
                cursor = next;

                store.insert(
                    key,
                    Value {
                        data: DataType::List(list),
                        expiration: None,
                    },
                );
            }
            STREAM_TYPE => {
                let (key, next) = read_string(bytes, cursor)?;
                let (length, mut next) = read_length(bytes, next)?;

                let mut stream = Vec::with_capacity(length as usize);
                for _ in 0..length {
                    let (raw_id, after) = read_string(bytes, next)?;
                    let id = raw_id
                        .parse::<EntryId>()
                        .map_err(SnapshotError::InvalidEntryId)?;

                    let (field_count, mut after) = read_length(bytes, after)?;
                    let mut fields = Vec::with_capacity(field_count as usize);

                    for _ in 0..field_count {
                        let (name, value_start) = read_string(bytes, after)?;
                        let (field_value, value_end) = read_string(bytes, value_start)?;
                        fields.push((name, field_value));
                        after = value_end;
                    }

                    stream.push(StreamEntry { id, fields });
                    next = after;
                }
                cursor = next;

                store.insert(
                    key,
                    Value {
                        data: DataType::Stream(stream),
                        expiration: None,
                    },
                );
            }
            EOF_OPCODE => {
                // 8-byte checksum trailer, allowed to be zero and not verified.
                if bytes.len() < cursor + 8 {
                    return Err(SnapshotError::UnexpectedEof);
                }
                break;
            }
            unknown => return Err(SnapshotError::UnknownOpcode(unknown)),
        }
    }

    Ok(store)
}

fn parse_header(bytes: &[u8]) -> Result<usize, SnapshotError> {
    let header = bytes.get(..9).ok_or(SnapshotError::UnexpectedEof)?;

    if &header[..5] != b"REDIS" {
        return Err(SnapshotError::InvalidHeader);
    }

    if !header[5..].iter().all(|byte| byte.is_ascii_digit()) {
        return Err(SnapshotError::InvalidHeader);
    }

    Ok(9)
}

enum Expiration {
    Expired,
    At(Option<Instant>),
}

fn resolve_expiration(expiry_unix_ms: Option<u64>, now_unix_ms: i64) -> Expiration {
    match expiry_unix_ms {
        None => Expiration::At(None),
        Some(unix_ms) => {
            let remaining_ms = unix_ms as i64 - now_unix_ms;

            if remaining_ms <= 0 {
                Expiration::Expired
            } else {
                Expiration::At(Some(
                    Instant::now() + Duration::from_millis(remaining_ms as u64),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_opcode_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"REDIS0001");
        bytes.push(0x42);

        assert!(matches!(
            parse_snapshot(&bytes),
            Err(SnapshotError::UnknownOpcode(0x42))
        ));
    }

    #[test]
    fn test_truncated_checksum_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"REDIS0001");
        bytes.push(EOF_OPCODE);
        bytes.extend_from_slice(&[0u8; 4]);

        assert!(matches!(
            parse_snapshot(&bytes),
            Err(SnapshotError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_resolve_expiration() {
        assert!(matches!(
            resolve_expiration(None, 1_000),
            Expiration::At(None)
        ));
        assert!(matches!(
            resolve_expiration(Some(500), 1_000),
            Expiration::Expired
        ));
        assert!(matches!(
            resolve_expiration(Some(5_000), 1_000),
            Expiration::At(Some(_))
        ));
    }
}
