use tokio::time::Instant;

use crate::key_value_store::{DataType, KeyValueStore};

use super::encoding::{write_length, write_string};
use super::{
    AUX_OPCODE, EOF_OPCODE, EXPIRY_MS_OPCODE, LIST_TYPE, MAGIC_HEADER, SELECTDB_OPCODE,
    STREAM_TYPE, STRING_TYPE,
};

/// Serializes the whole store into the snapshot byte format. Expired string
/// keys are silently skipped.
pub fn serialize_snapshot(store: &KeyValueStore) -> Vec<u8> {
    let now = Instant::now();
    let now_unix_ms = jiff::Timestamp::now().as_millisecond();

    let mut buffer = Vec::new();
    buffer.extend_from_slice(MAGIC_HEADER);

    write_aux(&mut buffer, "redis-ver", env!("CARGO_PKG_VERSION"));
    write_aux(&mut buffer, "redis-bits", "64");

    buffer.push(SELECTDB_OPCODE);
    write_length(&mut buffer, 0);

    for (key, value) in store {
        if let DataType::String(ref content) = value.data {
            if value.is_expired(now) {
                continue;
            }

            buffer.push(STRING_TYPE);
            write_string(&mut buffer, key);

            if let Some(expiration) = value.expiration {
                buffer.push(EXPIRY_MS_OPCODE);
                let unix_ms = expiration_to_unix_ms(expiration, now, now_unix_ms);
                buffer.extend_from_slice(&unix_ms.to_le_bytes());
            }

            write_string(&mut buffer, content);
        }
    }

    for (key, value) in store {
        if let DataType::List(ref list) = value.data {
            buffer.push(LIST_TYPE);
            write_string(&mut buffer, key);
            write_length(&mut buffer, list.len() as u64);

            for element in list {
                write_string(&mut buffer, element);
            }
        }
    }

    for (key, value) in store {
        if let DataType::Stream(ref stream) = value.data {
            buffer.push(STREAM_TYPE);
            write_string(&mut buffer, key);
            write_length(&mut buffer, stream.len() as u64);

            for entry in stream {
                write_string(&mut buffer, &entry.id.to_string());
                write_length(&mut buffer, entry.fields.len() as u64);

                for (name, field_value) in &entry.fields {
                    write_string(&mut buffer, name);
                    write_string(&mut buffer, field_value);
                }
            }
        }
    }

    buffer.push(EOF_OPCODE);
    buffer.extend_from_slice(&[0u8; 8]);

    buffer
}

fn write_aux(buffer: &mut Vec<u8>, key: &str, value: &str) {
    buffer.push(AUX_OPCODE);
    write_string(buffer, key);
    write_string(buffer, value);
}

/// Converts a monotonic deadline into absolute unix milliseconds for the
/// file. `Value::is_expired` has already filtered deadlines in the past.
fn expiration_to_unix_ms(expiration: Instant, now: Instant, now_unix_ms: i64) -> u64 {
    let remaining = expiration.saturating_duration_since(now);
    (now_unix_ms + remaining.as_millis() as i64) as u64
}

#[cfg(test)]
mod tests {
    use crate::key_value_store::Value;

    use super::*;

    #[test]
    fn test_snapshot_shape() {
        let mut store = KeyValueStore::new();
        store.insert(
            "k".to_string(),
            Value {
                data: DataType::String("v".to_string()),
                expiration: None,
            },
        );

        let bytes = serialize_snapshot(&store);

        assert!(bytes.starts_with(MAGIC_HEADER));
        assert_eq!(bytes[MAGIC_HEADER.len()], AUX_OPCODE);
        assert_eq!(bytes[bytes.len() - 9], EOF_OPCODE);
        assert_eq!(&bytes[bytes.len() - 8..], &[0u8; 8]);
    }
}
