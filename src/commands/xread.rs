use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::commands::command_error::CommandError;
use crate::commands::command_handler::CommandResult;
use crate::commands::stream_utils::{encode_stream_block, parse_range_id};
use crate::key_value_store::{DataType, EntryId, KeyValueStore};
use crate::resp::RespValue;
use crate::state::{ReplySender, State, StreamWaiter};

pub struct XreadArguments {
    block_ms: Option<u64>,
    key_id_pairs: Vec<(String, String)>,
}

impl XreadArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 3 {
            return Err(CommandError::InvalidXReadCommand);
        }

        let (block_ms, streams_keyword_index) = match arguments[0].to_ascii_lowercase().as_str() {
            "block" => {
                let duration_ms = arguments[1]
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidBlockTimeout)?;

                (Some(duration_ms), 2)
            }
            _ => (None, 0),
        };

        if arguments
            .get(streams_keyword_index)
            .map(|keyword| keyword.to_ascii_lowercase())
            .as_deref()
            != Some("streams")
        {
            return Err(CommandError::InvalidXReadOption);
        }

        let data = &arguments[streams_keyword_index + 1..];

        if data.is_empty() || data.len() % 2 != 0 {
            return Err(CommandError::InvalidXReadCommand);
        }

        let key_count = data.len() / 2;
        let mut key_id_pairs = Vec::with_capacity(key_count);

        for i in 0..key_count {
            key_id_pairs.push((data[i].clone(), data[key_count + i].clone()));
        }

        Ok(Self {
            block_ms,
            key_id_pairs,
        })
    }
}

/// Handles the XREAD command.
///
/// For each `(key, id)` pair, collects the entries with IDs strictly
/// greater than `id`. `$` resolves to the stream's current tail at call
/// time. If any stream has matches the full response is returned at once,
/// skipping empty streams. With no matches and no BLOCK option the reply
/// is a null array; with BLOCK the client is enrolled as a waiter on every
/// watched key and the reply arrives later through its reply channel.
pub async fn xread(
    client_address: &str,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    reply: &ReplySender,
    allow_blocking: bool,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let store_guard = store.lock().await;

    let mut resolved_pairs = Vec::with_capacity(xread_arguments.key_id_pairs.len());
    for (key, raw_id) in &xread_arguments.key_id_pairs {
        let last_id = if raw_id == "$" {
            stream_tail_id(&store_guard, key)?
        } else {
            parse_range_id(raw_id).map_err(CommandError::InvalidStreamId)?
        };

        resolved_pairs.push((key.clone(), last_id));
    }

    let mut blocks = Vec::new();
    for (key, last_id) in &resolved_pairs {
        let entries = entries_after(&store_guard, key, *last_id)?;

        if !entries.is_empty() {
            blocks.push(encode_stream_block(key, &entries));
        }
    }

    if !blocks.is_empty() {
        return Ok(CommandResult::Response(RespValue::Array(blocks).encode()));
    }

    let Some(block_ms) = xread_arguments.block_ms else {
        return Ok(CommandResult::Response(RespValue::NullArray.encode()));
    };

    if !allow_blocking {
        return Ok(CommandResult::Response(RespValue::NullArray.encode()));
    }

    let expiry = if block_ms == 0 {
        None
    } else {
        Some(Instant::now() + Duration::from_millis(block_ms))
    };

    // Register while the store lock is still held so an XADD cannot land
    // between the read above and the registration.
    let mut state_guard = state.lock().await;
    for (key, last_id) in resolved_pairs {
        state_guard.add_stream_waiter(
            key,
            StreamWaiter {
                client_address: client_address.to_string(),
                last_id,
                reply: reply.clone(),
                expiry,
            },
        );
    }

    Ok(CommandResult::NoResponse)
}

/// Current tail ID of a stream, used to resolve `$`. An absent or empty
/// stream resolves to `0-0`, so a blocking read waits for the first entry.
fn stream_tail_id(store: &KeyValueStore, key: &str) -> Result<EntryId, CommandError> {
    match store.get(key) {
        Some(value) => match value.data {
            DataType::Stream(ref stream) => Ok(stream
                .last()
                .map(|entry| entry.id)
                .unwrap_or(EntryId::MIN)),
            _ => Err(CommandError::InvalidDataTypeForKey),
        },
        None => Ok(EntryId::MIN),
    }
}

fn entries_after(
    store: &KeyValueStore,
    key: &str,
    last_id: EntryId,
) -> Result<Vec<crate::key_value_store::StreamEntry>, CommandError> {
    match store.get(key) {
        Some(value) => match value.data {
            DataType::Stream(ref stream) => Ok(stream
                .iter()
                .skip_while(|entry| entry.id <= last_id)
                .cloned()
                .collect()),
            _ => Err(CommandError::InvalidDataTypeForKey),
        },
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use crate::key_value_store::{StreamEntry, Value};

    use super::*;

    fn arguments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn store_with_stream() -> Arc<Mutex<KeyValueStore>> {
        let entries = vec![
            StreamEntry {
                id: EntryId::new(1000, 0),
                fields: vec![("temp".to_string(), "25".to_string())],
            },
            StreamEntry {
                id: EntryId::new(2000, 0),
                fields: vec![("temp".to_string(), "30".to_string())],
            },
        ];

        Arc::new(Mutex::new(KeyValueStore::from([(
            "sensor".to_string(),
            Value {
                data: DataType::Stream(entries),
                expiration: None,
            },
        )])))
    }

    #[test]
    fn test_parse_arguments() {
        let test_cases = vec![
            (vec!["streams", "k", "0-0"], Ok((None, 1))),
            (
                vec!["BLOCK", "500", "STREAMS", "k", "0-0"],
                Ok((Some(500), 1)),
            ),
            (
                vec!["block", "0", "streams", "a", "b", "1-0", "2-0"],
                Ok((Some(0), 2)),
            ),
            (vec!["streams", "k"], Err(CommandError::InvalidXReadCommand)),
            (
                vec!["streams", "a", "b", "1-0"],
                Err(CommandError::InvalidXReadCommand),
            ),
            (
                vec!["nonsense", "k", "0-0"],
                Err(CommandError::InvalidXReadOption),
            ),
            (
                vec!["block", "abc", "streams", "k", "0-0"],
                Err(CommandError::InvalidBlockTimeout),
            ),
        ];

        for (input, expected) in test_cases {
            let result = XreadArguments::parse(arguments(&input))
                .map(|parsed| (parsed.block_ms, parsed.key_id_pairs.len()));
            assert_eq!(result, expected, "parsing {:?}", input);
        }
    }

    #[tokio::test]
    async fn test_xread_returns_entries_after_id() {
        let store = store_with_stream();
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = xread(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            arguments(&["streams", "sensor", "1500"]),
        )
        .await;

        assert_eq!(
            result,
            Ok(CommandResult::Response(
                "*1\r\n*2\r\n$6\r\nsensor\r\n*1\r\n*2\r\n$6\r\n2000-0\r\n*2\r\n$4\r\ntemp\r\n$2\r\n30\r\n"
                    .to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_xread_exclusive_lower_bound() {
        let store = store_with_stream();
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = xread(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            arguments(&["streams", "sensor", "2000-0"]),
        )
        .await;

        assert_eq!(
            result,
            Ok(CommandResult::Response("*-1\r\n".to_string()))
        );
    }

    #[tokio::test]
    async fn test_xread_skips_empty_streams() {
        let store = store_with_stream();
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = xread(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            arguments(&["streams", "missing", "sensor", "0-0", "0-0"]),
        )
        .await
        .unwrap();

        let CommandResult::Response(response) = result else {
            panic!("expected a synchronous response");
        };
        assert!(response.starts_with("*1\r\n*2\r\n$6\r\nsensor\r\n"));
    }

    #[tokio::test]
    async fn test_xread_block_registers_waiter_per_key() {
        let store = store_with_stream();
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = xread(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            arguments(&["block", "0", "streams", "sensor", "other", "$", "$"]),
        )
        .await;

        assert_eq!(result, Ok(CommandResult::NoResponse));

        let state_guard = state.lock().await;

        let sensor_waiters = state_guard.stream_waiters.get("sensor").unwrap();
        assert_eq!(sensor_waiters.len(), 1);
        // `$` resolved to the current tail, not kept as a sentinel.
        assert_eq!(sensor_waiters[0].last_id, EntryId::new(2000, 0));
        assert_eq!(sensor_waiters[0].expiry, None);

        let other_waiters = state_guard.stream_waiters.get("other").unwrap();
        assert_eq!(other_waiters[0].last_id, EntryId::MIN);
    }

    #[tokio::test]
    async fn test_xread_without_block_returns_null_array() {
        let store = store_with_stream();
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = xread(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            arguments(&["streams", "sensor", "9999"]),
        )
        .await;

        assert_eq!(
            result,
            Ok(CommandResult::Response("*-1\r\n".to_string()))
        );
    }

    #[tokio::test]
    async fn test_xread_block_disabled_in_transactions() {
        let store = store_with_stream();
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = xread(
            "client-1",
            &store,
            &state,
            &sender,
            false,
            arguments(&["block", "0", "streams", "sensor", "$"]),
        )
        .await;

        assert_eq!(
            result,
            Ok(CommandResult::Response("*-1\r\n".to_string()))
        );

        let state_guard = state.lock().await;
        assert!(state_guard.stream_waiters.is_empty());
    }
}
