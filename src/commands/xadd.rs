use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::commands::command_error::CommandError;
use crate::commands::stream_utils::{encode_stream_block, parse_entry_id, EntryIdSpec};
use crate::key_value_store::{DataType, EntryId, KeyValueStore, StreamEntry, Value};
use crate::resp::RespValue;
use crate::state::State;

/// Represents the parsed arguments for the XADD command.
///
/// Field/value pairs keep their argument order; it is observable through
/// XRANGE and XREAD.
pub struct XaddArguments {
    key: String,
    entry_id: String,
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || (arguments.len() - 2) % 2 != 0 {
            return Err(CommandError::InvalidXAddCommand);
        }

        Ok(Self {
            key: arguments[0].clone(),
            entry_id: arguments[1].clone(),
            fields: arguments[2..]
                .chunks(2)
                .map(|chunk| (chunk[0].clone(), chunk[1].clone()))
                .collect(),
        })
    }
}

/// Handles the XADD command.
///
/// Resolves the requested entry ID (`*`, `<ms>-*` or a literal), appends
/// the entry, replies with the resolved ID as a bulk string, and evaluates
/// the blocked XREAD clients watching this stream. The resolved ID must be
/// strictly greater than the stream's current tail and may never be `0-0`.
pub async fn xadd(
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    let id_spec =
        parse_entry_id(&xadd_arguments.entry_id).map_err(CommandError::InvalidStreamId)?;

    let entry_id;
    {
        let mut store_guard = store.lock().await;

        let value = store_guard
            .entry(xadd_arguments.key.clone())
            .or_insert_with(|| Value {
                data: DataType::Stream(Vec::new()),
                expiration: None,
            });

        let DataType::Stream(ref mut stream) = value.data else {
            return Err(CommandError::InvalidDataTypeForKey);
        };

        entry_id = resolve_entry_id(stream, id_spec).map_err(CommandError::InvalidStreamId)?;

        stream.push(StreamEntry {
            id: entry_id,
            fields: xadd_arguments.fields.clone(),
        });
    }

    wake_stream_waiters(state, &xadd_arguments.key, entry_id, xadd_arguments.fields).await;

    Ok(RespValue::BulkString(entry_id.to_string()).encode())
}

/// Resolves an ID specification against the current stream contents and
/// checks the monotonicity rules.
fn resolve_entry_id(stream: &[StreamEntry], id_spec: EntryIdSpec) -> Result<EntryId, String> {
    let candidate = match id_spec {
        EntryIdSpec::Wildcard => {
            let ms = current_unix_time_ms();
            let seq = next_sequence_for_ms(stream, ms).unwrap_or(0);
            EntryId::new(ms, seq)
        }
        EntryIdSpec::SequenceWildcard(ms) => {
            let fallback = if ms == 0 { 1 } else { 0 };
            let seq = next_sequence_for_ms(stream, ms).unwrap_or(fallback);
            EntryId::new(ms, seq)
        }
        EntryIdSpec::Literal(id) => id,
    };

    if candidate == EntryId::MIN {
        return Err("The ID specified in XADD must be greater than 0-0".to_string());
    }

    if let Some(last) = stream.last() {
        if candidate <= last.id {
            return Err(
                "The ID specified in XADD is equal or smaller than the target stream top item"
                    .to_string(),
            );
        }
    }

    Ok(candidate)
}

/// Next sequence for entries sharing `ms`, or `None` when no prior entry
/// has that millisecond part. Entries are ordered, so the scan walks from
/// the tail and stops as soon as it passes `ms`.
fn next_sequence_for_ms(stream: &[StreamEntry], ms: u64) -> Option<u64> {
    for entry in stream.iter().rev() {
        if entry.id.ms == ms {
            return Some(entry.id.seq + 1);
        }

        if entry.id.ms < ms {
            break;
        }
    }

    None
}

fn current_unix_time_ms() -> u64 {
    jiff::Timestamp::now().as_millisecond() as u64
}

/// Producer wake for streams: evaluates every waiter parked on `key`.
///
/// A waiter whose resolved last ID is below the new entry is removed from
/// all of its watched keys and receives the single-entry XREAD reply
/// `*1 [key, [[id, fields]]]`. A waiter whose deadline already passed is
/// removed the same way and receives the timeout null array.
async fn wake_stream_waiters(
    state: &Arc<Mutex<State>>,
    key: &str,
    entry_id: EntryId,
    fields: Vec<(String, String)>,
) {
    let (woken, timed_out) = {
        let mut state_guard = state.lock().await;
        state_guard.take_stream_waiters_for_entry(key, entry_id, Instant::now())
    };

    if woken.is_empty() && timed_out.is_empty() {
        return;
    }

    let entry = StreamEntry {
        id: entry_id,
        fields,
    };
    let payload =
        RespValue::Array(vec![encode_stream_block(key, std::slice::from_ref(&entry))]).encode();

    for waiter in woken {
        if waiter.reply.send(payload.clone()).is_err() {
            debug!(client = %waiter.client_address, "woken client already disconnected");
        }
    }

    for waiter in timed_out {
        let _ = waiter.reply.send(RespValue::NullArray.encode());
    }
}
