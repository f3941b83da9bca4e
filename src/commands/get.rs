use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

/// Handles the GET command.
///
/// Replies with the value as a bulk string, or a null bulk string when the
/// key is absent, expired, or not a plain string. An expired key observed
/// here is removed as a side effect.
pub async fn get(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::InvalidGetCommand);
    }

    let mut store_guard = store.lock().await;

    let Some(value) = store_guard.get(&arguments[0]) else {
        return Ok(RespValue::NullBulkString.encode());
    };

    if value.is_expired(Instant::now()) {
        store_guard.remove(&arguments[0]);
        return Ok(RespValue::NullBulkString.encode());
    }

    match value.data {
        DataType::String(ref content) => Ok(RespValue::BulkString(content.clone()).encode()),
        _ => Ok(RespValue::NullBulkString.encode()),
    }
}
