use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::commands::stream_utils::{encode_entries, parse_range_id};
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct XrangeArguments {
    key: String,
    start: String,
    end: String,
}

impl XrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::InvalidXRangeCommand);
        }

        Ok(Self {
            key: arguments[0].clone(),
            start: arguments[1].clone(),
            end: arguments[2].clone(),
        })
    }
}

/// Handles the XRANGE command.
///
/// Returns all entries with `start <= id <= end` in stream order, each as
/// `[id, [f1, v1, ...]]`. `-` and `+` denote the minimum and maximum IDs
/// and a lone `<ms>` means `<ms>-0`. An unknown key yields an empty array.
pub async fn xrange(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let start = parse_range_id(&xrange_arguments.start).map_err(CommandError::InvalidStreamId)?;
    let end = parse_range_id(&xrange_arguments.end).map_err(CommandError::InvalidStreamId)?;

    let store_guard = store.lock().await;

    let Some(value) = store_guard.get(&xrange_arguments.key) else {
        return Ok(RespValue::Array(vec![]).encode());
    };

    let DataType::Stream(ref stream) = value.data else {
        return Err(CommandError::InvalidDataTypeForKey);
    };

    let matching = stream
        .iter()
        .skip_while(|entry| entry.id < start)
        .take_while(|entry| entry.id <= end)
        .cloned()
        .collect::<Vec<_>>();

    Ok(encode_entries(&matching).encode())
}
