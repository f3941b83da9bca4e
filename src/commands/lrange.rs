use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

pub async fn lrange(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if arguments.len() != 3 {
        return Err(CommandError::InvalidLRangeCommand);
    }

    let start_index = arguments[1]
        .parse::<isize>()
        .map_err(|_| CommandError::InvalidLRangeCommandArgument)?;
    let end_index = arguments[2]
        .parse::<isize>()
        .map_err(|_| CommandError::InvalidLRangeCommandArgument)?;

    let store_guard = store.lock().await;

    let Some(value) = store_guard.get(&arguments[0]) else {
        return Ok(RespValue::Array(vec![]).encode());
    };

    let DataType::List(ref list) = value.data else {
        return Err(CommandError::InvalidDataTypeForKey);
    };

    let Ok((start, end)) = resolve_range_indexes(list, start_index, end_index) else {
        return Ok(RespValue::Array(vec![]).encode());
    };

    let range = list
        .range(start..=end)
        .map(|element| element.to_string())
        .collect::<Vec<String>>();

    Ok(RespValue::encode_array_from_strings(range))
}

/// Applies Redis index semantics: negatives are offsets from the end, start
/// is clamped up to 0, end is clamped down to `len - 1`, and an inverted or
/// out-of-bounds range is reported as an error for the caller to render as
/// an empty array.
fn resolve_range_indexes(
    list: &VecDeque<String>,
    start_index: isize,
    end_index: isize,
) -> Result<(usize, usize), &'static str> {
    let length = list.len() as isize;

    let mut start = if start_index < 0 {
        length + start_index
    } else {
        start_index
    };
    let mut end = if end_index < 0 {
        length + end_index
    } else {
        end_index
    };

    start = start.max(0);
    end = end.min(length - 1);

    if start >= length {
        return Err("start index is out of bounds");
    }

    if start > end {
        return Err("start index is bigger than end index after clamping");
    }

    Ok((start as usize, end as usize))
}
