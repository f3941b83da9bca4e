use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct LpopArguments {
    key: String,
    count: Option<usize>,
}

impl LpopArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.is_empty() || arguments.len() > 2 {
            return Err(CommandError::InvalidLPopCommand);
        }

        let count = match arguments.get(1) {
            Some(raw) => {
                let count = raw
                    .parse::<i64>()
                    .map_err(|_| CommandError::InvalidLPopCommandArgument)?;

                if count < 0 {
                    return Err(CommandError::InvalidLPopCommandArgument);
                }

                Some(count as usize)
            }
            None => None,
        };

        Ok(Self {
            key: arguments[0].clone(),
            count,
        })
    }
}

/// Handles the LPOP command.
///
/// Without a count, pops and returns one head element as a bulk string
/// (null when the list is empty or absent). With a count, pops up to
/// `min(count, len)` elements and returns them as an array; an empty or
/// absent list yields an empty array. A negative count is a range error.
pub async fn lpop(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let lpop_arguments = LpopArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    let list = match store_guard.get_mut(&lpop_arguments.key) {
        Some(value) => match value.data {
            DataType::List(ref mut list) => Some(list),
            _ => return Err(CommandError::InvalidDataTypeForKey),
        },
        None => None,
    };

    match lpop_arguments.count {
        None => {
            let popped = list.and_then(|list| list.pop_front());

            match popped {
                Some(element) => Ok(RespValue::BulkString(element).encode()),
                None => Ok(RespValue::NullBulkString.encode()),
            }
        }
        Some(count) => {
            let mut popped = Vec::new();

            if let Some(list) = list {
                for _ in 0..count.min(list.len()) {
                    if let Some(element) = list.pop_front() {
                        popped.push(element);
                    }
                }
            }

            Ok(RespValue::encode_array_from_strings(popped))
        }
    }
}
