use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore, Value};
use crate::resp::RespValue;

struct IncrArguments {
    key: String,
}

impl IncrArguments {
    fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidIncrCommand);
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// Handles the INCR command.
///
/// An absent key is initialised to 0 and then incremented, so the first
/// INCR replies 1. A present value must parse as a signed 64-bit integer;
/// anything else is a not-an-integer error. The write drops any existing
/// expiry, the same overwrite semantics SET has.
pub async fn incr(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let incr_arguments = IncrArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    let Some(value) = store_guard.get_mut(&incr_arguments.key) else {
        store_guard.insert(
            incr_arguments.key,
            Value {
                data: DataType::String("1".to_string()),
                expiration: None,
            },
        );
        return Ok(RespValue::Integer(1).encode());
    };

    match value.data {
        DataType::String(ref mut stored) => {
            let current = stored
                .parse::<i64>()
                .map_err(|_| CommandError::InvalidIncrValue)?;
            let incremented = current + 1;

            *stored = incremented.to_string();
            value.expiration = None;

            Ok(RespValue::Integer(incremented).encode())
        }
        _ => Err(CommandError::InvalidDataTypeForKey),
    }
}
