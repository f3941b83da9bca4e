use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct TypeArguments {
    key: String,
}

impl TypeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidTypeCommand);
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// Handles the TYPE command; replies `+string`, `+list`, `+stream` or
/// `+none`. An expired string key reports `none` and is removed.
pub async fn type_command(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let type_arguments = TypeArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    let Some(value) = store_guard.get(&type_arguments.key) else {
        return Ok(RespValue::SimpleString("none".to_string()).encode());
    };

    if value.is_expired(Instant::now()) {
        store_guard.remove(&type_arguments.key);
        return Ok(RespValue::SimpleString("none".to_string()).encode());
    }

    let type_name = match value.data {
        DataType::String(_) => "string",
        DataType::List(_) => "list",
        DataType::Stream(_) => "stream",
    };

    Ok(RespValue::SimpleString(type_name.to_string()).encode())
}
