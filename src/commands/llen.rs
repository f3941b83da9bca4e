use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct LlenArguments {
    key: String,
}

impl LlenArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidLLenCommand);
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// Handles the LLEN command; absent lists report length 0.
pub async fn llen(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let llen_arguments = LlenArguments::parse(arguments)?;

    let store_guard = store.lock().await;

    let Some(value) = store_guard.get(&llen_arguments.key) else {
        return Ok(RespValue::Integer(0).encode());
    };

    match value.data {
        DataType::List(ref list) => Ok(RespValue::Integer(list.len() as i64).encode()),
        _ => Err(CommandError::InvalidDataTypeForKey),
    }
}
