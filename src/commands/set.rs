use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore, Value};
use crate::resp::RespValue;

/// Represents the parsed arguments for the SET command.
///
/// Format: `SET key value [PX milliseconds]`. Any keyword other than PX in
/// the third position is a syntax error.
pub struct SetArguments {
    key: String,
    value: String,
    expiration: Option<Instant>,
}

impl SetArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::InvalidSetCommand);
        }

        let mut expiration: Option<Instant> = None;

        if arguments.len() == 4 {
            if arguments[2].to_ascii_lowercase() != "px" {
                return Err(CommandError::SyntaxError);
            }

            let milliseconds = arguments[3]
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidSetCommandExpiration)?;

            expiration = Some(Instant::now() + Duration::from_millis(milliseconds));
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            expiration,
        })
    }
}

/// Handles the SET command.
///
/// Sets the key unconditionally, replacing any previous value of any type,
/// with an optional relative TTL in milliseconds via PX. Replies `+OK\r\n`.
pub async fn set(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;
    store_guard.insert(
        set_arguments.key,
        Value {
            data: DataType::String(set_arguments.value),
            expiration: set_arguments.expiration,
        },
    );

    Ok(RespValue::SimpleString("OK".to_string()).encode())
}
