use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::commands::command_error::CommandError;
use crate::commands::command_handler::CommandResult;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;
use crate::state::{ListWaiter, ReplySender, State};

/// Represents the parsed arguments for the BLPOP command.
///
/// Format: `BLPOP key timeout_seconds`. The timeout may be fractional;
/// 0 means "wait forever".
pub struct BlpopArguments {
    key: String,
    timeout_secs: f64,
}

impl BlpopArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidBLPopCommand);
        }

        let timeout_secs = arguments[1]
            .parse::<f64>()
            .map_err(|_| CommandError::InvalidBlockTimeout)?;

        if !timeout_secs.is_finite() || timeout_secs < 0.0 {
            return Err(CommandError::InvalidBlockTimeout);
        }

        Ok(Self {
            key: arguments[0].clone(),
            timeout_secs,
        })
    }
}

/// Handles the BLPOP command.
///
/// When the list already has a head element it is popped and answered
/// synchronously as `*2 [key, element]`. Otherwise the client is enrolled
/// as a FIFO waiter on the key and no reply is produced here: the reply
/// arrives later through the connection's reply channel, sent either by an
/// RPUSH producer or by the timeout reaper (`$-1\r\n`).
///
/// Inside an EXEC replay blocking is disabled and an empty list answers a
/// null bulk string immediately.
pub async fn blpop(
    client_address: &str,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    reply: &ReplySender,
    allow_blocking: bool,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let blpop_arguments = BlpopArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    if let Some(value) = store_guard.get_mut(&blpop_arguments.key) {
        let DataType::List(ref mut list) = value.data else {
            return Err(CommandError::InvalidDataTypeForKey);
        };

        if let Some(element) = list.pop_front() {
            let response = RespValue::Array(vec![
                RespValue::BulkString(blpop_arguments.key),
                RespValue::BulkString(element),
            ])
            .encode();

            return Ok(CommandResult::Response(response));
        }
    }

    if !allow_blocking {
        return Ok(CommandResult::Response(RespValue::NullBulkString.encode()));
    }

    let expiry = if blpop_arguments.timeout_secs == 0.0 {
        None
    } else {
        Some(Instant::now() + Duration::from_secs_f64(blpop_arguments.timeout_secs))
    };

    // State is locked while the store lock is still held so no RPUSH can
    // slip between the emptiness check and the registration.
    let mut state_guard = state.lock().await;
    state_guard.add_list_waiter(
        blpop_arguments.key,
        ListWaiter {
            client_address: client_address.to_string(),
            reply: reply.clone(),
            expiry,
        },
    );

    Ok(CommandResult::NoResponse)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use tokio::sync::mpsc;

    use crate::key_value_store::Value;

    use super::*;

    #[test]
    fn test_parse_arguments() {
        let test_cases = vec![
            (vec!["k", "0"], Ok(())),
            (vec!["k", "1.5"], Ok(())),
            (vec!["k"], Err(CommandError::InvalidBLPopCommand)),
            (
                vec!["k", "1", "2"],
                Err(CommandError::InvalidBLPopCommand),
            ),
            (vec!["k", "abc"], Err(CommandError::InvalidBlockTimeout)),
            (vec!["k", "-1"], Err(CommandError::InvalidBlockTimeout)),
        ];

        for (input, expected) in test_cases {
            let arguments = input.iter().map(|s| s.to_string()).collect::<Vec<_>>();
            let result = BlpopArguments::parse(arguments).map(|_| ());
            assert_eq!(result, expected, "parsing {:?}", input);
        }
    }

    #[tokio::test]
    async fn test_blpop_pops_immediately_when_not_empty() {
        let store = Arc::new(Mutex::new(KeyValueStore::from([(
            "q".to_string(),
            Value {
                data: DataType::List(VecDeque::from(["x".to_string()])),
                expiration: None,
            },
        )])));
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = blpop(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            vec!["q".to_string(), "0".to_string()],
        )
        .await;

        assert_eq!(
            result,
            Ok(CommandResult::Response(
                "*2\r\n$1\r\nq\r\n$1\r\nx\r\n".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_blpop_registers_waiter_when_empty() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = blpop(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            vec!["q".to_string(), "2.5".to_string()],
        )
        .await;

        assert_eq!(result, Ok(CommandResult::NoResponse));

        let mut state_guard = state.lock().await;
        let waiter = state_guard.pop_list_waiter("q").unwrap();
        assert_eq!(waiter.client_address, "client-1");
        assert!(waiter.expiry.is_some());
    }

    #[tokio::test]
    async fn test_blpop_zero_timeout_waits_forever() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        blpop(
            "client-1",
            &store,
            &state,
            &sender,
            true,
            vec!["q".to_string(), "0".to_string()],
        )
        .await
        .unwrap();

        let mut state_guard = state.lock().await;
        assert_eq!(state_guard.pop_list_waiter("q").unwrap().expiry, None);
    }

    #[tokio::test]
    async fn test_blpop_without_blocking_returns_null() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));
        let (sender, _receiver) = mpsc::unbounded_channel();

        let result = blpop(
            "client-1",
            &store,
            &state,
            &sender,
            false,
            vec!["q".to_string(), "0".to_string()],
        )
        .await;

        assert_eq!(
            result,
            Ok(CommandResult::Response("$-1\r\n".to_string()))
        );

        let mut state_guard = state.lock().await;
        assert!(state_guard.pop_list_waiter("q").is_none());
    }
}
