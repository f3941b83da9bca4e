use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore, Value};
use crate::resp::RespValue;
use crate::state::State;

/// Handles the RPUSH command.
///
/// Appends the arguments left-to-right to the tail of the list, creating it
/// if needed, and replies with the new length. RPUSH is the producer side
/// of the BLPOP rendezvous: after the push completes, waiters on the key
/// are drained in FIFO order, one element each.
pub async fn rpush(
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let (key, new_length) = push_elements(store, arguments, false).await?;

    wake_list_waiters(store, state, &key).await;

    Ok(RespValue::Integer(new_length as i64).encode())
}

/// Handles the LPUSH command.
///
/// Prepends the arguments one by one, so `LPUSH k a b c` leaves the list as
/// c, b, a. Replies with the new length. LPUSH does not wake blocked
/// clients.
pub async fn lpush(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let (_, new_length) = push_elements(store, arguments, true).await?;

    Ok(RespValue::Integer(new_length as i64).encode())
}

async fn push_elements(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
    should_prepend: bool,
) -> Result<(String, usize), CommandError> {
    if arguments.len() < 2 {
        return if should_prepend {
            Err(CommandError::InvalidLPushCommand)
        } else {
            Err(CommandError::InvalidRPushCommand)
        };
    }

    let key = arguments[0].clone();
    let mut store_guard = store.lock().await;

    let value = store_guard.entry(key.clone()).or_insert_with(|| Value {
        data: DataType::List(VecDeque::new()),
        expiration: None,
    });

    let DataType::List(ref mut list) = value.data else {
        return Err(CommandError::InvalidDataTypeForKey);
    };

    for element in &arguments[1..] {
        if should_prepend {
            list.push_front(element.clone());
        } else {
            list.push_back(element.clone());
        }
    }

    Ok((key, list.len()))
}

/// Drains the BLPOP waiter queue of `key` in FIFO order, popping one head
/// element per waiter, until either the queue or the list is empty.
///
/// The element is removed under the locks together with its waiter and
/// delivered through the waiter's reply channel afterwards. A closed
/// channel means the client disconnected before delivery; the element is
/// pushed back to the head and offered to the next waiter, so every pushed
/// element reaches exactly one live client.
pub async fn wake_list_waiters(
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    key: &str,
) {
    loop {
        let delivery = {
            let mut store_guard = store.lock().await;
            let mut state_guard = state.lock().await;

            let Some(waiter) = state_guard.pop_list_waiter(key) else {
                break;
            };

            let element = match store_guard.get_mut(key).map(|value| &mut value.data) {
                Some(DataType::List(list)) => list.pop_front(),
                _ => None,
            };

            match element {
                Some(element) => (waiter, element),
                None => {
                    state_guard.requeue_list_waiter(key, waiter);
                    break;
                }
            }
        };

        let (waiter, element) = delivery;
        let payload = RespValue::Array(vec![
            RespValue::BulkString(key.to_string()),
            RespValue::BulkString(element.clone()),
        ])
        .encode();

        if waiter.reply.send(payload).is_err() {
            debug!(
                client = %waiter.client_address,
                "blocked client disconnected before delivery, requeueing element"
            );

            let mut store_guard = store.lock().await;
            if let Some(DataType::List(list)) =
                store_guard.get_mut(key).map(|value| &mut value.data)
            {
                list.push_front(element);
            }
        }
    }
}
