use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::commands::CommandHandler;
use crate::key_value_store::EntryId;

/// Channel end through which asynchronous replies reach a client's
/// connection task. Sends never block; a failed send means the client is
/// gone.
pub type ReplySender = UnboundedSender<String>;

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("MULTI nested")]
    TransactionAlreadyStarted,
    #[error("no transaction in progress")]
    NoActiveTransaction,
}

/// A client parked by BLPOP, waiting for one element of one list.
#[derive(Debug)]
pub struct ListWaiter {
    pub client_address: String,
    pub reply: ReplySender,
    pub expiry: Option<Instant>,
}

/// A client parked by XREAD BLOCK on one of the stream keys it watches.
/// The same client is registered once per watched key; waking it through
/// any key removes it from all of them.
#[derive(Debug)]
pub struct StreamWaiter {
    pub client_address: String,
    pub last_id: EntryId,
    pub reply: ReplySender,
    pub expiry: Option<Instant>,
}

/// Cross-connection coordination state: blocked-client tables and
/// per-connection transaction queues. Always locked after the store.
#[derive(Debug, Default)]
pub struct State {
    pub list_waiters: HashMap<String, VecDeque<ListWaiter>>,
    pub stream_waiters: HashMap<String, Vec<StreamWaiter>>,
    pub transactions: HashMap<String, Vec<CommandHandler>>,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    pub fn start_transaction(&mut self, client_address: String) -> Result<(), StateError> {
        if self.transactions.contains_key(&client_address) {
            return Err(StateError::TransactionAlreadyStarted);
        }

        self.transactions.insert(client_address, Vec::new());
        Ok(())
    }

    pub fn get_transaction(&self, client_address: &str) -> Option<&Vec<CommandHandler>> {
        self.transactions.get(client_address)
    }

    pub fn add_to_transaction(
        &mut self,
        client_address: &str,
        command: CommandHandler,
    ) -> Result<(), StateError> {
        let queue = self
            .transactions
            .get_mut(client_address)
            .ok_or(StateError::NoActiveTransaction)?;

        queue.push(command);
        Ok(())
    }

    pub fn remove_transaction(
        &mut self,
        client_address: &str,
    ) -> Result<Vec<CommandHandler>, StateError> {
        self.transactions
            .remove(client_address)
            .ok_or(StateError::NoActiveTransaction)
    }

    pub fn add_list_waiter(&mut self, key: String, waiter: ListWaiter) {
        self.list_waiters.entry(key).or_default().push_back(waiter);
    }

    pub fn pop_list_waiter(&mut self, key: &str) -> Option<ListWaiter> {
        self.list_waiters.get_mut(key)?.pop_front()
    }

    /// Puts a waiter back at the head of its queue, preserving FIFO order
    /// when a producer wake finds the list drained.
    pub fn requeue_list_waiter(&mut self, key: &str, waiter: ListWaiter) {
        self.list_waiters
            .entry(key.to_string())
            .or_default()
            .push_front(waiter);
    }

    pub fn add_stream_waiter(&mut self, key: String, waiter: StreamWaiter) {
        self.stream_waiters.entry(key).or_default().push(waiter);
    }

    /// Splits the waiters registered on `key` into those woken by a new
    /// entry with id `entry_id` and those whose deadline has already
    /// passed. Both groups are removed from every key they were watching
    /// before any reply is sent, so each client receives exactly one reply.
    pub fn take_stream_waiters_for_entry(
        &mut self,
        key: &str,
        entry_id: EntryId,
        now: Instant,
    ) -> (Vec<StreamWaiter>, Vec<StreamWaiter>) {
        let mut woken = Vec::new();
        let mut timed_out = Vec::new();

        let Some(waiters) = self.stream_waiters.get_mut(key) else {
            return (woken, timed_out);
        };

        let mut remaining = Vec::with_capacity(waiters.len());

        for waiter in waiters.drain(..) {
            if matches!(waiter.expiry, Some(expiry) if expiry <= now) {
                timed_out.push(waiter);
            } else if entry_id > waiter.last_id {
                woken.push(waiter);
            } else {
                remaining.push(waiter);
            }
        }

        *waiters = remaining;

        for waiter in woken.iter().chain(timed_out.iter()) {
            self.remove_stream_waiters_except(&waiter.client_address, key);
        }

        (woken, timed_out)
    }

    fn remove_stream_waiters_except(&mut self, client_address: &str, except_key: &str) {
        for (key, waiters) in self.stream_waiters.iter_mut() {
            if key != except_key {
                waiters.retain(|waiter| waiter.client_address != client_address);
            }
        }
    }

    /// Removes every expired waiter and hands them back so the reaper can
    /// send the timeout replies outside the lock. A stream waiter watching
    /// several keys is returned once.
    pub fn sweep_expired_waiters(&mut self, now: Instant) -> (Vec<ListWaiter>, Vec<StreamWaiter>) {
        let mut expired_list_waiters = Vec::new();

        for waiters in self.list_waiters.values_mut() {
            let mut remaining = VecDeque::with_capacity(waiters.len());

            for waiter in waiters.drain(..) {
                if matches!(waiter.expiry, Some(expiry) if expiry <= now) {
                    expired_list_waiters.push(waiter);
                } else {
                    remaining.push_back(waiter);
                }
            }

            *waiters = remaining;
        }

        let mut expired_stream_waiters: Vec<StreamWaiter> = Vec::new();

        for waiters in self.stream_waiters.values_mut() {
            let mut remaining = Vec::with_capacity(waiters.len());

            for waiter in waiters.drain(..) {
                if matches!(waiter.expiry, Some(expiry) if expiry <= now) {
                    let already_collected = expired_stream_waiters
                        .iter()
                        .any(|collected| collected.client_address == waiter.client_address);

                    if !already_collected {
                        expired_stream_waiters.push(waiter);
                    }
                } else {
                    remaining.push(waiter);
                }
            }

            *waiters = remaining;
        }

        (expired_list_waiters, expired_stream_waiters)
    }

    /// Disconnect cleanup: drops the client from every wait structure and
    /// its transaction, without sending any reply.
    pub fn remove_client(&mut self, client_address: &str) {
        for waiters in self.list_waiters.values_mut() {
            waiters.retain(|waiter| waiter.client_address != client_address);
        }

        for waiters in self.stream_waiters.values_mut() {
            waiters.retain(|waiter| waiter.client_address != client_address);
        }

        self.transactions.remove(client_address);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    fn list_waiter(client_address: &str, expiry: Option<Instant>) -> ListWaiter {
        let (sender, _receiver) = mpsc::unbounded_channel();
        ListWaiter {
            client_address: client_address.to_string(),
            reply: sender,
            expiry,
        }
    }

    fn stream_waiter(
        client_address: &str,
        last_id: EntryId,
        expiry: Option<Instant>,
    ) -> StreamWaiter {
        let (sender, _receiver) = mpsc::unbounded_channel();
        StreamWaiter {
            client_address: client_address.to_string(),
            last_id,
            reply: sender,
            expiry,
        }
    }

    #[test]
    fn test_transaction_lifecycle() {
        let mut state = State::new();

        assert_eq!(state.start_transaction("client-1".to_string()), Ok(()));
        assert_eq!(
            state.start_transaction("client-1".to_string()),
            Err(StateError::TransactionAlreadyStarted)
        );
        assert_eq!(state.get_transaction("client-1"), Some(&Vec::new()));

        let command = CommandHandler {
            name: "SET".to_string(),
            arguments: vec!["k".to_string(), "v".to_string()],
        };
        assert_eq!(state.add_to_transaction("client-1", command.clone()), Ok(()));

        let queue = state.remove_transaction("client-1").unwrap();
        assert_eq!(queue, vec![command]);
        assert_eq!(
            state.remove_transaction("client-1"),
            Err(StateError::NoActiveTransaction)
        );
    }

    #[test]
    fn test_list_waiters_are_fifo() {
        let mut state = State::new();

        state.add_list_waiter("queue".to_string(), list_waiter("first", None));
        state.add_list_waiter("queue".to_string(), list_waiter("second", None));

        assert_eq!(
            state.pop_list_waiter("queue").unwrap().client_address,
            "first"
        );

        state.requeue_list_waiter("queue", list_waiter("first", None));
        assert_eq!(
            state.pop_list_waiter("queue").unwrap().client_address,
            "first"
        );
        assert_eq!(
            state.pop_list_waiter("queue").unwrap().client_address,
            "second"
        );
        assert!(state.pop_list_waiter("queue").is_none());
    }

    #[test]
    fn test_take_stream_waiters_for_entry() {
        let mut state = State::new();
        let now = Instant::now();

        state.add_stream_waiter(
            "s1".to_string(),
            stream_waiter("woken", EntryId::new(1, 0), None),
        );
        state.add_stream_waiter(
            "s2".to_string(),
            stream_waiter("woken", EntryId::new(5, 0), None),
        );
        state.add_stream_waiter(
            "s1".to_string(),
            stream_waiter("not-yet", EntryId::new(9, 0), None),
        );
        state.add_stream_waiter(
            "s1".to_string(),
            stream_waiter(
                "late",
                EntryId::new(1, 0),
                Some(now - Duration::from_millis(5)),
            ),
        );

        let (woken, timed_out) =
            state.take_stream_waiters_for_entry("s1", EntryId::new(2, 0), now);

        assert_eq!(woken.len(), 1);
        assert_eq!(woken[0].client_address, "woken");
        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].client_address, "late");

        // The woken client must be gone from every other key it watched.
        assert!(state.stream_waiters.get("s2").unwrap().is_empty());
        assert_eq!(state.stream_waiters.get("s1").unwrap().len(), 1);
        assert_eq!(
            state.stream_waiters.get("s1").unwrap()[0].client_address,
            "not-yet"
        );
    }

    #[test]
    fn test_sweep_expired_waiters() {
        let mut state = State::new();
        let now = Instant::now();
        let past = Some(now - Duration::from_millis(1));
        let future = Some(now + Duration::from_secs(5));

        state.add_list_waiter("l".to_string(), list_waiter("expired", past));
        state.add_list_waiter("l".to_string(), list_waiter("alive", future));
        state.add_list_waiter("l".to_string(), list_waiter("forever", None));
        state.add_stream_waiter(
            "s1".to_string(),
            stream_waiter("expired-stream", EntryId::MIN, past),
        );
        state.add_stream_waiter(
            "s2".to_string(),
            stream_waiter("expired-stream", EntryId::MIN, past),
        );

        let (list_waiters, stream_waiters) = state.sweep_expired_waiters(now);

        assert_eq!(list_waiters.len(), 1);
        assert_eq!(list_waiters[0].client_address, "expired");
        assert_eq!(state.list_waiters.get("l").unwrap().len(), 2);

        // One reply per client even when it watched several streams.
        assert_eq!(stream_waiters.len(), 1);
        assert_eq!(stream_waiters[0].client_address, "expired-stream");
        assert!(state.stream_waiters.get("s1").unwrap().is_empty());
        assert!(state.stream_waiters.get("s2").unwrap().is_empty());
    }

    #[test]
    fn test_remove_client_clears_every_structure() {
        let mut state = State::new();

        state.add_list_waiter("l".to_string(), list_waiter("gone", None));
        state.add_stream_waiter("s".to_string(), stream_waiter("gone", EntryId::MIN, None));
        state.start_transaction("gone".to_string()).unwrap();

        state.remove_client("gone");

        assert!(state.list_waiters.get("l").unwrap().is_empty());
        assert!(state.stream_waiters.get("s").unwrap().is_empty());
        assert_eq!(state.get_transaction("gone"), None);
    }
}
