use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::{
    blpop::{blpop, BlpopArguments},
    command_error::CommandError,
    echo::{echo, EchoArguments},
    get::get,
    incr::incr,
    llen::{llen, LlenArguments},
    lpop::{lpop, LpopArguments},
    lrange::lrange,
    ping::{ping, PingArguments},
    rpush_and_lpush::{lpush, rpush},
    save::{bgsave, save, BgsaveArguments, SaveArguments},
    set::{set, SetArguments},
    type_command::{type_command, TypeArguments},
    xadd::{xadd, XaddArguments},
    xrange::{xrange, XrangeArguments},
    xread::{xread, XreadArguments},
};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::server::CinderServer;
use crate::state::{ReplySender, State};

/// Outcome of executing one command: either a synchronous reply, or
/// nothing because the client was enrolled as a blocked waiter and its
/// reply will arrive asynchronously through the connection's reply
/// channel.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Response(String),
    NoResponse,
}

/// A parsed client command: uppercased name plus its arguments.
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<String>,
}

impl CommandHandler {
    /// Builds a command from a RESP array of bulk strings. Anything else is
    /// rejected before reaching a handler.
    pub fn new(input: &RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = input else {
            return Err(CommandError::InvalidCommand);
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(name)) => name.to_ascii_uppercase(),
            _ => return Err(CommandError::InvalidCommandArgument),
        };

        let mut arguments = Vec::with_capacity(elements.len().saturating_sub(1));

        for element in &elements[1..] {
            match element {
                RespValue::BulkString(argument) => arguments.push(argument.clone()),
                _ => return Err(CommandError::InvalidCommand),
            }
        }

        Ok(Self { name, arguments })
    }

    /// Checks the arguments without executing anything. Used by the
    /// dispatcher to reject malformed commands at queue time, before they
    /// enter a transaction.
    pub fn validate_command_arguments(&self) -> Option<CommandError> {
        match self.name.as_str() {
            "PING" => PingArguments::parse(self.arguments.clone()).err(),
            "ECHO" => EchoArguments::parse(self.arguments.clone()).err(),
            "GET" => match self.arguments.len() {
                1 => None,
                _ => Some(CommandError::InvalidGetCommand),
            },
            "SET" => SetArguments::parse(self.arguments.clone()).err(),
            "INCR" => match self.arguments.len() {
                1 => None,
                _ => Some(CommandError::InvalidIncrCommand),
            },
            "RPUSH" => match self.arguments.len() {
                0 | 1 => Some(CommandError::InvalidRPushCommand),
                _ => None,
            },
            "LPUSH" => match self.arguments.len() {
                0 | 1 => Some(CommandError::InvalidLPushCommand),
                _ => None,
            },
            "LPOP" => LpopArguments::parse(self.arguments.clone()).err(),
            "LRANGE" => match self.arguments.len() {
                3 => None,
                _ => Some(CommandError::InvalidLRangeCommand),
            },
            "LLEN" => LlenArguments::parse(self.arguments.clone()).err(),
            "BLPOP" => BlpopArguments::parse(self.arguments.clone()).err(),
            "TYPE" => TypeArguments::parse(self.arguments.clone()).err(),
            "XADD" => XaddArguments::parse(self.arguments.clone()).err(),
            "XRANGE" => XrangeArguments::parse(self.arguments.clone()).err(),
            "XREAD" => XreadArguments::parse(self.arguments.clone()).err(),
            "SAVE" => SaveArguments::parse(self.arguments.clone()).err(),
            "BGSAVE" => BgsaveArguments::parse(self.arguments.clone()).err(),
            "MULTI" | "EXEC" | "DISCARD" => match self.arguments.len() {
                0 => None,
                _ => Some(CommandError::InvalidCommandArgument),
            },
            _ => Some(CommandError::InvalidCommand),
        }
    }

    /// Executes the command against the shared stores.
    ///
    /// `allow_blocking` is false while an EXEC replays its queue: a
    /// transaction must produce exactly one sub-reply per command, so BLPOP
    /// and XREAD BLOCK degrade to their non-blocking forms there.
    /// MULTI/EXEC/DISCARD never reach this point; the dispatcher intercepts
    /// them.
    pub async fn handle_command(
        &self,
        server: &Arc<CinderServer>,
        client_address: &str,
        store: &Arc<Mutex<KeyValueStore>>,
        state: &Arc<Mutex<State>>,
        reply: &ReplySender,
        allow_blocking: bool,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "PING" => ping(self.arguments.clone()).map(CommandResult::Response),
            "ECHO" => echo(self.arguments.clone()).map(CommandResult::Response),
            "GET" => get(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "SET" => set(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "INCR" => incr(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "RPUSH" => rpush(store, state, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "LPUSH" => lpush(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "LPOP" => lpop(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "LRANGE" => lrange(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "LLEN" => llen(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "BLPOP" => {
                blpop(
                    client_address,
                    store,
                    state,
                    reply,
                    allow_blocking,
                    self.arguments.clone(),
                )
                .await
            }
            "TYPE" => type_command(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "XADD" => xadd(store, state, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "XRANGE" => xrange(store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "XREAD" => {
                xread(
                    client_address,
                    store,
                    state,
                    reply,
                    allow_blocking,
                    self.arguments.clone(),
                )
                .await
            }
            "SAVE" => save(server, store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            "BGSAVE" => bgsave(server, store, self.arguments.clone())
                .await
                .map(CommandResult::Response),
            _ => Err(CommandError::InvalidCommand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_from_resp_array() {
        let input = RespValue::Array(vec![
            RespValue::BulkString("set".to_string()),
            RespValue::BulkString("k".to_string()),
            RespValue::BulkString("v".to_string()),
        ]);

        let handler = CommandHandler::new(&input).unwrap();

        assert_eq!(handler.name, "SET");
        assert_eq!(handler.arguments, vec!["k".to_string(), "v".to_string()]);
    }

    #[test]
    fn test_new_rejects_non_arrays() {
        let test_cases = vec![
            RespValue::SimpleString("PING".to_string()),
            RespValue::BulkString("PING".to_string()),
            RespValue::Integer(1),
        ];

        for input in test_cases {
            assert_eq!(
                CommandHandler::new(&input),
                Err(CommandError::InvalidCommand),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_new_rejects_non_bulk_elements() {
        let input = RespValue::Array(vec![
            RespValue::BulkString("SET".to_string()),
            RespValue::Integer(1),
        ]);

        assert_eq!(
            CommandHandler::new(&input),
            Err(CommandError::InvalidCommand)
        );
    }

    #[test]
    fn test_validate_command_arguments() {
        let test_cases = vec![
            ("PING", vec![], None),
            ("GET", vec!["k"], None),
            ("GET", vec![], Some(CommandError::InvalidGetCommand)),
            ("SET", vec!["k"], Some(CommandError::InvalidSetCommand)),
            ("RPUSH", vec!["k", "v"], None),
            ("RPUSH", vec!["k"], Some(CommandError::InvalidRPushCommand)),
            ("BLPOP", vec!["k", "0"], None),
            ("SAVE", vec![], None),
            ("NOSUCH", vec![], Some(CommandError::InvalidCommand)),
        ];

        for (name, arguments, expected) in test_cases {
            let handler = CommandHandler {
                name: name.to_string(),
                arguments: arguments.iter().map(|s| s.to_string()).collect(),
            };

            assert_eq!(
                handler.validate_command_arguments(),
                expected,
                "validating {} {:?}",
                name,
                arguments
            );
        }
    }
}
