use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::commands::command_handler::{CommandHandler, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::server::CinderServer;
use crate::state::{ReplySender, State, StateError};

#[derive(Error, Debug, PartialEq)]
pub enum DispatchError {
    #[error("MULTI nested")]
    MultiNested,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("invalid command in transaction queue")]
    InvalidQueueCommand(#[from] CommandError),
    #[error("transaction error")]
    StateError(#[from] StateError),
}

impl DispatchError {
    pub fn as_string(&self) -> String {
        match self {
            DispatchError::MultiNested => {
                RespValue::Error("ERR MULTI nested".to_string()).encode()
            }
            DispatchError::ExecWithoutMulti => {
                RespValue::Error("ERR EXEC without MULTI".to_string()).encode()
            }
            DispatchError::DiscardWithoutMulti => {
                RespValue::Error("ERR DISCARD without MULTI".to_string()).encode()
            }
            DispatchError::InvalidQueueCommand(error) => error.as_string(),
            DispatchError::StateError(error) => {
                RespValue::Error(format!("ERR {}", error)).encode()
            }
        }
    }
}

/// What the dispatcher decided to do with a parsed command.
#[derive(Debug, PartialEq)]
pub enum DispatchResult {
    ImmediateResponse(String),
    ExecuteSingleCommand(CommandHandler),
    ExecuteTransactionCommands(Vec<CommandHandler>),
}

impl DispatchResult {
    /// Runs the decision against the stores and produces the bytes to send
    /// now, or `None` when the command enrolled the client as a blocked
    /// waiter.
    ///
    /// A transaction replay executes its commands back-to-back on this
    /// task, collecting each already-encoded sub-reply into a single array
    /// of exactly N elements.
    pub async fn handle_dispatch_result(
        &self,
        server: &Arc<CinderServer>,
        client_address: &str,
        store: &Arc<Mutex<KeyValueStore>>,
        state: &Arc<Mutex<State>>,
        reply: &ReplySender,
    ) -> Option<String> {
        match self {
            DispatchResult::ImmediateResponse(response) => Some(response.clone()),
            DispatchResult::ExecuteSingleCommand(command) => {
                match command
                    .handle_command(server, client_address, store, state, reply, true)
                    .await
                {
                    Ok(CommandResult::Response(response)) => Some(response),
                    Ok(CommandResult::NoResponse) => None,
                    Err(error) => Some(error.as_string()),
                }
            }
            DispatchResult::ExecuteTransactionCommands(commands) => {
                let mut responses = Vec::with_capacity(commands.len() + 1);
                responses.push(format!("*{}\r\n", commands.len()));

                for command in commands {
                    let sub_reply = match command
                        .handle_command(server, client_address, store, state, reply, false)
                        .await
                    {
                        Ok(CommandResult::Response(response)) => response,
                        Ok(CommandResult::NoResponse) => RespValue::NullBulkString.encode(),
                        Err(error) => error.as_string(),
                    };

                    responses.push(sub_reply);
                }

                Some(responses.join(""))
            }
        }
    }
}

/// Routes a parsed command according to the connection's transaction state:
/// MULTI/EXEC/DISCARD are handled here, and while a transaction is open
/// every other command is validated, queued, and answered `+QUEUED`.
pub struct CommandDispatcher<'a> {
    client_address: &'a str,
    state: Arc<Mutex<State>>,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(client_address: &'a str, state: Arc<Mutex<State>>) -> Self {
        CommandDispatcher {
            client_address,
            state,
        }
    }

    pub async fn dispatch_command(
        &self,
        command: CommandHandler,
    ) -> Result<DispatchResult, DispatchError> {
        match command.name.as_str() {
            "MULTI" => {
                if !command.arguments.is_empty() {
                    return Err(DispatchError::InvalidQueueCommand(
                        CommandError::InvalidCommandArgument,
                    ));
                }

                let mut state_guard = self.state.lock().await;
                state_guard
                    .start_transaction(self.client_address.to_string())
                    .map_err(|_| DispatchError::MultiNested)?;

                Ok(DispatchResult::ImmediateResponse(
                    RespValue::SimpleString("OK".to_string()).encode(),
                ))
            }
            "EXEC" => {
                let mut state_guard = self.state.lock().await;

                let Ok(transaction) = state_guard.remove_transaction(self.client_address) else {
                    return Err(DispatchError::ExecWithoutMulti);
                };

                if transaction.is_empty() {
                    Ok(DispatchResult::ImmediateResponse(
                        RespValue::Array(Vec::new()).encode(),
                    ))
                } else {
                    Ok(DispatchResult::ExecuteTransactionCommands(transaction))
                }
            }
            "DISCARD" => {
                let mut state_guard = self.state.lock().await;

                let Ok(_) = state_guard.remove_transaction(self.client_address) else {
                    return Err(DispatchError::DiscardWithoutMulti);
                };

                Ok(DispatchResult::ImmediateResponse(
                    RespValue::SimpleString("OK".to_string()).encode(),
                ))
            }
            _ => {
                let mut state_guard = self.state.lock().await;

                if state_guard.get_transaction(self.client_address).is_none() {
                    return Ok(DispatchResult::ExecuteSingleCommand(command));
                }

                if let Some(error) = command.validate_command_arguments() {
                    return Err(DispatchError::InvalidQueueCommand(error));
                }

                state_guard.add_to_transaction(self.client_address, command)?;

                Ok(DispatchResult::ImmediateResponse(
                    RespValue::SimpleString("QUEUED".to_string()).encode(),
                ))
            }
        }
    }
}
