use crate::commands::command_error::CommandError;
use crate::resp::RespValue;

pub struct EchoArguments {
    argument: String,
}

impl EchoArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidEchoCommand);
        }

        Ok(Self {
            argument: arguments[0].clone(),
        })
    }
}

/// Handles the ECHO command; replies with its single argument as a bulk
/// string.
pub fn echo(arguments: Vec<String>) -> Result<String, CommandError> {
    let echo_arguments = EchoArguments::parse(arguments)?;

    Ok(RespValue::BulkString(echo_arguments.argument).encode())
}
