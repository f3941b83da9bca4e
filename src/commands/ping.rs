use crate::commands::command_error::CommandError;
use crate::resp::RespValue;

pub struct PingArguments;

impl PingArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::InvalidPingCommand);
        }

        Ok(Self)
    }
}

/// Handles the PING command; replies `+PONG\r\n`.
pub fn ping(arguments: Vec<String>) -> Result<String, CommandError> {
    PingArguments::parse(arguments)?;

    Ok(RespValue::SimpleString("PONG".to_string()).encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping() {
        assert_eq!(ping(vec![]), Ok("+PONG\r\n".to_string()));
        assert_eq!(
            ping(vec!["extra".to_string()]),
            Err(CommandError::InvalidPingCommand)
        );
    }
}
