use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("invalid command")]
    InvalidCommand,
    #[error("invalid command argument")]
    InvalidCommandArgument,
    #[error("invalid PING command")]
    InvalidPingCommand,
    #[error("invalid ECHO command")]
    InvalidEchoCommand,
    #[error("invalid GET command")]
    InvalidGetCommand,
    #[error("invalid SET command")]
    InvalidSetCommand,
    #[error("syntax error")]
    SyntaxError,
    #[error("invalid SET command expiration")]
    InvalidSetCommandExpiration,
    #[error("invalid INCR command")]
    InvalidIncrCommand,
    #[error("invalid INCR value")]
    InvalidIncrValue,
    #[error("invalid RPUSH command")]
    InvalidRPushCommand,
    #[error("invalid LPUSH command")]
    InvalidLPushCommand,
    #[error("invalid LPOP command")]
    InvalidLPopCommand,
    #[error("invalid LPOP command argument")]
    InvalidLPopCommandArgument,
    #[error("invalid LRANGE command")]
    InvalidLRangeCommand,
    #[error("invalid LRANGE command argument")]
    InvalidLRangeCommandArgument,
    #[error("invalid LLEN command")]
    InvalidLLenCommand,
    #[error("invalid BLPOP command")]
    InvalidBLPopCommand,
    #[error("invalid block timeout")]
    InvalidBlockTimeout,
    #[error("invalid TYPE command")]
    InvalidTypeCommand,
    #[error("invalid XADD command")]
    InvalidXAddCommand,
    #[error("{0}")]
    InvalidStreamId(String),
    #[error("invalid data type for key")]
    InvalidDataTypeForKey,
    #[error("invalid XRANGE command")]
    InvalidXRangeCommand,
    #[error("invalid XREAD command")]
    InvalidXReadCommand,
    #[error("invalid XREAD command option")]
    InvalidXReadOption,
    #[error("invalid SAVE command")]
    InvalidSaveCommand,
    #[error("invalid BGSAVE command")]
    InvalidBgsaveCommand,
    #[error("snapshot failed: {0}")]
    SnapshotFailed(String),
}

impl CommandError {
    /// Renders this error as the RESP error line sent to the client.
    pub fn as_string(&self) -> String {
        let message = match self {
            CommandError::InvalidCommand => "ERR Invalid Unknown Command".to_string(),
            CommandError::InvalidCommandArgument => "ERR Invalid command argument".to_string(),
            CommandError::InvalidPingCommand => {
                "ERR wrong number of arguments for 'ping' command".to_string()
            }
            CommandError::InvalidEchoCommand => {
                "ERR wrong number of arguments for 'echo' command".to_string()
            }
            CommandError::InvalidGetCommand => {
                "ERR wrong number of arguments for 'get' command".to_string()
            }
            CommandError::InvalidSetCommand => {
                "ERR wrong number of arguments for 'set' command".to_string()
            }
            CommandError::SyntaxError => "ERR syntax error".to_string(),
            CommandError::InvalidSetCommandExpiration => "ERR Invalid PX value".to_string(),
            CommandError::InvalidIncrCommand => {
                "ERR wrong number of arguments for 'incr' command".to_string()
            }
            CommandError::InvalidIncrValue => {
                "ERR value is not an integer or out of range".to_string()
            }
            CommandError::InvalidRPushCommand => {
                "ERR wrong number of arguments for 'rpush' command".to_string()
            }
            CommandError::InvalidLPushCommand => {
                "ERR wrong number of arguments for 'lpush' command".to_string()
            }
            CommandError::InvalidLPopCommand => {
                "ERR wrong number of arguments for 'lpop' command".to_string()
            }
            CommandError::InvalidLPopCommandArgument => {
                "ERR value is not an integer or out of range".to_string()
            }
            CommandError::InvalidLRangeCommand => {
                "ERR wrong number of arguments for 'lrange' command".to_string()
            }
            CommandError::InvalidLRangeCommandArgument => {
                "ERR value is not an integer or out of range".to_string()
            }
            CommandError::InvalidLLenCommand => {
                "ERR wrong number of arguments for 'llen' command".to_string()
            }
            CommandError::InvalidBLPopCommand => {
                "ERR wrong number of arguments for 'blpop' command".to_string()
            }
            CommandError::InvalidBlockTimeout => "ERR Invalid block timeout".to_string(),
            CommandError::InvalidTypeCommand => {
                "ERR wrong number of arguments for 'type' command".to_string()
            }
            CommandError::InvalidXAddCommand => {
                "ERR wrong number of arguments for 'xadd' command".to_string()
            }
            CommandError::InvalidStreamId(message) => format!("ERR {}", message),
            CommandError::InvalidDataTypeForKey => "ERR Invalid data type for key".to_string(),
            CommandError::InvalidXRangeCommand => {
                "ERR wrong number of arguments for 'xrange' command".to_string()
            }
            CommandError::InvalidXReadCommand => {
                "ERR wrong number of arguments for 'xread' command".to_string()
            }
            CommandError::InvalidXReadOption => "ERR Invalid XREAD command option".to_string(),
            CommandError::InvalidSaveCommand => {
                "ERR wrong number of arguments for 'save' command".to_string()
            }
            CommandError::InvalidBgsaveCommand => {
                "ERR wrong number of arguments for 'bgsave' command".to_string()
            }
            CommandError::SnapshotFailed(message) => format!("ERR {}", message),
        };

        RespValue::Error(message).encode()
    }
}
