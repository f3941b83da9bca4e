mod blpop;
mod command_dispatcher;
mod command_error;
mod command_handler;
mod echo;
mod get;
mod incr;
mod llen;
mod lpop;
mod lrange;
mod ping;
mod rpush_and_lpush;
mod save;
mod set;
mod stream_utils;
mod type_command;
mod xadd;
mod xrange;
mod xread;

pub use command_dispatcher::{CommandDispatcher, DispatchError, DispatchResult};
pub use command_error::CommandError;
pub use command_handler::{CommandHandler, CommandResult};
