//! Server configuration and the main accept loop.
//!
//! `CinderServer` is built from command-line flags, seeds the store from
//! the snapshot file if one exists, spawns the background tasks (string
//! expiry reaper, blocked-client timeout reaper, periodic snapshot), and
//! then accepts connections forever, one tokio task per client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::connection::handle_client_connection;
use crate::key_value_store::{remove_expired_keys, KeyValueStore};
use crate::rdb;
use crate::resp::RespValue;
use crate::state::State;

const STRING_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const WAITER_TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid port flag value")]
    InvalidPortFlagValue,
    #[error("Invalid save interval value")]
    InvalidSaveIntervalValue,
}

/// Configuration for a server instance. No flag is required; the defaults
/// give a server on port 6379 writing `./dump.rdb`.
#[derive(Debug, Clone, PartialEq)]
pub struct CinderServer {
    /// The TCP port number the server listens on
    pub port: u32,
    /// Directory holding the snapshot file
    pub dir: String,
    /// Snapshot file name inside `dir`
    pub dbfilename: String,
    /// Seconds between periodic background snapshots; 0 disables them
    pub save_interval_secs: u64,
}

impl CinderServer {
    /// Creates a server configuration from command-line arguments.
    ///
    /// # Supported Arguments
    ///
    /// * `--port <port>` - Port number to listen on (default: 6379)
    /// * `--dir <path>` - Directory for the snapshot file (default: `.`)
    /// * `--dbfilename <name>` - Snapshot file name (default: `dump.rdb`)
    /// * `--save-interval <secs>` - Periodic snapshot cadence, 0 to disable
    ///   (default: 60)
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);

        let mut port: Option<u32> = None;
        let mut dir: Option<String> = None;
        let mut dbfilename: Option<String> = None;
        let mut save_interval_secs: Option<u64> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let Some(port_str) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    port = Some(validate_port_flag(&port_str)?);
                }
                "--dir" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    dir = Some(value);
                }
                "--dbfilename" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    dbfilename = Some(value);
                }
                "--save-interval" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    let seconds = value
                        .parse::<u64>()
                        .map_err(|_| CliError::InvalidSaveIntervalValue)?;

                    save_interval_secs = Some(seconds);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(CinderServer {
            port: port.unwrap_or(6379),
            dir: dir.unwrap_or_else(|| ".".to_string()),
            dbfilename: dbfilename.unwrap_or_else(|| "dump.rdb".to_string()),
            save_interval_secs: save_interval_secs.unwrap_or(60),
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }

    /// Runs the server until the process is terminated.
    ///
    /// Binds the listener, seeds the store from an existing snapshot,
    /// spawns the background tasks and accepts connections forever. A bind
    /// failure is returned to the caller so the process can exit non-zero.
    pub async fn run(self) -> tokio::io::Result<()> {
        let _ = tracing_subscriber::fmt().try_init();

        let initial_store = match rdb::load(&self.snapshot_path()).await {
            Ok(Some(store)) => {
                info!(
                    path = %self.snapshot_path().display(),
                    keys = store.len(),
                    "snapshot loaded"
                );
                store
            }
            Ok(None) => KeyValueStore::new(),
            Err(e) => {
                warn!(
                    path = %self.snapshot_path().display(),
                    "ignoring unreadable snapshot: {}", e
                );
                KeyValueStore::new()
            }
        };

        let listener = TcpListener::bind(format!("127.0.0.1:{}", self.port)).await?;
        info!(port = self.port, "listening");

        let server = Arc::new(self);
        let store = Arc::new(Mutex::new(initial_store));
        let state = Arc::new(Mutex::new(State::new()));

        tokio::spawn(expire_strings_periodically(Arc::clone(&store)));
        tokio::spawn(reap_blocked_waiters(Arc::clone(&state)));

        if server.save_interval_secs > 0 {
            tokio::spawn(save_periodically(Arc::clone(&server), Arc::clone(&store)));
        }

        loop {
            match listener.accept().await {
                Ok((stream, client_address)) => {
                    debug!(client = %client_address, "accepted connection");

                    tokio::spawn(handle_client_connection(
                        stream,
                        Arc::clone(&server),
                        client_address.to_string(),
                        Arc::clone(&store),
                        Arc::clone(&state),
                    ));
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Background reaper for string TTLs: walks the store under the lock every
/// second and drops expired entries.
async fn expire_strings_periodically(store: Arc<Mutex<KeyValueStore>>) {
    let mut interval = tokio::time::interval(STRING_EXPIRY_SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        let mut store_guard = store.lock().await;
        remove_expired_keys(&mut store_guard);
    }
}

/// Timeout reaper for blocked clients, lists and streams together. A
/// timed-out BLPOP receives a null bulk string, a timed-out XREAD BLOCK a
/// null array. Waiters are removed under the lock before the replies go
/// out, so a producer wake can never reach the same client afterwards.
async fn reap_blocked_waiters(state: Arc<Mutex<State>>) {
    let mut interval = tokio::time::interval(WAITER_TIMEOUT_SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        let (list_waiters, stream_waiters) = {
            let mut state_guard = state.lock().await;
            state_guard.sweep_expired_waiters(tokio::time::Instant::now())
        };

        for waiter in list_waiters {
            let _ = waiter.reply.send(RespValue::NullBulkString.encode());
        }

        for waiter in stream_waiters {
            let _ = waiter.reply.send(RespValue::NullArray.encode());
        }
    }
}

async fn save_periodically(server: Arc<CinderServer>, store: Arc<Mutex<KeyValueStore>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(server.save_interval_secs));
    interval.tick().await;

    loop {
        interval.tick().await;

        let snapshot = {
            let store_guard = store.lock().await;
            store_guard.clone()
        };

        match rdb::save(&server.snapshot_path(), &snapshot).await {
            Ok(()) => debug!("periodic background save completed"),
            Err(e) => error!("periodic background save failed: {}", e),
        }
    }
}

fn validate_port_flag(port: &str) -> Result<u32, CliError> {
    let port_number = port
        .parse::<u32>()
        .map_err(|_| CliError::InvalidPortFlagValue)?;

    if port_number < 1 || port_number > 65535 {
        return Err(CliError::InvalidPortFlagValue);
    }

    Ok(port_number)
}
