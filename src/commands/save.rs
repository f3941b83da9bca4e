use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::rdb;
use crate::resp::RespValue;
use crate::server::CinderServer;

pub struct SaveArguments;

impl SaveArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::InvalidSaveCommand);
        }

        Ok(Self)
    }
}

pub struct BgsaveArguments;

impl BgsaveArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::InvalidBgsaveCommand);
        }

        Ok(Self)
    }
}

/// Handles the SAVE command: serializes the stores synchronously and
/// replies `+OK\r\n`, or an error line if the write fails.
pub async fn save(
    server: &Arc<CinderServer>,
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    SaveArguments::parse(arguments)?;

    let bytes = {
        let store_guard = store.lock().await;
        rdb::serialize_snapshot(&store_guard)
    };

    let path = server.snapshot_path();
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| CommandError::SnapshotFailed(e.to_string()))?;

    info!(path = %path.display(), "snapshot saved");

    Ok(RespValue::SimpleString("OK".to_string()).encode())
}

/// Handles the BGSAVE command: clones the stores under the lock, writes the
/// snapshot on a background task, and replies immediately.
pub async fn bgsave(
    server: &Arc<CinderServer>,
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    BgsaveArguments::parse(arguments)?;

    let snapshot = {
        let store_guard = store.lock().await;
        store_guard.clone()
    };

    let path = server.snapshot_path();
    tokio::spawn(async move {
        match rdb::save(&path, &snapshot).await {
            Ok(()) => info!(path = %path.display(), "background saving completed"),
            Err(e) => error!(path = %path.display(), "background saving failed: {}", e),
        }
    });

    Ok(RespValue::SimpleString("Background saving started".to_string()).encode())
}

#[cfg(test)]
mod tests {
    use crate::key_value_store::{DataType, Value};

    use super::*;

    fn test_server(dbfilename: &str) -> Arc<CinderServer> {
        let args = vec![
            "cinder".to_string(),
            "--dir".to_string(),
            std::env::temp_dir().display().to_string(),
            "--dbfilename".to_string(),
            dbfilename.to_string(),
        ];

        Arc::new(CinderServer::new(args).unwrap())
    }

    #[tokio::test]
    async fn test_save_writes_loadable_snapshot() {
        let server = test_server(&format!("cinder-save-test-{}.rdb", std::process::id()));
        let store = Arc::new(Mutex::new(KeyValueStore::from([(
            "k".to_string(),
            Value {
                data: DataType::String("v".to_string()),
                expiration: None,
            },
        )])));

        let response = save(&server, &store, vec![]).await;
        assert_eq!(response, Ok("+OK\r\n".to_string()));

        let restored = rdb::load(&server.snapshot_path()).await.unwrap().unwrap();
        let _ = tokio::fs::remove_file(server.snapshot_path()).await;

        assert_eq!(
            restored.get("k").unwrap().data,
            DataType::String("v".to_string())
        );
    }

    #[tokio::test]
    async fn test_bgsave_replies_immediately() {
        let server = test_server(&format!("cinder-bgsave-test-{}.rdb", std::process::id()));
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        let response = bgsave(&server, &store, vec![]).await;
        assert_eq!(
            response,
            Ok("+Background saving started\r\n".to_string())
        );

        // Wait for the background writer before cleaning up.
        for _ in 0..50 {
            if tokio::fs::metadata(server.snapshot_path()).await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let _ = tokio::fs::remove_file(server.snapshot_path()).await;
    }

    #[tokio::test]
    async fn test_save_rejects_arguments() {
        let server = test_server("unused.rdb");
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        let response = save(&server, &store, vec!["extra".to_string()]).await;
        assert_eq!(response, Err(CommandError::InvalidSaveCommand));
    }
}
