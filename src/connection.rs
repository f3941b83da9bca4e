use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use bytes::BytesMut;

use crate::commands::{CommandDispatcher, CommandHandler};
use crate::input::{drain_frames, Frame};
use crate::key_value_store::KeyValueStore;
use crate::server::CinderServer;
use crate::state::State;

/// Drives one client connection until EOF or a socket error.
///
/// The task owns the socket and multiplexes two event sources: bytes
/// arriving from the client, and asynchronous replies produced by wake
/// paths (an RPUSH or XADD on another connection, or the timeout reaper)
/// and delivered through this connection's reply channel. All writes to
/// the socket happen on this task, so replies to one client never
/// interleave.
///
/// On disconnect the client is removed from every wait structure and its
/// open transaction is dropped.
pub async fn handle_client_connection(
    stream: TcpStream,
    server: Arc<CinderServer>,
    client_address: String,
    store: Arc<Mutex<KeyValueStore>>,
    state: Arc<Mutex<State>>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut buffer = BytesMut::with_capacity(4096);
    let (reply_sender, mut reply_receiver) = mpsc::unbounded_channel::<String>();

    loop {
        tokio::select! {
            read_result = reader.read_buf(&mut buffer) => {
                match read_result {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let frames = match drain_frames(&mut buffer) {
                            Ok(frames) => frames,
                            Err(error) => {
                                buffer.clear();

                                if write_to_stream(&mut writer, &error.as_string()).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        let mut disconnected = false;

                        for frame in frames {
                            let response = match frame {
                                Frame::InlineReply(reply) => Some(reply),
                                Frame::Command(value) => {
                                    process_command(
                                        &value,
                                        &server,
                                        &client_address,
                                        &store,
                                        &state,
                                        &reply_sender,
                                    )
                                    .await
                                }
                            };

                            if let Some(response) = response {
                                if write_to_stream(&mut writer, &response).await.is_err() {
                                    disconnected = true;
                                    break;
                                }
                            }
                        }

                        if disconnected {
                            break;
                        }
                    }
                }
            }
            Some(async_reply) = reply_receiver.recv() => {
                if write_to_stream(&mut writer, &async_reply).await.is_err() {
                    break;
                }
            }
        }
    }

    let mut state_guard = state.lock().await;
    state_guard.remove_client(&client_address);
    debug!(client = %client_address, "connection closed");
}

/// Parses, dispatches and executes one command, returning the bytes to
/// write now, or `None` when the client was enrolled as a blocked waiter.
async fn process_command(
    value: &crate::resp::RespValue,
    server: &Arc<CinderServer>,
    client_address: &str,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    reply_sender: &mpsc::UnboundedSender<String>,
) -> Option<String> {
    let command_handler = match CommandHandler::new(value) {
        Ok(handler) => handler,
        Err(error) => return Some(error.as_string()),
    };

    let dispatch_result = match CommandDispatcher::new(client_address, Arc::clone(state))
        .dispatch_command(command_handler)
        .await
    {
        Ok(result) => result,
        Err(error) => return Some(error.as_string()),
    };

    dispatch_result
        .handle_dispatch_result(server, client_address, store, state, reply_sender)
        .await
}

async fn write_to_stream(writer: &mut OwnedWriteHalf, response: &str) -> tokio::io::Result<()> {
    if let Err(e) = writer.write_all(response.as_bytes()).await {
        error!("failed to write response: {}", e);
        return Err(e);
    }

    writer.flush().await
}
