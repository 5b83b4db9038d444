//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! message parsing, and bidirectional communication with the ChatServer.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::ServerCommand;
use crate::types::{ClientId, RoomId, UserId};

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, sets up bidirectional communication,
/// and manages the connection lifecycle. `client_buffer` bounds the
/// outbound queue; notifications that do not fit are dropped.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    client_buffer: usize,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Generate client ID
    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    // Create channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(client_buffer);
    let error_tx = msg_tx.clone();

    // Register with ChatServer
    if cmd_tx
        .send(ServerCommand::Connect {
            client_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register client {} - server closed", client_id);
        return Err(AppError::ChannelSend);
    }

    // Send connection success message
    let connected_msg = ServerMessage::Connected {
        client_id: client_id.to_string(),
    };
    let json = serde_json::to_string(&connected_msg)?;
    ws_sender.send(Message::Text(json.into())).await?;

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        let cmd = client_message_to_command(client_id, client_msg);
                        if cmd_tx_read.send(cmd).await.is_err() {
                            debug!("Server closed, ending read task for {}", client_id);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Invalid JSON from {}: {}", client_id, e);
                        let _ = error_tx.send(AppError::Json(e).into()).await;
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", client_id);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", client_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Spawn write task (ServerMessage -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for client");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", client_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", client_id);
        }
    }

    // Send disconnect command
    let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;

    info!("Client {} disconnected", client_id);

    Ok(())
}

/// Convert a ClientMessage to a ServerCommand
pub fn client_message_to_command(client_id: ClientId, msg: ClientMessage) -> ServerCommand {
    match msg {
        ClientMessage::Register { user_id, interests } => ServerCommand::Register {
            client_id,
            user_id: UserId::new(user_id),
            interests,
        },
        ClientMessage::JoinUserRoom { user_id } => ServerCommand::JoinUserRoom {
            client_id,
            user_id: UserId::new(user_id),
        },
        ClientMessage::JoinRoom { room_id } => ServerCommand::JoinRoom {
            client_id,
            room_id: RoomId::new(room_id),
        },
        ClientMessage::LeaveRoom { room_id } => ServerCommand::LeaveRoom {
            client_id,
            room_id: RoomId::new(room_id),
        },
        ClientMessage::RequestMatch { user_id } => ServerCommand::RequestMatch {
            client_id,
            user_id: UserId::new(user_id),
        },
        ClientMessage::CancelWait { user_id } => ServerCommand::CancelWait {
            client_id,
            user_id: UserId::new(user_id),
        },
        ClientMessage::EndChat { room_id, user_id } => ServerCommand::EndChat {
            client_id,
            room_id: RoomId::new(room_id),
            user_id: UserId::new(user_id),
        },
        ClientMessage::SendMessage {
            room_id,
            sender,
            text,
        } => ServerCommand::SendMessage {
            client_id,
            room_id: RoomId::new(room_id),
            sender: UserId::new(sender),
            text,
        },
        ClientMessage::FetchMessages { room_id, since } => ServerCommand::FetchMessages {
            client_id,
            room_id: RoomId::new(room_id),
            since,
        },
        ClientMessage::CheckActive { user_id } => ServerCommand::CheckActive {
            client_id,
            user_id: UserId::new(user_id),
        },
        ClientMessage::GetRoom { user_id } => ServerCommand::GetRoom {
            client_id,
            user_id: UserId::new(user_id),
        },
    }
}
