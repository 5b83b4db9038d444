//! Error types for the chat server
//!
//! Defines matchmaking errors, application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{RoomId, UserId};

/// Matchmaking errors
///
/// Returned by the core operations. Every one of them leaves shared
/// state exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Identity is not registered in the directory
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// User already sits in the waiting pool
    #[error("User is already waiting: {0}")]
    AlreadyWaiting(UserId),

    /// User already has an open room
    #[error("User is already in a chat: {0}")]
    AlreadyInChat(UserId),

    /// Cancel or dequeue for a user that is not waiting
    #[error("User is not waiting: {0}")]
    NotWaiting(UserId),

    /// Room id is not registered
    ///
    /// Reserved: closing an unknown room is a soft success and posting or
    /// fetching works on any room id, so no core operation returns it today.
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Registration for an identity that already exists
    #[error("User already exists: {0}")]
    UserExists(UserId),

    /// A required identifier was missing or blank
    #[error("Validation error: {0}")]
    Validation(&'static str),
}

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Matchmaking rejected the operation
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Snapshot persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read snapshot at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write snapshot at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client's outbound buffer is full; the frame was dropped
    #[error("Channel full")]
    ChannelFull,
}
