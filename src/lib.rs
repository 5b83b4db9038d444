//! Interest-Matched 1:1 Chat Server Library
//!
//! An anonymous chat-pairing server built with tokio-tungstenite. Users
//! register with a list of interests, ask for a partner, get paired with the
//! waiting user they share the most interests with, and chat in a transient
//! two-party room.
//!
//! # Features
//! - User registration with interest tags
//! - Best-match pairing by shared interest count (ties go to the longest waiter)
//! - Waiting pool with cancel
//! - Room lifecycle: open on match, close from either side
//! - Message history with polling and live push
//! - `match_found` / `chat_ended` notifications
//! - Optional JSON snapshots of users and messages
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the `Matchmaker` and all clients
//! - Each connection has a `handler` task communicating with the server
//! - Each command runs to completion before the next, so matchmaking needs no locks
//! - Core operations return their notifications; the actor delivers them after commit
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use pairchat_server::{ChatServer, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx, 32));
//!     }
//! }
//! ```

pub mod chat_log;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod matchmaker;
pub mod message;
pub mod notify;
pub mod pool;
pub mod room;
pub mod server;
pub mod store;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use chat_log::{ChatMessage, InMemoryMessageLog, MessageLog};
pub use client::Client;
pub use config::ServerConfig;
pub use error::{AppError, MatchError, SendError, StoreError};
pub use handler::handle_connection;
pub use matcher::{find_best_match, score};
pub use matchmaker::{Committed, MatchOutcome, Matchmaker};
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use notify::{dispatch, Event, Notification, Notifier, Target};
pub use pool::{WaitingEntry, WaitingPool};
pub use room::{Room, RoomRegistry};
pub use server::{ChatServer, ServerCommand};
pub use store::{MessageHistory, SnapshotStore, SnapshotWriter};
pub use types::{ClientId, RoomId, Timestamp, UserId};
pub use user::{InMemoryDirectory, User, UserDirectory, UserStatus};
