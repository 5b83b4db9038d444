//! Client struct definition
//!
//! Represents a connected client with its subscriptions and communication channel.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, RoomId, UserId};

/// Connected client information
///
/// A connection starts anonymous. Joining a user room binds it to a user
/// identity for match notifications; joining chat rooms subscribes it to
/// their broadcasts.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Bound user identity (None before join_user_room)
    pub user_id: Option<UserId>,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerMessage>,
    /// Chat rooms this connection listens to
    pub rooms: HashSet<RoomId>,
}

impl Client {
    /// Create a new client with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            user_id: None,
            sender,
            rooms: HashSet::new(),
        }
    }

    /// Push a message without waiting for buffer space
    ///
    /// The actor never awaits a client. A slow or gone client loses the frame.
    pub fn push(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::ChannelFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Bind this connection to a user identity
    pub fn bind_user(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
    }

    pub fn is_user(&self, user_id: &UserId) -> bool {
        self.user_id.as_ref() == Some(user_id)
    }

    /// Subscribe to a room; returns false if already subscribed
    pub fn join_room(&mut self, room_id: RoomId) -> bool {
        self.rooms.insert(room_id)
    }

    /// Unsubscribe from a room; returns false if not subscribed
    pub fn leave_room(&mut self, room_id: &RoomId) -> bool {
        self.rooms.remove(room_id)
    }

    pub fn in_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let client = Client::new(ClientId::new(), tx);

        assert!(client.user_id.is_none());
        assert!(client.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_client_bind_user() {
        let (tx, _rx) = mpsc::channel(32);
        let mut client = Client::new(ClientId::new(), tx);
        let alice = UserId::new("alice");

        assert!(!client.is_user(&alice));
        client.bind_user(alice.clone());
        assert!(client.is_user(&alice));
    }

    #[tokio::test]
    async fn test_client_rooms() {
        let (tx, _rx) = mpsc::channel(32);
        let mut client = Client::new(ClientId::new(), tx);
        let room = RoomId::new("room_1_1000");

        assert!(client.join_room(room.clone()));
        assert!(!client.join_room(room.clone()));
        assert!(client.in_room(&room));
        assert!(client.leave_room(&room));
        assert!(!client.in_room(&room));
    }

    #[tokio::test]
    async fn test_push_full_and_closed() {
        let (tx, rx) = mpsc::channel(1);
        let client = Client::new(ClientId::new(), tx);

        client.push(ServerMessage::Waiting).unwrap();
        assert!(matches!(
            client.push(ServerMessage::Waiting),
            Err(SendError::ChannelFull)
        ));

        drop(rx);
        assert!(matches!(
            client.push(ServerMessage::Waiting),
            Err(SendError::ChannelClosed)
        ));
    }
}
