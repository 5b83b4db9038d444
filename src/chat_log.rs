//! Append-only per-room message history

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{RoomId, Timestamp, UserId};

/// One chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: UserId,
    pub text: String,
    pub timestamp: Timestamp,
}

/// Message storage used by the matchmaking core
pub trait MessageLog: Send {
    /// Append a message and return the timestamp it was stored with
    fn append(&mut self, room_id: &RoomId, sender: UserId, text: String) -> Timestamp;

    /// Messages of the room newer than `since`, in append order
    fn query(&self, room_id: &RoomId, since: Timestamp) -> Vec<ChatMessage>;
}

/// HashMap-backed message log
///
/// Timestamps are strictly increasing across the whole log, so append order
/// and timestamp order always agree even when the clock stalls or steps back.
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    rooms: HashMap<RoomId, Vec<ChatMessage>>,
    last: Timestamp,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored history
    pub fn from_rooms(rooms: HashMap<RoomId, Vec<ChatMessage>>) -> Self {
        let last = rooms
            .values()
            .flat_map(|msgs| msgs.iter().map(|m| m.timestamp))
            .max()
            .unwrap_or_default();
        Self { rooms, last }
    }

    /// Full history, for snapshotting
    pub fn rooms(&self) -> &HashMap<RoomId, Vec<ChatMessage>> {
        &self.rooms
    }

    fn next_timestamp(&mut self) -> Timestamp {
        let now = Timestamp::now();
        self.last = if now > self.last {
            now
        } else {
            Timestamp(self.last.0 + 1)
        };
        self.last
    }
}

impl MessageLog for InMemoryMessageLog {
    fn append(&mut self, room_id: &RoomId, sender: UserId, text: String) -> Timestamp {
        let timestamp = self.next_timestamp();
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .push(ChatMessage {
                sender,
                text,
                timestamp,
            });
        timestamp
    }

    fn query(&self, room_id: &RoomId, since: Timestamp) -> Vec<ChatMessage> {
        self.rooms
            .get(room_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| m.timestamp > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
