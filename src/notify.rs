//! Notification contract
//!
//! Core operations never push events themselves. They commit their state
//! change and hand back the `Notification`s it produced; the caller then
//! passes them to a `Notifier`. Delivery is fire-and-forget, at most once.

use crate::chat_log::ChatMessage;
use crate::types::{RoomId, UserId};

/// Events pushed to connected clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Sent to each matched user with fields from their own point of view
    MatchFound {
        room_id: RoomId,
        common_interest_count: usize,
        partner_id: UserId,
        target_user_id: UserId,
    },
    /// Broadcast to the room when either side ends the chat
    ChatEnded,
    /// Broadcast to the room after a message is appended
    NewMessage {
        room_id: RoomId,
        message: ChatMessage,
    },
}

/// Who an event goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(UserId),
    Room(RoomId),
}

/// An event addressed to a user or a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: Target,
    pub event: Event,
}

impl Notification {
    pub fn user(user_id: UserId, event: Event) -> Self {
        Self {
            target: Target::User(user_id),
            event,
        }
    }

    pub fn room(room_id: RoomId, event: Event) -> Self {
        Self {
            target: Target::Room(room_id),
            event,
        }
    }
}

/// Delivers events to connected clients
pub trait Notifier {
    fn notify_user(&self, user_id: &UserId, event: &Event);
    fn notify_room(&self, room_id: &RoomId, event: &Event);
}

/// Hand a batch of committed notifications to the notifier, in order
pub fn dispatch<N: Notifier + ?Sized>(notifier: &N, notifications: &[Notification]) {
    for n in notifications {
        match &n.target {
            Target::User(user_id) => notifier.notify_user(user_id, &n.event),
            Target::Room(room_id) => notifier.notify_room(room_id, &n.event),
        }
    }
}
