//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::chat_log::ChatMessage;
use crate::error::{AppError, MatchError};
use crate::notify::Event;
use crate::types::{RoomId, Timestamp, UserId};

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
/// Missing identifiers deserialize as blank and are rejected by validation.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register a user with their interests
    Register {
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        interests: Vec<String>,
    },
    /// Bind this connection to a user to receive match notifications
    JoinUserRoom {
        #[serde(default)]
        user_id: String,
    },
    /// Subscribe to a chat room's broadcasts
    JoinRoom {
        #[serde(default)]
        room_id: String,
    },
    /// Unsubscribe from a chat room's broadcasts
    LeaveRoom {
        #[serde(default)]
        room_id: String,
    },
    /// Ask for a chat partner
    RequestMatch {
        #[serde(default)]
        user_id: String,
    },
    /// Stop waiting for a partner
    CancelWait {
        #[serde(default)]
        user_id: String,
    },
    /// End the current chat
    EndChat {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        user_id: String,
    },
    /// Post a chat message
    SendMessage {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        sender: String,
        #[serde(default)]
        text: String,
    },
    /// Poll a room's history
    FetchMessages {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        since: Timestamp,
    },
    /// Ask whether a user is in a chat
    CheckActive {
        #[serde(default)]
        user_id: String,
    },
    /// Ask for a user's current room
    GetRoom {
        #[serde(default)]
        user_id: String,
    },
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection successful, client ID issued
    Connected { client_id: String },
    /// User registered
    Registered { user_id: UserId },
    /// Connection now receives this user's notifications
    UserRoomJoined { user_id: UserId },
    /// Subscribed to a chat room
    RoomJoined { room_id: RoomId },
    /// Unsubscribed from a chat room
    RoomLeft { room_id: RoomId },
    /// Match request answered with a room
    Matched {
        room_id: RoomId,
        common_interest_count: usize,
    },
    /// Match request parked in the waiting pool
    Waiting,
    /// Waiting request withdrawn
    WaitCancelled,
    /// End-chat request processed
    ChatClosed { room_id: RoomId },
    /// Message stored
    MessageSent { timestamp: Timestamp },
    /// Room history
    Messages {
        room_id: RoomId,
        messages: Vec<ChatMessage>,
    },
    /// Answer to check_active
    ActiveChat { has_active_chat: bool },
    /// Answer to get_room
    CurrentRoom { room_id: Option<RoomId> },
    /// A partner was found (pushed to each matched user)
    MatchFound {
        room_id: RoomId,
        common_interest_count: usize,
        partner_id: UserId,
        target_user_id: UserId,
    },
    /// The chat was ended by either side (pushed to the room)
    ChatEnded,
    /// New message in a subscribed room
    NewMessage {
        room_id: RoomId,
        sender: UserId,
        text: String,
        timestamp: Timestamp,
    },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
///
/// Represents different error scenarios that can be communicated to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Identity not registered
    UserNotFound,
    /// Already in the waiting pool
    AlreadyWaiting,
    /// Already has an open room
    AlreadyInChat,
    /// Not in the waiting pool
    NotWaiting,
    /// Non-existent room id; reserved, mirrors `MatchError::RoomNotFound`
    RoomNotFound,
    /// Identity taken at registration
    UserExists,
    /// Missing required identifier
    ValidationError,
    /// Invalid message format
    InvalidMessage,
}

impl From<&Event> for ServerMessage {
    fn from(event: &Event) -> Self {
        match event {
            Event::MatchFound {
                room_id,
                common_interest_count,
                partner_id,
                target_user_id,
            } => ServerMessage::MatchFound {
                room_id: room_id.clone(),
                common_interest_count: *common_interest_count,
                partner_id: partner_id.clone(),
                target_user_id: target_user_id.clone(),
            },
            Event::ChatEnded => ServerMessage::ChatEnded,
            Event::NewMessage { room_id, message } => ServerMessage::NewMessage {
                room_id: room_id.clone(),
                sender: message.sender.clone(),
                text: message.text.clone(),
                timestamp: message.timestamp,
            },
        }
    }
}

impl From<MatchError> for ServerMessage {
    fn from(err: MatchError) -> Self {
        let code = match &err {
            MatchError::UserNotFound(_) => ErrorCode::UserNotFound,
            MatchError::AlreadyWaiting(_) => ErrorCode::AlreadyWaiting,
            MatchError::AlreadyInChat(_) => ErrorCode::AlreadyInChat,
            MatchError::NotWaiting(_) => ErrorCode::NotWaiting,
            MatchError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            MatchError::UserExists(_) => ErrorCode::UserExists,
            MatchError::Validation(_) => ErrorCode::ValidationError,
        };
        ServerMessage::Error {
            code,
            message: err.to_string(),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Match(e) => e.into(),
            AppError::Json(e) => ServerMessage::Error {
                code: ErrorCode::InvalidMessage,
                message: format!("Invalid message format: {}", e),
            },
            // Fatal errors are not typically converted (connection closes)
            _ => ServerMessage::Error {
                code: ErrorCode::InvalidMessage,
                message: "Internal error".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialize() {
        let json = r#"{"type": "register", "user_id": "alice", "interests": ["chess"]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Register { user_id, interests } => {
                assert_eq!(user_id, "alice");
                assert_eq!(interests, vec!["chess"]);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_missing_ids_default_blank() {
        let json = r#"{"type": "end_chat"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::EndChat { room_id, user_id } => {
                assert!(room_id.is_empty());
                assert!(user_id.is_empty());
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_fetch_since_defaults_to_zero() {
        let json = r#"{"type": "fetch_messages", "room_id": "room_1_1000"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::FetchMessages { since, .. } => assert_eq!(since, Timestamp::ZERO),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_match_found_serialize() {
        let event = Event::MatchFound {
            room_id: RoomId::new("room_1_1000"),
            common_interest_count: 2,
            partner_id: UserId::new("bob"),
            target_user_id: UserId::new("alice"),
        };
        let json = serde_json::to_string(&ServerMessage::from(&event)).unwrap();
        assert!(json.contains("\"type\":\"match_found\""));
        assert!(json.contains("\"room_id\":\"room_1_1000\""));
        assert!(json.contains("\"common_interest_count\":2"));
        assert!(json.contains("\"partner_id\":\"bob\""));
        assert!(json.contains("\"target_user_id\":\"alice\""));
    }

    #[test]
    fn test_chat_ended_serialize() {
        let json = serde_json::to_string(&ServerMessage::ChatEnded).unwrap();
        assert_eq!(json, r#"{"type":"chat_ended"}"#);
    }

    #[test]
    fn test_error_code_serialize() {
        let msg: ServerMessage = MatchError::AlreadyWaiting(UserId::new("alice")).into();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"code\":\"already_waiting\""));
    }

    #[test]
    fn test_room_not_found_keeps_wire_code() {
        let msg: ServerMessage = MatchError::RoomNotFound(RoomId::new("room_1_1000")).into();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"code\":\"room_not_found\""));
        assert!(json.contains("room_1_1000"));
    }
}
