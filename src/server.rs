//! ChatServer Actor implementation
//!
//! The central actor that owns the matchmaking core and all connected clients.
//! Commands are processed one at a time, so every matchmaking operation runs
//! as a single critical section. Notifications go out only after the
//! operation has committed.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::{MatchError, SendError};
use crate::matchmaker::{MatchOutcome, Matchmaker};
use crate::message::ServerMessage;
use crate::notify::{dispatch, Event, Notification, Notifier};
use crate::store::SnapshotWriter;
use crate::types::{ClientId, RoomId, Timestamp, UserId};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client disconnected
    Disconnect {
        client_id: ClientId,
    },
    /// Register a user
    Register {
        client_id: ClientId,
        user_id: UserId,
        interests: Vec<String>,
    },
    /// Bind the connection to a user identity
    JoinUserRoom {
        client_id: ClientId,
        user_id: UserId,
    },
    /// Subscribe to a chat room
    JoinRoom {
        client_id: ClientId,
        room_id: RoomId,
    },
    /// Unsubscribe from a chat room
    LeaveRoom {
        client_id: ClientId,
        room_id: RoomId,
    },
    /// Ask for a partner
    RequestMatch {
        client_id: ClientId,
        user_id: UserId,
    },
    /// Stop waiting
    CancelWait {
        client_id: ClientId,
        user_id: UserId,
    },
    /// End a chat
    EndChat {
        client_id: ClientId,
        room_id: RoomId,
        user_id: UserId,
    },
    /// Post a chat message
    SendMessage {
        client_id: ClientId,
        room_id: RoomId,
        sender: UserId,
        text: String,
    },
    /// Poll a room's messages
    FetchMessages {
        client_id: ClientId,
        room_id: RoomId,
        since: Timestamp,
    },
    /// Is the user in a chat
    CheckActive {
        client_id: ClientId,
        user_id: UserId,
    },
    /// The user's current room
    GetRoom {
        client_id: ClientId,
        user_id: UserId,
    },
}

/// Pushes events to connected clients by user binding or room subscription
struct Subscribers<'a> {
    clients: &'a HashMap<ClientId, Client>,
}

impl Subscribers<'_> {
    fn push_where<P>(&self, event: &Event, wanted: P)
    where
        P: Fn(&Client) -> bool,
    {
        for client in self.clients.values().filter(|c| wanted(*c)) {
            if let Err(e) = client.push(ServerMessage::from(event)) {
                warn!("Dropped notification for client {}: {}", client.id, e);
            }
        }
    }
}

impl Notifier for Subscribers<'_> {
    fn notify_user(&self, user_id: &UserId, event: &Event) {
        self.push_where(event, |c| c.is_user(user_id));
    }

    fn notify_room(&self, room_id: &RoomId, event: &Event) {
        self.push_where(event, |c| c.in_room(room_id));
    }
}

/// The main ChatServer actor
///
/// Manages all state and processes commands from client handlers.
/// Handlers never await: every frame to a client is a `try_send`.
pub struct ChatServer {
    /// All connected clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// Waiting pool, rooms, users and messages
    matchmaker: Matchmaker,
    /// Snapshot writer, if persistence is enabled
    snapshots: Option<SnapshotWriter>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with an empty matchmaker
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self::with_matchmaker(receiver, Matchmaker::default())
    }

    /// Create a ChatServer around an existing matchmaker
    pub fn with_matchmaker(receiver: mpsc::Receiver<ServerCommand>, matchmaker: Matchmaker) -> Self {
        Self {
            clients: HashMap::new(),
            matchmaker,
            snapshots: None,
            receiver,
        }
    }

    /// Hand users and appended messages to `writer` after each change
    pub fn with_snapshots(mut self, writer: SnapshotWriter) -> Self {
        self.snapshots = Some(writer);
        self
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped,
    /// then flushes pending snapshots.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");

        if let Some(writer) = self.snapshots.take() {
            writer.close().await;
        }
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            ServerCommand::Register {
                client_id,
                user_id,
                interests,
            } => {
                self.handle_register(client_id, user_id, interests);
            }
            ServerCommand::JoinUserRoom { client_id, user_id } => {
                self.handle_join_user_room(client_id, user_id);
            }
            ServerCommand::JoinRoom { client_id, room_id } => {
                self.handle_join_room(client_id, room_id);
            }
            ServerCommand::LeaveRoom { client_id, room_id } => {
                self.handle_leave_room(client_id, room_id);
            }
            ServerCommand::RequestMatch { client_id, user_id } => {
                self.handle_request_match(client_id, user_id);
            }
            ServerCommand::CancelWait { client_id, user_id } => {
                self.handle_cancel_wait(client_id, user_id);
            }
            ServerCommand::EndChat {
                client_id,
                room_id,
                user_id,
            } => {
                self.handle_end_chat(client_id, room_id, user_id);
            }
            ServerCommand::SendMessage {
                client_id,
                room_id,
                sender,
                text,
            } => {
                self.handle_send_message(client_id, room_id, sender, text);
            }
            ServerCommand::FetchMessages {
                client_id,
                room_id,
                since,
            } => {
                let messages = self.matchmaker.fetch_messages(&room_id, since);
                self.reply(client_id, ServerMessage::Messages { room_id, messages });
            }
            ServerCommand::CheckActive { client_id, user_id } => {
                let has_active_chat = self.matchmaker.has_active_chat(&user_id);
                self.reply(client_id, ServerMessage::ActiveChat { has_active_chat });
            }
            ServerCommand::GetRoom { client_id, user_id } => {
                let room_id = self.matchmaker.current_room(&user_id);
                self.reply(client_id, ServerMessage::CurrentRoom { room_id });
            }
        }
    }

    /// Handle new client connection
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        info!("Client {} connected", client_id);
        let client = Client::new(client_id, sender);
        self.clients.insert(client_id, client);
        debug!(
            "Total clients: {}, Open rooms: {}, Waiting: {}",
            self.clients.len(),
            self.matchmaker.rooms().len(),
            self.matchmaker.pool().len()
        );
    }

    /// Handle client disconnection
    ///
    /// Only the connection goes away. The user's wait or chat is untouched.
    fn handle_disconnect(&mut self, client_id: ClientId) {
        if let Some(client) = self.clients.remove(&client_id) {
            info!(
                "Client {} disconnected (user: {:?})",
                client_id,
                client.user_id.as_ref().map(UserId::as_str)
            );
        }
        debug!("Total clients: {}", self.clients.len());
    }

    fn handle_register(&mut self, client_id: ClientId, user_id: UserId, interests: Vec<String>) {
        match self.matchmaker.register_user(user_id.clone(), &interests) {
            Ok(()) => {
                self.persist_users();
                self.reply(client_id, ServerMessage::Registered { user_id });
            }
            Err(e) => self.reject(client_id, e),
        }
    }

    /// Bind the connection to a user so match notifications reach it
    fn handle_join_user_room(&mut self, client_id: ClientId, user_id: UserId) {
        if user_id.is_blank() {
            self.reject(client_id, MatchError::Validation("user id is required"));
            return;
        }
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };

        client.bind_user(user_id.clone());
        info!("Client {} joined user room {}", client_id, user_id);

        self.reply(client_id, ServerMessage::UserRoomJoined { user_id });
    }

    fn handle_join_room(&mut self, client_id: ClientId, room_id: RoomId) {
        if room_id.is_blank() {
            self.reject(client_id, MatchError::Validation("room id is required"));
            return;
        }
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };

        if client.join_room(room_id.clone()) {
            debug!("Client {} subscribed to room {}", client_id, room_id);
        }

        self.reply(client_id, ServerMessage::RoomJoined { room_id });
    }

    /// Unsubscribe only; the user's chat status is left alone
    fn handle_leave_room(&mut self, client_id: ClientId, room_id: RoomId) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };

        if client.leave_room(&room_id) {
            debug!("Client {} unsubscribed from room {}", client_id, room_id);
        }

        self.reply(client_id, ServerMessage::RoomLeft { room_id });
    }

    fn handle_request_match(&mut self, client_id: ClientId, user_id: UserId) {
        let committed = match self.matchmaker.request_match(&user_id) {
            Ok(committed) => committed,
            Err(e) => return self.reject(client_id, e),
        };

        let reply = match &committed.value {
            MatchOutcome::Matched {
                room_id,
                common_interest_count,
                ..
            } => {
                self.persist_users();
                ServerMessage::Matched {
                    room_id: room_id.clone(),
                    common_interest_count: *common_interest_count,
                }
            }
            MatchOutcome::Waiting => ServerMessage::Waiting,
        };

        self.notify(&committed.notifications);
        self.reply(client_id, reply);
    }

    fn handle_cancel_wait(&mut self, client_id: ClientId, user_id: UserId) {
        match self.matchmaker.cancel_wait(&user_id) {
            Ok(()) => self.reply(client_id, ServerMessage::WaitCancelled),
            Err(e) => self.reject(client_id, e),
        }
    }

    fn handle_end_chat(&mut self, client_id: ClientId, room_id: RoomId, user_id: UserId) {
        let committed = match self.matchmaker.close_room(&room_id, &user_id) {
            Ok(committed) => committed,
            Err(e) => return self.reject(client_id, e),
        };

        self.persist_users();
        self.notify(&committed.notifications);
        self.reply(client_id, ServerMessage::ChatClosed { room_id });
    }

    fn handle_send_message(
        &mut self,
        client_id: ClientId,
        room_id: RoomId,
        sender: UserId,
        text: String,
    ) {
        let committed = match self.matchmaker.post_message(&room_id, &sender, text) {
            Ok(committed) => committed,
            Err(e) => return self.reject(client_id, e),
        };

        let timestamp = committed.value.timestamp;
        if let Some(writer) = &self.snapshots {
            writer.append_message(room_id, committed.value);
        }
        self.notify(&committed.notifications);
        self.reply(client_id, ServerMessage::MessageSent { timestamp });
    }

    /// Helper: Deliver committed notifications
    fn notify(&self, notifications: &[Notification]) {
        let subscribers = Subscribers {
            clients: &self.clients,
        };
        dispatch(&subscribers, notifications);
    }

    /// Helper: Send a direct response to the requesting client
    ///
    /// A full outbound buffer drops the response rather than stall the actor.
    fn reply(&self, client_id: ClientId, msg: ServerMessage) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };
        match client.push(msg) {
            Ok(()) => {}
            Err(SendError::ChannelFull) => {
                warn!("Client {} is not reading; dropped response", client_id);
            }
            Err(SendError::ChannelClosed) => {
                debug!("Client {} is gone; dropped response", client_id);
            }
        }
    }

    /// Helper: Report a rejected operation to the requesting client
    fn reject(&self, client_id: ClientId, err: MatchError) {
        debug!("Client {} request rejected: {}", client_id, err);
        self.reply(client_id, err.into());
    }

    fn persist_users(&self) {
        if let Some(writer) = &self.snapshots {
            writer.save_users(self.matchmaker.directory().users());
        }
    }
}
