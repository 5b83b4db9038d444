//! Matchmaking core
//!
//! `Matchmaker` owns the waiting pool, the room registry, the user directory
//! and the message log. Each public method is one atomic operation: it
//! validates first, then mutates, then returns the notifications the change
//! produced. Callers dispatch those only after the method returns, so no
//! client ever hears about a room before it exists.

use tracing::{debug, info};

use crate::chat_log::{ChatMessage, InMemoryMessageLog, MessageLog};
use crate::error::MatchError;
use crate::matcher::find_best_match;
use crate::notify::{Event, Notification};
use crate::pool::{WaitingEntry, WaitingPool};
use crate::room::RoomRegistry;
use crate::types::{RoomId, Timestamp, UserId};
use crate::user::{InMemoryDirectory, User, UserDirectory, UserStatus};

/// Result of a committed operation plus the events to send out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

impl<T> Committed<T> {
    fn new(value: T, notifications: Vec<Notification>) -> Self {
        Self {
            value,
            notifications,
        }
    }

    fn quiet(value: T) -> Self {
        Self::new(value, Vec::new())
    }
}

/// What happened to a match request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A partner was found and a room opened
    Matched {
        room_id: RoomId,
        partner_id: UserId,
        common_interest_count: usize,
    },
    /// Nobody suitable; the requester now waits in the pool
    Waiting,
}

/// The matchmaking service
pub struct Matchmaker<D = InMemoryDirectory, L = InMemoryMessageLog> {
    directory: D,
    log: L,
    pool: WaitingPool,
    rooms: RoomRegistry,
}

impl<D: UserDirectory, L: MessageLog> Matchmaker<D, L> {
    pub fn new(directory: D, log: L) -> Self {
        Self {
            directory,
            log,
            pool: WaitingPool::new(),
            rooms: RoomRegistry::new(),
        }
    }

    /// Request a chat partner for `user_id`
    ///
    /// Matches against the best waiting candidate, or puts the requester in
    /// the pool when no candidate shares an interest.
    pub fn request_match(&mut self, user_id: &UserId) -> Result<Committed<MatchOutcome>, MatchError> {
        if user_id.is_blank() {
            return Err(MatchError::Validation("user id is required"));
        }

        let user = self
            .directory
            .get(user_id)
            .ok_or_else(|| MatchError::UserNotFound(user_id.clone()))?;

        if user.is_busy() || self.rooms.rooms_of(user_id).next().is_some() {
            return Err(MatchError::AlreadyInChat(user_id.clone()));
        }
        if self.pool.contains(user_id) {
            return Err(MatchError::AlreadyWaiting(user_id.clone()));
        }

        let entry = WaitingEntry::from(user);
        let best = find_best_match(user_id, &entry.interests, self.pool.snapshot())
            .map(|(candidate, score)| (candidate.user_id.clone(), score));

        let Some((partner_id, score)) = best else {
            self.pool.enqueue(entry)?;
            info!("User {} is waiting ({} in pool)", user_id, self.pool.len());
            return Ok(Committed::quiet(MatchOutcome::Waiting));
        };

        // The candidate came from this same snapshot, but take it out through
        // the pool so a vanished entry fails instead of double-matching.
        self.pool.dequeue(&partner_id)?;
        let room_id = self.create_room(user_id, &partner_id);

        info!(
            "Matched {} with {} in room {} ({} common)",
            user_id, partner_id, room_id, score
        );

        let notifications = vec![
            Notification::user(
                user_id.clone(),
                Event::MatchFound {
                    room_id: room_id.clone(),
                    common_interest_count: score,
                    partner_id: partner_id.clone(),
                    target_user_id: user_id.clone(),
                },
            ),
            Notification::user(
                partner_id.clone(),
                Event::MatchFound {
                    room_id: room_id.clone(),
                    common_interest_count: score,
                    partner_id: user_id.clone(),
                    target_user_id: partner_id.clone(),
                },
            ),
        ];

        Ok(Committed::new(
            MatchOutcome::Matched {
                room_id,
                partner_id,
                common_interest_count: score,
            },
            notifications,
        ))
    }

    /// Withdraw a waiting request
    pub fn cancel_wait(&mut self, user_id: &UserId) -> Result<(), MatchError> {
        if user_id.is_blank() {
            return Err(MatchError::Validation("user id is required"));
        }
        self.pool.dequeue(user_id)?;
        info!("User {} cancelled waiting", user_id);
        Ok(())
    }

    /// End the chat in `room_id` on behalf of `user_id`
    ///
    /// Both participants go back to available whoever initiates. For a room
    /// that is already gone only the initiator's own status is reset. The
    /// committed value is true when an open room was actually closed.
    pub fn close_room(&mut self, room_id: &RoomId, user_id: &UserId) -> Result<Committed<bool>, MatchError> {
        if room_id.is_blank() {
            return Err(MatchError::Validation("room id is required"));
        }
        if user_id.is_blank() {
            return Err(MatchError::Validation("user id is required"));
        }

        let closed = match self.rooms.close(room_id) {
            Some(room) => {
                for participant in &room.participants {
                    self.directory
                        .set_status(participant, UserStatus::Available, None);
                }
                info!("Room {} closed by {}", room_id, user_id);
                true
            }
            None => {
                debug!("Room {} already closed", room_id);
                false
            }
        };

        // An initiator sitting in some other open room keeps that chat
        if self.rooms.rooms_of(user_id).next().is_none() {
            self.directory
                .set_status(user_id, UserStatus::Available, None);
        }

        Ok(Committed::new(
            closed,
            vec![Notification::room(room_id.clone(), Event::ChatEnded)],
        ))
    }

    /// Append a message to the room's history and return it as stored
    ///
    /// The room is not required to be open; a message racing the close of
    /// its room is still stored.
    pub fn post_message(
        &mut self,
        room_id: &RoomId,
        sender: &UserId,
        text: String,
    ) -> Result<Committed<ChatMessage>, MatchError> {
        if room_id.is_blank() {
            return Err(MatchError::Validation("room id is required"));
        }
        if sender.is_blank() {
            return Err(MatchError::Validation("sender is required"));
        }

        let timestamp = self.log.append(room_id, sender.clone(), text.clone());
        debug!("Message from {} in room {} at {}", sender, room_id, timestamp.0);

        let message = ChatMessage {
            sender: sender.clone(),
            text,
            timestamp,
        };
        let notifications = vec![Notification::room(
            room_id.clone(),
            Event::NewMessage {
                room_id: room_id.clone(),
                message: message.clone(),
            },
        )];
        Ok(Committed::new(message, notifications))
    }

    /// Messages of the room newer than `since`; unknown rooms yield nothing
    pub fn fetch_messages(&self, room_id: &RoomId, since: Timestamp) -> Vec<ChatMessage> {
        self.log.query(room_id, since)
    }

    /// Whether the user is currently in a chat; unknown users are not
    pub fn has_active_chat(&self, user_id: &UserId) -> bool {
        self.directory
            .get(user_id)
            .is_some_and(User::has_active_chat)
    }

    /// The user's current room, if any
    pub fn current_room(&self, user_id: &UserId) -> Option<RoomId> {
        self.directory
            .get(user_id)
            .and_then(|u| u.current_room.clone())
    }

    pub fn is_waiting(&self, user_id: &UserId) -> bool {
        self.pool.contains(user_id)
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn message_log(&self) -> &L {
        &self.log
    }

    pub fn pool(&self) -> &WaitingPool {
        &self.pool
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Open a room for the pair and mark both users busy in it
    fn create_room(&mut self, first: &UserId, second: &UserId) -> RoomId {
        let room_id = self.rooms.open(first.clone(), second.clone());
        for user in [first, second] {
            self.directory
                .set_status(user, UserStatus::Busy, Some(room_id.clone()));
        }
        room_id
    }
}

impl<L: MessageLog> Matchmaker<InMemoryDirectory, L> {
    /// Add a new user with the given interests
    pub fn register_user<I, S>(&mut self, user_id: UserId, interests: I) -> Result<(), MatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if user_id.is_blank() {
            return Err(MatchError::Validation("user id is required"));
        }
        let user = User::new(user_id.clone(), interests);
        if !self.directory.insert(user) {
            return Err(MatchError::UserExists(user_id));
        }
        info!("Registered user {}", user_id);
        Ok(())
    }
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new(InMemoryDirectory::new(), InMemoryMessageLog::new())
    }
}
