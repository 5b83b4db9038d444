//! User directory
//!
//! Holds each user's identity, interests and current status. The matchmaking
//! core only goes through the `UserDirectory` trait, so any backing store can
//! stand in for the in-memory one.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{RoomId, UserId};

/// Availability of a user for matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Available,
    Busy,
}

/// A registered user
///
/// `status == Busy` always goes together with `current_room == Some(..)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub current_room: Option<RoomId>,
}

impl User {
    /// Create an available user, normalizing interest tags
    ///
    /// Tags are trimmed and blank tags dropped; duplicates collapse.
    pub fn new<I, S>(id: UserId, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let interests = interests
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        Self {
            id,
            interests,
            status: UserStatus::Available,
            current_room: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status == UserStatus::Busy
    }

    /// Busy with a room reference
    pub fn has_active_chat(&self) -> bool {
        self.is_busy() && self.current_room.is_some()
    }
}

/// The narrow view of the user store the matchmaking core needs
pub trait UserDirectory: Send {
    /// Look up a user by identity
    fn get(&self, id: &UserId) -> Option<&User>;

    /// Set status and room reference; returns false for an unknown user
    fn set_status(&mut self, id: &UserId, status: UserStatus, room: Option<RoomId>) -> bool;

    fn exists(&self, id: &UserId) -> bool {
        self.get(id).is_some()
    }
}

/// HashMap-backed user directory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: HashMap<UserId, User>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from previously stored users
    ///
    /// No room survives a restart, so every user comes back available.
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users
            .into_iter()
            .map(|mut user| {
                user.status = UserStatus::Available;
                user.current_room = None;
                (user.id.clone(), user)
            })
            .collect();
        Self { users }
    }

    /// Insert a new user; returns false if the identity is taken
    pub fn insert(&mut self, user: User) -> bool {
        if self.users.contains_key(&user.id) {
            return false;
        }
        self.users.insert(user.id.clone(), user);
        true
    }

    /// All users sorted by identity
    pub fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for InMemoryDirectory {
    fn get(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    fn set_status(&mut self, id: &UserId, status: UserStatus, room: Option<RoomId>) -> bool {
        let Some(user) = self.users.get_mut(id) else {
            return false;
        };
        user.status = status;
        user.current_room = room;
        true
    }
}
