//! Room struct and registry
//!
//! Represents a 1:1 chat room created by a successful match. A room is open
//! while it sits in the registry; closing removes it.

use std::collections::{HashMap, HashSet};

use crate::types::{RoomId, UserId};

/// 1:1 Chat Room
///
/// Holds exactly two participants, in the order they were matched:
/// the requester first, then the partner taken from the pool.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room id for identification
    pub id: RoomId,
    /// Matched pair
    pub participants: [UserId; 2],
}

impl Room {
    /// Create a new room for the given pair
    pub fn new(id: RoomId, first: UserId, second: UserId) -> Self {
        Self {
            id,
            participants: [first, second],
        }
    }

    /// Check if a user is in this room
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.participants.contains(user_id)
    }
}

/// Open rooms plus every id ever handed out
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// All open rooms: RoomId -> Room
    rooms: HashMap<RoomId, Room>,
    /// Ids issued during this process lifetime, open or closed; never pruned
    issued: HashSet<RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new room for the pair and return its id
    pub fn open(&mut self, first: UserId, second: UserId) -> RoomId {
        // Generate an id never seen before in this process
        let id = loop {
            let id = RoomId::generate();
            if !self.issued.contains(&id) {
                break id;
            }
        };

        self.issued.insert(id.clone());
        self.rooms.insert(id.clone(), Room::new(id.clone(), first, second));
        id
    }

    /// Remove the room, returning it if it was open
    pub fn close(&mut self, id: &RoomId) -> Option<Room> {
        self.rooms.remove(id)
    }

    pub fn get(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Open rooms containing `user_id`
    pub fn rooms_of<'a>(&'a self, user_id: &'a UserId) -> impl Iterator<Item = &'a Room> + 'a {
        self.rooms.values().filter(move |r| r.contains(user_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
