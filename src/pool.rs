//! Waiting pool
//!
//! Users currently seeking a partner, kept in insertion order so that
//! score ties resolve to whoever has been waiting longest.

use std::collections::BTreeSet;

use crate::error::MatchError;
use crate::types::UserId;
use crate::user::User;

/// Snapshot of a user taken when they entered the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingEntry {
    pub user_id: UserId,
    pub interests: BTreeSet<String>,
}

impl From<&User> for WaitingEntry {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            interests: user.interests.clone(),
        }
    }
}

/// Insertion-ordered set of waiting entries, at most one per identity
#[derive(Debug, Default)]
pub struct WaitingPool {
    entries: Vec<WaitingEntry>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry at the back of the pool
    pub fn enqueue(&mut self, entry: WaitingEntry) -> Result<(), MatchError> {
        if self.contains(&entry.user_id) {
            return Err(MatchError::AlreadyWaiting(entry.user_id));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove and return the entry for `user_id`
    ///
    /// Order of the remaining entries is preserved.
    pub fn dequeue(&mut self, user_id: &UserId) -> Result<WaitingEntry, MatchError> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.user_id == user_id)
            .ok_or_else(|| MatchError::NotWaiting(user_id.clone()))?;
        Ok(self.entries.remove(index))
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.entries.iter().any(|e| &e.user_id == user_id)
    }

    /// Current entries in insertion order
    pub fn snapshot(&self) -> &[WaitingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> WaitingEntry {
        WaitingEntry::from(&User::new(UserId::new(id), ["chess"]))
    }

    #[test]
    fn test_enqueue_rejects_duplicate() {
        let mut pool = WaitingPool::new();
        pool.enqueue(entry("alice")).unwrap();

        let err = pool.enqueue(entry("alice")).unwrap_err();
        assert_eq!(err, MatchError::AlreadyWaiting(UserId::new("alice")));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_dequeue_missing() {
        let mut pool = WaitingPool::new();
        let err = pool.dequeue(&UserId::new("bob")).unwrap_err();
        assert_eq!(err, MatchError::NotWaiting(UserId::new("bob")));
    }

    #[test]
    fn test_dequeue_keeps_order() {
        let mut pool = WaitingPool::new();
        for id in ["a", "b", "c"] {
            pool.enqueue(entry(id)).unwrap();
        }

        let removed = pool.dequeue(&UserId::new("b")).unwrap();
        assert_eq!(removed.user_id, UserId::new("b"));

        let ids: Vec<&str> = pool.snapshot().iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(!pool.contains(&UserId::new("b")));
    }
}
