//! Best-match selection
//!
//! Score is the number of interest tags two users share. The candidate with
//! the highest score wins; on a tie the first one in pool order wins. A
//! candidate with no shared interest is never returned.

use std::collections::BTreeSet;

use crate::pool::WaitingEntry;
use crate::types::UserId;

/// Number of shared interest tags
pub fn score(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}

/// Pick the best partner for `requester` among `pool`
///
/// Returns the chosen entry and its score, or `None` if nobody in the pool
/// shares at least one interest with the requester.
pub fn find_best_match<'a>(
    requester: &UserId,
    interests: &BTreeSet<String>,
    pool: &'a [WaitingEntry],
) -> Option<(&'a WaitingEntry, usize)> {
    let mut best: Option<(&WaitingEntry, usize)> = None;

    for candidate in pool.iter().filter(|e| &e.user_id != requester) {
        let s = score(interests, &candidate.interests);
        // Strict comparison keeps the earliest entry on ties
        if s > best.map_or(0, |(_, top)| top) {
            best = Some((candidate, s));
        }
    }

    best
}
