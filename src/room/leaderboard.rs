// src/room/leaderboard.rs

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::protocol::{RoomEvent, ScoreUpdate};

/// Display projection of one participant's score. Not authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub user_name: Option<String>,
    pub score: i64,
    pub total_questions: u32,
    pub seq: u64,
}

/// Receiver-side view of the room's scores, built from broadcast events.
///
/// Latest-emitted wins: an update is applied only if its `seq` is greater
/// than the last one applied for that user, so reordered deliveries never
/// roll a score back.
#[derive(Debug, Default, Clone)]
pub struct Leaderboard {
    entries: HashMap<i64, LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the update changed the board.
    pub fn apply(&mut self, update: &ScoreUpdate) -> bool {
        match self.entries.get_mut(&update.user_id) {
            Some(entry) if update.seq <= entry.seq => {
                tracing::debug!(
                    user_id = update.user_id,
                    seq = update.seq,
                    applied = entry.seq,
                    "Dropping stale score update"
                );
                false
            }
            Some(entry) => {
                entry.score = update.score;
                entry.total_questions = update.total_questions;
                entry.seq = update.seq;
                if update.user_name.is_some() {
                    entry.user_name = update.user_name.clone();
                }
                true
            }
            None => {
                self.entries.insert(
                    update.user_id,
                    LeaderboardEntry {
                        user_id: update.user_id,
                        user_name: update.user_name.clone(),
                        score: update.score,
                        total_questions: update.total_questions,
                        seq: update.seq,
                    },
                );
                true
            }
        }
    }

    /// Folds any room event into the board. Joins add a zero entry once per user.
    pub fn apply_event(&mut self, event: &RoomEvent) -> bool {
        match event {
            RoomEvent::ScoreUpdated(update) => self.apply(update),
            RoomEvent::Joined {
                user_id, user_name, ..
            } => match self.entries.get_mut(user_id) {
                Some(entry) => {
                    entry.user_name = Some(user_name.clone());
                    false
                }
                None => {
                    self.entries.insert(
                        *user_id,
                        LeaderboardEntry {
                            user_id: *user_id,
                            user_name: Some(user_name.clone()),
                            score: 0,
                            total_questions: 0,
                            seq: 0,
                        },
                    );
                    true
                }
            },
            RoomEvent::Left { .. } | RoomEvent::Started { .. } => false,
        }
    }

    pub fn entry(&self, user_id: i64) -> Option<&LeaderboardEntry> {
        self.entries.get(&user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest score first, ties by user id.
    pub fn standings(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.user_id.cmp(&b.user_id)));
        entries
    }
}
