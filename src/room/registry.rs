// src/room/registry.rs

//! Room membership and fan-out.
//!
//! Each quiz id maps to one [`QuizRoom`] holding the membership set and a
//! `tokio::sync::broadcast` channel. Events are sent while the room's state
//! lock is held, so subscribers observe them in the order the room applied them.
//!
//! Rooms come and go with their members. Score sequence numbers live on the
//! registry instead, so a pruned and recreated room keeps counting upwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, broadcast};

use super::protocol::{RoomEvent, RoomParticipant, ScoreUpdate};
use crate::{config::is_elevated, error::AppError, utils::jwt::Identity};

#[derive(Default)]
struct RoomState {
    participants: BTreeMap<i64, RoomParticipant>,
}

/// One quiz room: membership plus its broadcast channel.
pub struct QuizRoom {
    quiz_id: i64,
    sender: broadcast::Sender<Arc<RoomEvent>>,
    state: RwLock<RoomState>,
}

impl QuizRoom {
    fn new(quiz_id: i64, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            quiz_id,
            sender,
            state: RwLock::new(RoomState::default()),
        }
    }

    pub fn quiz_id(&self) -> i64 {
        self.quiz_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoomEvent>> {
        self.sender.subscribe()
    }

    /// Sends to every subscriber. No subscribers is not an error.
    fn emit(&self, event: RoomEvent) -> usize {
        self.sender.send(Arc::new(event)).unwrap_or(0)
    }

    pub async fn participants(&self) -> Vec<RoomParticipant> {
        self.state.read().await.participants.values().cloned().collect()
    }

    pub async fn contains(&self, user_id: i64) -> bool {
        self.state.read().await.participants.contains_key(&user_id)
    }

    async fn is_idle(&self) -> bool {
        self.state.read().await.participants.is_empty() && self.sender.receiver_count() == 0
    }
}

/// Result of a join. `already_member` marks the tolerated duplicate join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub already_member: bool,
    pub members: usize,
}

/// Maps quiz ids to rooms. Owned by the server and injected through `AppState`.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<i64, Arc<QuizRoom>>>,
    /// Last score sequence number per (quiz, user). Outlives the rooms.
    score_seq: Mutex<HashMap<(i64, i64), u64>>,
    capacity: usize,
}

impl RoomRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            score_seq: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Existing room for `quiz_id`, without creating one.
    async fn existing(&self, quiz_id: i64) -> Option<Arc<QuizRoom>> {
        self.rooms.read().await.get(&quiz_id).cloned()
    }

    async fn next_seq(&self, quiz_id: i64, user_id: i64) -> u64 {
        let mut counters = self.score_seq.lock().await;
        let last = counters.entry((quiz_id, user_id)).or_insert(0);
        *last += 1;
        *last
    }

    /// Get or create the room for `quiz_id`.
    pub async fn room(&self, quiz_id: i64) -> Arc<QuizRoom> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(&quiz_id) {
                return room.clone();
            }
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(quiz_id)
            .or_insert_with(|| Arc::new(QuizRoom::new(quiz_id, self.capacity)))
            .clone()
    }

    pub async fn subscribe(&self, quiz_id: i64) -> broadcast::Receiver<Arc<RoomEvent>> {
        self.room(quiz_id).await.subscribe()
    }

    /// Adds the caller to the room and announces it.
    ///
    /// Joining twice keeps a single membership entry but still emits the
    /// join event; receivers dedupe on `user_id`.
    pub async fn join(&self, quiz_id: i64, user_id: i64, user_name: &str) -> JoinOutcome {
        let room = self.room(quiz_id).await;
        let mut state = room.state.write().await;

        let participant = RoomParticipant {
            quiz_id,
            user_id,
            user_name: user_name.to_string(),
        };
        let already_member = state.participants.insert(user_id, participant).is_some();
        if already_member {
            tracing::debug!(quiz_id, user_id, "Duplicate join, membership unchanged");
        }

        room.emit(RoomEvent::Joined {
            quiz_id,
            user_id,
            user_name: user_name.to_string(),
        });
        tracing::info!(quiz_id, user_id, members = state.participants.len(), "Participant joined");

        JoinOutcome {
            already_member,
            members: state.participants.len(),
        }
    }

    /// Removes the caller. Leaving a room one is not in is a silent no-op.
    pub async fn leave(&self, quiz_id: i64, user_id: i64) -> bool {
        let Some(room) = self.existing(quiz_id).await else {
            tracing::debug!(quiz_id, user_id, "Leave for unknown room ignored");
            return false;
        };

        let removed = {
            let mut state = room.state.write().await;
            let removed = state.participants.remove(&user_id).is_some();
            if removed {
                room.emit(RoomEvent::Left { quiz_id, user_id });
                tracing::info!(quiz_id, user_id, "Participant left");
            } else {
                tracing::debug!(quiz_id, user_id, "Leave for non-member ignored");
            }
            removed
        };
        drop(room);

        self.prune(quiz_id).await;
        removed
    }

    /// Broadcasts the start signal with the current membership snapshot.
    pub async fn start_for_all(
        &self,
        quiz_id: i64,
        requester: &Identity,
    ) -> Result<Vec<RoomParticipant>, AppError> {
        if !is_elevated(&requester.role) {
            tracing::warn!(
                quiz_id,
                user_id = requester.id,
                role = %requester.role,
                "Rejected start request from non-privileged role"
            );
            return Err(AppError::Forbidden(
                "Only instructors can start the quiz for everyone".to_string(),
            ));
        }

        let Some(room) = self.existing(quiz_id).await else {
            tracing::info!(quiz_id, started_by = requester.id, "Start requested for an empty room");
            return Ok(Vec::new());
        };
        let state = room.state.read().await;
        let participants: Vec<RoomParticipant> = state.participants.values().cloned().collect();

        let receivers = room.emit(RoomEvent::Started {
            quiz_id,
            started_by: requester.id,
            participants: participants.clone(),
        });
        tracing::info!(
            quiz_id,
            started_by = requester.id,
            participants = participants.len(),
            receivers,
            "Quiz started for room"
        );

        Ok(participants)
    }

    /// Fans out a score. Does not persist anything.
    ///
    /// The update is always sequenced, even when no room is open, so a later
    /// receiver never sees the counter go backwards.
    pub async fn update_score(
        &self,
        quiz_id: i64,
        user_id: i64,
        score: i64,
        total_questions: u32,
    ) -> ScoreUpdate {
        let Some(room) = self.existing(quiz_id).await else {
            let seq = self.next_seq(quiz_id, user_id).await;
            tracing::debug!(quiz_id, user_id, score, seq, "Score update without an open room");
            return ScoreUpdate {
                quiz_id,
                user_id,
                user_name: None,
                score,
                total_questions,
                seq,
            };
        };

        // Stamped under the room lock so emission order matches seq order.
        let state = room.state.write().await;
        let seq = self.next_seq(quiz_id, user_id).await;

        let update = ScoreUpdate {
            quiz_id,
            user_id,
            user_name: state.participants.get(&user_id).map(|p| p.user_name.clone()),
            score,
            total_questions,
            seq,
        };
        room.emit(RoomEvent::ScoreUpdated(update.clone()));
        tracing::debug!(quiz_id, user_id, score, seq = update.seq, "Score update broadcast");

        update
    }

    pub async fn participants(&self, quiz_id: i64) -> Vec<RoomParticipant> {
        match self.existing(quiz_id).await {
            Some(room) => room.participants().await,
            None => Vec::new(),
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Drops the room when nobody is a member, nobody listens and no caller holds it.
    pub async fn prune(&self, quiz_id: i64) -> bool {
        let mut rooms = self.rooms.write().await;
        let idle = match rooms.get(&quiz_id) {
            Some(room) => Arc::strong_count(room) == 1 && room.is_idle().await,
            None => return false,
        };
        if idle {
            rooms.remove(&quiz_id);
            tracing::debug!(quiz_id, "Removed idle room");
        }
        idle
    }

    /// Drops every idle room. Catches rooms whose connection never finished
    /// its handshake and so never reached the socket teardown.
    pub async fn prune_idle(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut idle = Vec::new();
        for (quiz_id, room) in rooms.iter() {
            if Arc::strong_count(room) == 1 && room.is_idle().await {
                idle.push(*quiz_id);
            }
        }
        for quiz_id in &idle {
            rooms.remove(quiz_id);
        }
        if !idle.is_empty() {
            tracing::debug!(removed = idle.len(), "Swept idle rooms");
        }
        idle.len()
    }

    /// Runs [`RoomRegistry::prune_idle`] every `period` for the life of the server.
    pub async fn sweep_idle(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.prune_idle().await;
        }
    }
}
