// src/room/mod.rs

pub mod leaderboard;
pub mod protocol;
pub mod registry;

pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use protocol::{ClientCommand, RoomEvent, RoomParticipant, ScoreUpdate};
pub use registry::{JoinOutcome, QuizRoom, RoomRegistry};
