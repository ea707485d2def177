// src/attempt/mod.rs

pub mod controller;
pub mod countdown;
pub mod scoring;
pub mod service;
pub mod session;

pub use controller::{AttemptController, Phase, ResultHandoff, SelectOutcome, run_countdown};
pub use countdown::{Countdown, TimerSettings};
pub use session::{AttemptSession, HttpSession, LocalSession, RoomSink, ScoreSink};
