// src/attempt/countdown.rs

use crate::{config::Config, models::quiz::QuizMode};

/// Countdown lengths, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub attempt_secs: u32,
    pub question_secs: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            attempt_secs: 600,
            question_secs: 15,
        }
    }
}

impl From<&Config> for TimerSettings {
    fn from(config: &Config) -> Self {
        Self {
            attempt_secs: config.attempt_duration_secs,
            question_secs: config.practice_question_secs,
        }
    }
}

impl TimerSettings {
    pub fn for_mode(&self, mode: QuizMode) -> u32 {
        match mode {
            QuizMode::Full => self.attempt_secs,
            QuizMode::Practice => self.question_secs,
        }
    }
}

/// Client-local one-second countdown. There is no server clock behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    duration: u32,
    remaining: u32,
}

impl Countdown {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            remaining: duration,
        }
    }

    /// Advances one second. Returns true only on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}
