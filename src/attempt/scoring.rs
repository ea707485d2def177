// src/attempt/scoring.rs

use crate::{
    config::POINTS_PER_CORRECT,
    models::{attempt::AnswerMap, question::Question},
};

/// Score change when `selected` replaces `previous` on a question whose key is `correct`.
///
/// Wrong-to-right earns the reward, right-to-wrong takes it back, anything
/// else leaves the score alone. With per-question locking the second case only
/// happens if a lock is bypassed, e.g. while a resumed attempt is rehydrating.
pub fn score_delta(previous: Option<u32>, selected: u32, correct: u32) -> i64 {
    let was_correct = previous == Some(correct);
    let is_correct = selected == correct;
    match (was_correct, is_correct) {
        (false, true) => POINTS_PER_CORRECT,
        (true, false) => -POINTS_PER_CORRECT,
        _ => 0,
    }
}

/// Number of answers matching the question key. Answers to unknown questions are ignored.
pub fn correct_count(answers: &AnswerMap, questions: &[Question]) -> usize {
    answers
        .iter()
        .filter(|&(&index, &option)| {
            questions
                .get(index as usize)
                .is_some_and(|q| q.is_correct(option))
        })
        .count()
}

/// The authoritative score: reward times the number of correct answers.
pub fn audit_score(answers: &AnswerMap, questions: &[Question]) -> i64 {
    correct_count(answers, questions) as i64 * POINTS_PER_CORRECT
}
