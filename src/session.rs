//! Per-test state owned by the caller and threaded through the algorithms.
//!
//! A [`SessionState`] is created when a test starts, updated once per answered
//! question with [`SessionState::record_answer`] and dropped when the test ends.

use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::config::QLearningConfig;
use crate::error::{InvalidInputSnafu, QuizAlgoError, Result};

/// Priority a question starts with before it has been answered.
pub const INITIAL_PRIORITY: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable(Vec<Vec<f64>>);

impl QTable {
    pub fn zeros(states: usize, actions: usize) -> Self {
        Self(vec![vec![0.0; actions]; states])
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.0
    }

    pub fn get(&self, state: usize, action: usize) -> Option<f64> {
        self.0.get(state)?.get(action).copied()
    }

    /// Temporal-difference update
    /// `Q[s][a] += alpha * (reward + gamma * max(Q[s']) - Q[s][a])`.
    pub fn update(
        &mut self,
        state: usize,
        action: usize,
        reward: f64,
        next_state: usize,
        alpha: f64,
        gamma: f64,
    ) -> Result<()> {
        let max_next = self
            .0
            .get(next_state)
            .and_then(|row| row.iter().copied().reduce(f64::max))
            .ok_or_else(|| QuizAlgoError::InvalidInput {
                reason: format!("next state {next_state} has no actions in the Q-table"),
            })?;
        let current = self
            .0
            .get_mut(state)
            .and_then(|row| row.get_mut(action))
            .ok_or_else(|| QuizAlgoError::InvalidInput {
                reason: format!("Q-table has no entry for state {state}, action {action}"),
            })?;
        *current += alpha * (reward + gamma * max_next - *current);
        Ok(())
    }
}

/// Answer history fed to deep knowledge tracing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DktHistory {
    /// Question indices, in answer order.
    pub inputs: Vec<usize>,
    /// 1 for a correct answer, 0 otherwise.
    pub targets: Vec<f64>,
}

impl DktHistory {
    pub fn push(&mut self, question_index: usize, correct: bool) {
        self.inputs.push(question_index);
        self.targets.push(if correct { 1.0 } else { 0.0 });
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Share of correct answers so far, 0.5 before the first answer.
    pub fn running_prediction(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.5;
        }
        let mean = self.targets.iter().sum::<f64>() / self.targets.len() as f64;
        mean.clamp(0.0, 1.0)
    }

    /// Inputs as network features, targets as weights.
    pub fn features(&self) -> (Vec<f64>, Vec<f64>) {
        (
            self.inputs.iter().map(|&i| i as f64).collect(),
            self.targets.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// Position of the question within the test.
    pub question_index: usize,
    /// Q-learning action that selected the question, if Q-learning chose it.
    pub action: Option<usize>,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub q_table: QTable,
    pub priorities: Vec<u32>,
    pub dkt_history: DktHistory,
}

impl SessionState {
    /// One Q-learning state over `pool_size` actions, and an initial priority
    /// for each of the `question_count` questions of the test.
    pub fn new(pool_size: usize, question_count: usize) -> Self {
        Self {
            q_table: QTable::zeros(1, pool_size),
            priorities: vec![INITIAL_PRIORITY; question_count],
            dkt_history: DktHistory::default(),
        }
    }

    pub fn record_answer(&mut self, outcome: AnswerOutcome, config: &QLearningConfig) -> Result<()> {
        let AnswerOutcome {
            question_index,
            action,
            correct,
        } = outcome;
        ensure!(
            question_index < self.priorities.len(),
            InvalidInputSnafu {
                reason: format!(
                    "question {question_index} is not part of a {}-question test",
                    self.priorities.len()
                ),
            }
        );

        if let Some(action) = action {
            let reward = if correct { 1.0 } else { -1.0 };
            self.q_table
                .update(0, action, reward, 0, config.alpha, config.gamma)?;
        }

        let priority = &mut self.priorities[question_index];
        *priority = if correct { priority.saturating_add(1) } else { 1 };

        self.dkt_history.push(question_index, correct);

        log::info!(
            "recorded {} answer for question {question_index}, priority now {}, running prediction {:.3}",
            if correct { "correct" } else { "incorrect" },
            self.priorities[question_index],
            self.dkt_history.running_prediction()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(question_index: usize, action: Option<usize>, correct: bool) -> AnswerOutcome {
        AnswerOutcome {
            question_index,
            action,
            correct,
        }
    }

    #[test]
    fn q_update_rule() -> Result<()> {
        let mut table = QTable::zeros(1, 3);
        table.update(0, 1, 1.0, 0, 0.1, 0.9)?;
        assert!((table.rows()[0][1] - 0.1).abs() < 1e-12);
        // max over the next state now includes the updated entry
        table.update(0, 2, -1.0, 0, 0.1, 0.9)?;
        assert!((table.rows()[0][2] - 0.1 * (-1.0 + 0.9 * 0.1)).abs() < 1e-12);
        assert!(table.update(1, 0, 1.0, 0, 0.1, 0.9).is_err());
        assert!(table.update(0, 3, 1.0, 0, 0.1, 0.9).is_err());
        Ok(())
    }

    #[test]
    fn recording_answers_updates_all_state() -> Result<()> {
        let config = QLearningConfig::default();
        let mut session = SessionState::new(4, 3);
        assert_eq!(session.priorities, [5, 5, 5]);

        session.record_answer(answer(0, Some(2), true), &config)?;
        session.record_answer(answer(1, None, false), &config)?;
        session.record_answer(answer(0, Some(2), true), &config)?;

        assert_eq!(session.priorities, [7, 1, 5]);
        assert_eq!(session.dkt_history.inputs, [0, 1, 0]);
        assert_eq!(session.dkt_history.targets, [1.0, 0.0, 1.0]);
        assert!(session.q_table.get(0, 2).is_some_and(|q| q > 0.1));
        assert_eq!(session.q_table.get(0, 1), Some(0.0));
        Ok(())
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut session = SessionState::new(2, 2);
        let result = session.record_answer(answer(5, None, true), &QLearningConfig::default());
        assert!(result.is_err());
        assert_eq!(session.dkt_history.len(), 0);
    }

    #[test]
    fn running_prediction_is_an_average() {
        let mut history = DktHistory::default();
        assert_eq!(history.running_prediction(), 0.5);
        history.push(0, true);
        history.push(1, false);
        history.push(2, true);
        history.push(3, true);
        assert_eq!(history.running_prediction(), 0.75);
        let (features, weights) = history.features();
        assert_eq!(features, [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(weights, history.targets);
    }
}
