mod config;
mod engine;
mod error;
pub mod explain;
pub mod knowledge;
pub mod primitives;
mod quiz;
pub mod reward;
pub mod scheduling;
pub mod selection;
mod session;
#[cfg(test)]
mod test_helpers;
mod timing;
mod types;

pub use config::{AlgorithmConfig, DelayRange, QLearningConfig};
pub use engine::QuizAlgorithms;
pub use error::{QuizAlgoError, Result};
pub use quiz::{Difficulty, OPTION_COUNT, Question, Topic};
pub use session::{AnswerOutcome, DktHistory, INITIAL_PRIORITY, QTable, SessionState};
pub use types::{
    Algorithm, AlgorithmExecutionResult, AlgorithmOutput, AlgorithmPayload, Complexity, Family,
    Visualization, VisualizationKind,
};
