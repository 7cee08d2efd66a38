//! One-line explanations of algorithm results for the quiz UI.
//!
//! Each family has its own formatter. A result from another family, or an
//! algorithm name that does not parse, gets the family's generic sentence.

use itertools::Itertools;

use crate::types::{Algorithm, AlgorithmOutput, Family};

fn generic(family: Family, name: &str, question_index: usize) -> String {
    match family {
        Family::QuestionSelection => {
            format!("Question {} was selected using {name} algorithm.", question_index + 1)
        }
        Family::KnowledgeTracing => format!("Knowledge tracing using {name} algorithm."),
        Family::ReviewScheduling => format!("Review scheduling using {name} algorithm."),
        Family::RewardSystem => format!("Reward system using {name} algorithm."),
    }
}

fn percent(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

pub fn question_selection(output: &AlgorithmOutput, question_index: usize) -> String {
    let question = question_index + 1;
    match output {
        AlgorithmOutput::QLearning(r) => format!(
            "Q-Learning chose question {question} using {} strategy. Q-value: {:.3}",
            r.action_type, r.q_value
        ),
        AlgorithmOutput::Knapsack(r) => format!(
            "Knapsack optimization selected question {question} with total value {:.1}. Selected {} questions.",
            r.max_value,
            r.selected_items.len()
        ),
        AlgorithmOutput::Ucb(r) => format!(
            "UCB selected question {question} with exploitation: {:.3}, exploration: {:.3}",
            r.selected_arm.exploitation, r.selected_arm.exploration
        ),
        AlgorithmOutput::ThompsonSampling(r) => format!(
            "Thompson Sampling chose question {question} with probability {}",
            percent(r.selected_arm.probability)
        ),
        AlgorithmOutput::AStar(r) => match r.cost {
            Some(cost) => format!(
                "A* search reached question {question} along [{}] at cost {cost}.",
                r.path.iter().join(" -> ")
            ),
            None => format!(
                "A* search stopped after {} expansions without reaching question {question}.",
                r.steps.len()
            ),
        },
        other => generic(
            Family::QuestionSelection,
            other.algorithm().as_ref(),
            question_index,
        ),
    }
}

pub fn knowledge_tracing(output: &AlgorithmOutput, is_correct: bool) -> String {
    match output {
        AlgorithmOutput::Dkt(r) => {
            let prediction = r.knowledge_state;
            let outlook = if prediction > 0.5 {
                "likely to succeed"
            } else {
                "likely to struggle"
            };
            let error = (prediction - if is_correct { 1.0 } else { 0.0 }).abs();
            format!(
                "DKT predicted {} chance of success ({outlook}). Prediction accuracy: {}",
                percent(prediction),
                percent(1.0 - error)
            )
        }
        AlgorithmOutput::Dp(r) => format!(
            "DP max streak: {}. Path: {}",
            r.max_value,
            r.path
                .iter()
                .map(|cell| format!("({},{}:{})", cell.row, cell.col, cell.value))
                .join(" -> ")
        ),
        AlgorithmOutput::Bkt(r) => format!(
            "BKT estimates {} mastery after the {} answer (was {}). Next opportunity: {}",
            percent(r.p_know_after),
            r.evidence,
            percent(r.p_know_before),
            percent(r.p_know_next)
        ),
        AlgorithmOutput::Hmm(r) if r.best_path.is_empty() => {
            "HMM had no observations to decode.".to_string()
        }
        AlgorithmOutput::Hmm(r) => format!(
            "HMM most likely knowledge path: {} (probability {:.4})",
            r.state_sequence.iter().map(|label| &label.name).join(" -> "),
            r.probability
        ),
        other => generic(Family::KnowledgeTracing, other.algorithm().as_ref(), 0),
    }
}

pub fn review_scheduler(output: &AlgorithmOutput) -> String {
    match output {
        AlgorithmOutput::Sm2(r) => format!(
            "SM2 scheduled next review in {} days. Easiness factor: {:.2}, Repetitions: {}",
            r.new_interval, r.easiness_factor, r.repetitions
        ),
        AlgorithmOutput::MinHeap(r) => format!(
            "Min Heap priorities: [{}]. Next review order: [{}]",
            r.heap.iter().join(", "),
            r.scheduling_order.iter().join(", ")
        ),
        AlgorithmOutput::Fsrs(r) => format!(
            "FSRS calculated {} retrievability. New stability: {:.2}",
            percent(r.retrievability),
            r.new_stability
        ),
        AlgorithmOutput::AdaptiveRoundRobin(r) => format!(
            "Adaptive Round Robin ran {} slices with a quantum of {:.2}. Total time: {:.2}",
            r.execution_order.len(),
            r.adaptive_quantum,
            r.total_time
        ),
        other => generic(Family::ReviewScheduling, other.algorithm().as_ref(), 0),
    }
}

pub fn reward_system(output: &AlgorithmOutput, is_correct: bool) -> String {
    match output {
        AlgorithmOutput::VariableRatio(r) => format!(
            "Variable ratio reinforcement {}. Total rewards: {}/{}",
            if r.should_reward {
                "triggered"
            } else {
                "not triggered"
            },
            r.total_rewards,
            r.reinforcement_history.len()
        ),
        AlgorithmOutput::FenwickTree(r) => format!(
            "Fenwick Tree total reward: {}. Prefix sums: [{}]",
            r.total_reward,
            r.prefix_sums.iter().join(", ")
        ),
        AlgorithmOutput::Greedy(r) => format!(
            "Greedy ranking collected {} reward in {} time units (ratio {:.2}). This answer {}.",
            r.total_reward,
            r.total_time,
            r.average_ratio,
            if is_correct {
                "earned a reward"
            } else {
                "earned nothing"
            }
        ),
        AlgorithmOutput::Mdp(r) => format!(
            "MDP value iteration reached an optimal value of {:.2} after {} iterations.",
            r.optimal_value,
            r.iterations.len()
        ),
        other => generic(Family::RewardSystem, other.algorithm().as_ref(), 0),
    }
}

/// Explains `output` for `family`, trusting `name` only when it parses to the
/// algorithm that produced the output.
pub fn explain_by_name(
    family: Family,
    name: &str,
    output: &AlgorithmOutput,
    question_index: usize,
    is_correct: bool,
) -> String {
    match Algorithm::parse(name) {
        Ok(algorithm) if algorithm == output.algorithm() => match family {
            Family::QuestionSelection => question_selection(output, question_index),
            Family::KnowledgeTracing => knowledge_tracing(output, is_correct),
            Family::ReviewScheduling => review_scheduler(output),
            Family::RewardSystem => reward_system(output, is_correct),
        },
        _ => generic(family, name, question_index),
    }
}
