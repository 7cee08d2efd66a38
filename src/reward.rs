//! Reward system: how much credit a learner receives and when.

use itertools::Itertools;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use snafu::ensure;
use strum::Display;

use crate::error::{InvalidInputSnafu, Result};
use crate::primitives::FenwickTree;
use crate::types::{Algorithm, AlgorithmPayload, Visualization, VisualizationKind};

/// Discount factor of the MDP value iteration.
pub const MDP_GAMMA: f64 = 0.9;
/// Number of synchronous sweeps performed by [`mdp`].
pub const MDP_ITERATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FenwickPhase {
    Build,
    Update,
}

/// One internal cell touched while building or updating the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FenwickOperation {
    pub index: usize,
    pub value: f64,
    pub operation: FenwickPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FenwickResult {
    /// Internal 1-based array, slot 0 unused.
    pub tree: Vec<f64>,
    pub operations: Vec<FenwickOperation>,
    pub prefix_sums: Vec<f64>,
    pub total_reward: f64,
}

/// Builds a tree over `rewards`, adds `value` at `index` and reports every
/// prefix sum afterwards.
pub fn fenwick_tree(rewards: &[f64], index: usize, value: f64) -> Result<FenwickResult> {
    ensure!(
        index < rewards.len(),
        InvalidInputSnafu {
            reason: format!("index {index} is out of range for {} rewards", rewards.len()),
        }
    );

    let mut tree = FenwickTree::new(rewards.len());
    let mut operations = Vec::new();
    let mut record = |tree: &FenwickTree, touched: Vec<usize>, phase| {
        operations.extend(touched.into_iter().map(|i| FenwickOperation {
            index: i,
            value: tree.as_slice()[i],
            operation: phase,
        }));
    };
    for (i, &reward) in rewards.iter().enumerate() {
        let touched = tree.add(i, reward);
        record(&tree, touched, FenwickPhase::Build);
    }
    let touched = tree.add(index, value);
    record(&tree, touched, FenwickPhase::Update);

    Ok(FenwickResult {
        prefix_sums: tree.prefix_sums(),
        total_reward: tree.total(),
        tree: tree.as_slice().to_vec(),
        operations,
    })
}

impl AlgorithmPayload for FenwickResult {
    const ALGORITHM: Algorithm = Algorithm::FenwickTree;

    fn visualization(&self) -> Option<Visualization> {
        let updated = self
            .operations
            .iter()
            .filter(|op| op.operation == FenwickPhase::Update)
            .map(|op| op.index)
            .collect_vec();
        let nodes = self
            .tree
            .iter()
            .enumerate()
            .map(|(index, value)| {
                json!({
                    "index": index,
                    "value": value,
                    "level": (index + 1).ilog2(),
                    "isUpdated": updated.contains(&index),
                })
            })
            .collect_vec();
        Some(Visualization::new(VisualizationKind::Tree, json!(nodes)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Activity {
    pub reward: f64,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedActivity {
    pub index: usize,
    pub reward: f64,
    pub time: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreedyResult {
    /// Every activity, best reward-per-time first.
    pub sorted: Vec<RankedActivity>,
    pub total_reward: f64,
    pub total_time: f64,
    pub average_ratio: f64,
}

/// Orders activities by reward rate and takes all of them.
pub fn greedy(activities: &[Activity]) -> Result<GreedyResult> {
    for (index, activity) in activities.iter().enumerate() {
        ensure!(
            activity.time > 0.0,
            InvalidInputSnafu {
                reason: format!("activity {index} has non-positive time {}", activity.time),
            }
        );
    }

    let sorted = activities
        .iter()
        .enumerate()
        .map(|(index, activity)| RankedActivity {
            index,
            reward: activity.reward,
            time: activity.time,
            ratio: activity.reward / activity.time,
        })
        .sorted_by(|a, b| b.ratio.total_cmp(&a.ratio))
        .collect_vec();

    let total_reward: f64 = sorted.iter().map(|a| a.reward).sum();
    let total_time: f64 = sorted.iter().map(|a| a.time).sum();
    let average_ratio = if total_time > 0.0 {
        total_reward / total_time
    } else {
        0.0
    };

    Ok(GreedyResult {
        sorted,
        total_reward,
        total_time,
        average_ratio,
    })
}

impl AlgorithmPayload for GreedyResult {
    const ALGORITHM: Algorithm = Algorithm::Greedy;

    fn visualization(&self) -> Option<Visualization> {
        let bars = self
            .sorted
            .iter()
            .enumerate()
            .map(|(order, activity)| {
                json!({
                    "activity": format!("Activity {}", activity.index + 1),
                    "reward": activity.reward,
                    "time": activity.time,
                    "ratio": activity.ratio,
                    "selected": true,
                    "order": order + 1,
                })
            })
            .collect_vec();
        Some(Visualization::new(VisualizationKind::Bar, json!(bars)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reinforcement {
    /// 1-based response number.
    pub response: usize,
    pub ratio: u32,
    pub probability: f64,
    pub rewarded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableRatioResult {
    pub avg_ratio: f64,
    pub current_ratio: u32,
    pub reward_probability: f64,
    pub should_reward: bool,
    pub reinforcement_history: Vec<Reinforcement>,
    pub total_rewards: usize,
}

/// Variable-ratio reinforcement: the response count picks a ratio from the
/// cyclic `schedule`, and a reward is drawn with probability `1 / ratio`.
pub fn variable_ratio<R: Rng + ?Sized>(
    responses: usize,
    schedule: &[u32],
    rng: &mut R,
) -> Result<VariableRatioResult> {
    ensure!(
        !schedule.is_empty(),
        InvalidInputSnafu {
            reason: "reinforcement schedule must not be empty",
        }
    );
    ensure!(
        schedule.iter().all(|&ratio| ratio >= 1),
        InvalidInputSnafu {
            reason: format!("schedule ratios must be at least 1, got {schedule:?}"),
        }
    );

    let ratio_at = |response: usize| schedule[response % schedule.len()];
    let avg_ratio = schedule.iter().map(|&r| r as f64).sum::<f64>() / schedule.len() as f64;
    let current_ratio = ratio_at(responses);
    let reward_probability = 1.0 / current_ratio as f64;
    let should_reward = rng.random_bool(reward_probability);

    let reinforcement_history = (0..responses)
        .map(|i| {
            let ratio = ratio_at(i);
            let probability = 1.0 / ratio as f64;
            Reinforcement {
                response: i + 1,
                ratio,
                probability,
                rewarded: rng.random_bool(probability),
            }
        })
        .collect_vec();
    let total_rewards = reinforcement_history.iter().filter(|h| h.rewarded).count();

    Ok(VariableRatioResult {
        avg_ratio,
        current_ratio,
        reward_probability,
        should_reward,
        reinforcement_history,
        total_rewards,
    })
}

impl AlgorithmPayload for VariableRatioResult {
    const ALGORITHM: Algorithm = Algorithm::VariableRatio;

    fn visualization(&self) -> Option<Visualization> {
        Some(Visualization::new(
            VisualizationKind::Timeline,
            json!(self.reinforcement_history),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MdpIteration {
    pub iteration: usize,
    pub values: Vec<f64>,
    pub max_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MdpResult {
    pub final_values: Vec<f64>,
    pub iterations: Vec<MdpIteration>,
    pub policy: Vec<i64>,
    pub optimal_value: f64,
}

/// Policy evaluation by [`MDP_ITERATIONS`] synchronous sweeps of
/// `V'(s) = r(s) + γ·V(policy(s))`.
///
/// Only the number of `states` rows is used. Policy entries are clamped onto
/// the state range and states without a policy entry move to state 0.
pub fn mdp(states: &[Vec<f64>], rewards: &[f64], policy: &[i64]) -> Result<MdpResult> {
    ensure!(
        !states.is_empty(),
        InvalidInputSnafu {
            reason: "an MDP needs at least one state",
        }
    );
    ensure!(
        rewards.len() == states.len(),
        InvalidInputSnafu {
            reason: format!(
                "{} rewards given for {} states",
                rewards.len(),
                states.len()
            ),
        }
    );

    let last = states.len() as i64 - 1;
    let next_state = (0..states.len())
        .map(|s| policy.get(s).copied().unwrap_or(0).clamp(0, last) as usize)
        .collect_vec();

    let mut values = vec![0.0; states.len()];
    let mut iterations = Vec::with_capacity(MDP_ITERATIONS);
    for iteration in 0..MDP_ITERATIONS {
        let new_values = rewards
            .iter()
            .zip(&next_state)
            .map(|(&reward, &next)| reward + MDP_GAMMA * values[next])
            .collect_vec();
        let max_change = new_values
            .iter()
            .zip(&values)
            .map(|(new, old)| (new - old).abs())
            .fold(0.0, f64::max);
        iterations.push(MdpIteration {
            iteration,
            values: new_values.clone(),
            max_change,
        });
        values = new_values;
    }

    let optimal_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(MdpResult {
        final_values: values,
        iterations,
        policy: policy.to_vec(),
        optimal_value,
    })
}

impl AlgorithmPayload for MdpResult {
    const ALGORITHM: Algorithm = Algorithm::Mdp;

    fn visualization(&self) -> Option<Visualization> {
        Some(Visualization::new(
            VisualizationKind::Curve,
            json!(self.iterations),
        ))
    }
}
