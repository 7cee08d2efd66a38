//! Question selection: bandits, reinforcement learning and search over the
//! question pool.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use itertools::{Itertools, izip};
use ndarray::Array2;
use priority_queue::PriorityQueue;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::Serialize;
use serde_json::json;
use snafu::ensure;
use strum::Display;

use crate::error::{InvalidInputSnafu, QuizAlgoError, Result};
use crate::primitives::first_argmax;
use crate::types::{Algorithm, AlgorithmPayload, Visualization, VisualizationKind, serialize_rows};

/// Expansions after which A* gives up.
pub const ASTAR_STEP_CAP: usize = 10;

fn non_empty<T>(values: &[T], what: &str) -> Result<()> {
    ensure!(
        !values.is_empty(),
        InvalidInputSnafu {
            reason: format!("{what} must not be empty"),
        }
    );
    Ok(())
}

fn same_len<A, B>(a: &[A], b: &[B], what: &str) -> Result<()> {
    ensure!(
        a.len() == b.len(),
        InvalidInputSnafu {
            reason: format!("{what} lengths differ ({} vs {})", a.len(), b.len()),
        }
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UcbArm {
    pub index: usize,
    pub exploitation: f64,
    pub exploration: f64,
    /// `+inf` for an arm that has never been pulled.
    pub ucb: f64,
    pub reward: f64,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UcbResult {
    pub ucb_values: Vec<UcbArm>,
    pub selected_index: usize,
    pub selected_arm: UcbArm,
}

pub fn ucb(rewards: &[f64], counts: &[u32], total_count: u32, exploration: f64) -> Result<UcbResult> {
    non_empty(rewards, "rewards")?;
    same_len(rewards, counts, "rewards and counts")?;
    if total_count == 0 {
        log::warn!("UCB called with a total count of 0, treating it as 1");
    }
    let ln_total = (total_count.max(1) as f64).ln();

    let ucb_values = izip!(0.., rewards, counts)
        .map(|(index, &reward, &count)| {
            if count == 0 {
                return UcbArm {
                    index,
                    exploitation: 0.0,
                    exploration: 0.0,
                    ucb: f64::INFINITY,
                    reward,
                    count,
                };
            }
            let exploitation = reward / count as f64;
            let bonus = exploration * (ln_total / count as f64).sqrt();
            UcbArm {
                index,
                exploitation,
                exploration: bonus,
                ucb: exploitation + bonus,
                reward,
                count,
            }
        })
        .collect_vec();

    let selected_index = first_argmax(ucb_values.iter().map(|arm| arm.ucb)).unwrap_or(0);
    Ok(UcbResult {
        selected_arm: ucb_values[selected_index].clone(),
        ucb_values,
        selected_index,
    })
}

impl AlgorithmPayload for UcbResult {
    const ALGORITHM: Algorithm = Algorithm::Ucb;

    fn visualization(&self) -> Option<Visualization> {
        let bars = self
            .ucb_values
            .iter()
            .map(|arm| {
                json!({
                    "arm": format!("Q{}", arm.index + 1),
                    "exploitation": arm.exploitation,
                    "exploration": arm.exploration,
                    "ucb": arm.ucb,
                    "selected": arm.index == self.selected_index,
                })
            })
            .collect_vec();
        Some(Visualization::new(VisualizationKind::Bar, json!(bars)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThompsonArm {
    pub index: usize,
    pub alpha: f64,
    pub beta: f64,
    pub sample: f64,
    /// Posterior mean `alpha / (alpha + beta)`.
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThompsonResult {
    pub samples: Vec<ThompsonArm>,
    pub selected_index: usize,
    pub selected_arm: ThompsonArm,
}

pub fn thompson_sampling<R: Rng + ?Sized>(
    alphas: &[f64],
    betas: &[f64],
    rng: &mut R,
) -> Result<ThompsonResult> {
    non_empty(alphas, "alphas")?;
    same_len(alphas, betas, "alphas and betas")?;

    let samples = izip!(0.., alphas, betas)
        .map(|(index, &alpha, &beta)| {
            let distribution = Beta::new(alpha, beta).map_err(|e| QuizAlgoError::InvalidInput {
                reason: format!("arm {index}: Beta({alpha}, {beta}) is not valid: {e}"),
            })?;
            Ok(ThompsonArm {
                index,
                alpha,
                beta,
                sample: distribution.sample(&mut *rng),
                probability: alpha / (alpha + beta),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let selected_index = first_argmax(samples.iter().map(|arm| arm.sample)).unwrap_or(0);
    Ok(ThompsonResult {
        selected_arm: samples[selected_index].clone(),
        samples,
        selected_index,
    })
}

impl AlgorithmPayload for ThompsonResult {
    const ALGORITHM: Algorithm = Algorithm::ThompsonSampling;

    fn visualization(&self) -> Option<Visualization> {
        let arms = self
            .samples
            .iter()
            .map(|arm| {
                json!({
                    "question": format!("Q{}", arm.index + 1),
                    "alpha": arm.alpha,
                    "beta": arm.beta,
                    "probability": arm.probability,
                    "sample": arm.sample,
                    "selected": arm.index == self.selected_index,
                })
            })
            .collect_vec();
        Some(Visualization::new(VisualizationKind::Distribution, json!(arms)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionType {
    Explore,
    Exploit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QLearningResult {
    pub state: usize,
    pub state_values: Vec<f64>,
    pub selected_action: usize,
    pub action_type: ActionType,
    pub epsilon: f64,
    pub q_value: f64,
    /// Copy of the table the action was chosen from, for the heatmap.
    #[serde(skip)]
    pub q_table: Vec<Vec<f64>>,
}

/// Epsilon-greedy action choice over `q_table[state]`.
pub fn q_learning<R: Rng + ?Sized>(
    q_table: &[Vec<f64>],
    state: usize,
    epsilon: f64,
    rng: &mut R,
) -> Result<QLearningResult> {
    ensure!(
        (0.0..=1.0).contains(&epsilon),
        InvalidInputSnafu {
            reason: format!("epsilon must be within [0, 1], got {epsilon}"),
        }
    );
    let state_values = q_table.get(state).ok_or_else(|| QuizAlgoError::InvalidInput {
        reason: format!("state {state} is not in a Q-table of {} states", q_table.len()),
    })?;
    non_empty(state_values, "actions of the current state")?;

    let (selected_action, action_type) = if rng.random::<f64>() < epsilon {
        (rng.random_range(0..state_values.len()), ActionType::Explore)
    } else {
        (
            first_argmax(state_values.iter().copied()).unwrap_or(0),
            ActionType::Exploit,
        )
    };

    Ok(QLearningResult {
        state,
        state_values: state_values.clone(),
        selected_action,
        action_type,
        epsilon,
        q_value: state_values[selected_action],
        q_table: q_table.to_vec(),
    })
}

impl AlgorithmPayload for QLearningResult {
    const ALGORITHM: Algorithm = Algorithm::QLearning;

    fn visualization(&self) -> Option<Visualization> {
        let cells = self
            .q_table
            .iter()
            .enumerate()
            .flat_map(|(state, row)| {
                row.iter().enumerate().map(move |(action, value)| {
                    json!({
                        "state": state,
                        "action": action,
                        "value": value,
                        "selected": state == self.state && action == self.selected_action,
                    })
                })
            })
            .collect_vec();
        Some(Visualization::new(VisualizationKind::Heatmap, json!(cells)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Include,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnapsackStep {
    pub item: usize,
    pub weight: usize,
    pub value: f64,
    pub capacity: usize,
    pub include: f64,
    pub exclude: f64,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnapsackResult {
    pub max_value: f64,
    /// Indices of the chosen items, ascending.
    pub selected_items: Vec<usize>,
    /// `(items + 1) × (capacity + 1)` table of best values.
    #[serde(serialize_with = "serialize_rows")]
    pub dp: Array2<f64>,
    pub steps: Vec<KnapsackStep>,
}

/// 0/1 knapsack over question weights (difficulty cost) and values.
pub fn knapsack(weights: &[usize], values: &[f64], capacity: usize) -> Result<KnapsackResult> {
    same_len(weights, values, "weights and values")?;
    let n = weights.len();
    let mut dp = Array2::<f64>::zeros((n + 1, capacity + 1));
    let mut steps = Vec::new();

    for i in 1..=n {
        let (weight, value) = (weights[i - 1], values[i - 1]);
        for w in 1..=capacity {
            let exclude = dp[[i - 1, w]];
            if weight <= w {
                let include = value + dp[[i - 1, w - weight]];
                dp[[i, w]] = include.max(exclude);
                steps.push(KnapsackStep {
                    item: i - 1,
                    weight,
                    value,
                    capacity: w,
                    include,
                    exclude,
                    decision: if include > exclude {
                        Decision::Include
                    } else {
                        Decision::Exclude
                    },
                });
            } else {
                dp[[i, w]] = exclude;
            }
        }
    }

    let mut selected_items = Vec::new();
    let mut w = capacity;
    for i in (1..=n).rev() {
        if w == 0 {
            break;
        }
        if dp[[i, w]] != dp[[i - 1, w]] {
            selected_items.push(i - 1);
            w -= weights[i - 1];
        }
    }
    selected_items.reverse();

    Ok(KnapsackResult {
        max_value: dp[[n, capacity]],
        selected_items,
        dp,
        steps,
    })
}

impl AlgorithmPayload for KnapsackResult {
    const ALGORITHM: Algorithm = Algorithm::Knapsack;

    fn visualization(&self) -> Option<Visualization> {
        let cells = self
            .dp
            .indexed_iter()
            .map(|((row, col), value)| {
                json!({
                    "row": row,
                    "col": col,
                    "value": value,
                    "isOptimal": row > 0 && self.selected_items.contains(&(row - 1)),
                })
            })
            .collect_vec();
        Some(Visualization::new(VisualizationKind::Matrix, json!(cells)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AStarStep {
    pub current: i64,
    pub open_set: Vec<i64>,
    pub closed_set: Vec<i64>,
    pub g_score: u64,
    pub f_score: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AStarResult {
    /// Empty when the goal was not reached.
    pub path: Vec<i64>,
    pub steps: Vec<AStarStep>,
    /// `None` when the goal was not reached within [`ASTAR_STEP_CAP`].
    pub cost: Option<u64>,
}

/// A* over the line graph `n -> n ± 1`, restricted to `0..=goal + 2`.
pub fn a_star<H>(start: i64, goal: i64, heuristic: H) -> AStarResult
where
    H: Fn(i64) -> u64,
{
    // Ties on f are broken by insertion order.
    let mut open: PriorityQueue<i64, Reverse<(u64, usize)>> = PriorityQueue::new();
    let mut inserted = 0usize;
    let mut closed = BTreeSet::new();
    let mut g_score = HashMap::from([(start, 0u64)]);
    let mut f_score = HashMap::from([(start, heuristic(start))]);
    let mut came_from: HashMap<i64, i64> = HashMap::new();
    let mut steps = Vec::new();
    let bound = goal.saturating_add(2);

    open.push(start, Reverse((f_score[&start], inserted)));
    inserted += 1;

    while let Some((current, _)) = open.pop() {
        let g_current = g_score[&current];
        let mut open_set = open.iter().map(|(&node, _)| node).collect_vec();
        open_set.push(current);
        open_set.sort_unstable();
        steps.push(AStarStep {
            current,
            open_set,
            closed_set: closed.iter().copied().collect(),
            g_score: g_current,
            f_score: f_score[&current],
        });

        if current == goal {
            let mut path = vec![current];
            let mut node = current;
            while let Some(&previous) = came_from.get(&node) {
                path.push(previous);
                node = previous;
            }
            path.reverse();
            return AStarResult {
                path,
                steps,
                cost: Some(g_current),
            };
        }

        closed.insert(current);

        for neighbor in [current.checked_sub(1), current.checked_add(1)]
            .into_iter()
            .flatten()
        {
            if neighbor < 0 || neighbor > bound || closed.contains(&neighbor) {
                continue;
            }
            let tentative = g_current.saturating_add(1);
            let known = open.get_priority(&neighbor).map(|Reverse((_, order))| *order);
            if known.is_some() && tentative >= g_score[&neighbor] {
                continue;
            }
            let order = known.unwrap_or_else(|| {
                inserted += 1;
                inserted - 1
            });
            let f = tentative.saturating_add(heuristic(neighbor));
            came_from.insert(neighbor, current);
            g_score.insert(neighbor, tentative);
            f_score.insert(neighbor, f);
            open.push(neighbor, Reverse((f, order)));
        }

        if steps.len() >= ASTAR_STEP_CAP {
            break;
        }
    }

    AStarResult {
        path: Vec::new(),
        steps,
        cost: None,
    }
}

impl AlgorithmPayload for AStarResult {
    const ALGORITHM: Algorithm = Algorithm::AStar;

    fn visualization(&self) -> Option<Visualization> {
        // The last snapshot holds every node the search touched.
        let nodes = self.steps.last().map_or_else(Vec::new, |last| {
            let open = last.open_set.iter().map(|&node| json!({ "id": node, "type": "open" }));
            let closed = last.closed_set.iter().map(|&node| json!({ "id": node, "type": "closed" }));
            open.chain(closed).collect_vec()
        });
        Some(Visualization::new(
            VisualizationKind::Graph,
            json!({ "nodes": nodes, "path": self.path }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn ucb_prefers_unvisited_arm() -> Result<()> {
        let result = ucb(&[5.0, 0.0, 1.0, 0.0], &[5, 0, 1, 0], 6, 2.0)?;
        assert_eq!(result.selected_index, 1);
        assert!(result.selected_arm.ucb.is_infinite());
        Ok(())
    }

    #[test]
    fn ucb_balances_reward_and_exploration() -> Result<()> {
        let result = ucb(&[3.0, 1.0], &[4, 1], 5, 2.0)?;
        let ln5 = 5f64.ln();
        assert!((result.ucb_values[0].ucb - (0.75 + 2.0 * (ln5 / 4.0).sqrt())).abs() < 1e-12);
        assert!((result.ucb_values[1].ucb - (1.0 + 2.0 * ln5.sqrt())).abs() < 1e-12);
        assert_eq!(result.selected_index, 1);
        Ok(())
    }

    #[test]
    fn ucb_rejects_bad_input() {
        assert!(ucb(&[], &[], 1, 2.0).is_err());
        assert!(ucb(&[1.0], &[1, 2], 1, 2.0).is_err());
    }

    #[test]
    fn ucb_zero_total_count_is_sanitized() -> Result<()> {
        let result = ucb(&[1.0, 0.0], &[1, 1], 0, 2.0)?;
        assert_eq!(result.ucb_values[0].exploration, 0.0);
        assert_eq!(result.selected_index, 0);
        Ok(())
    }

    #[test]
    fn thompson_sampling_draws_from_posteriors() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(42);
        let result = thompson_sampling(&[2.0, 1.0, 50.0], &[1.0, 2.0, 1.0], &mut rng)?;
        assert_eq!(result.samples.len(), 3);
        for arm in &result.samples {
            assert!((0.0..=1.0).contains(&arm.sample));
        }
        assert!((result.samples[0].probability - 2.0 / 3.0).abs() < 1e-12);
        let best = result
            .samples
            .iter()
            .map(|arm| arm.sample)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.selected_arm.sample, best);
        Ok(())
    }

    #[test]
    fn thompson_sampling_favours_strong_arm() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        let wins = (0..200)
            .filter_map(|_| thompson_sampling(&[1.0, 90.0], &[90.0, 1.0], &mut rng).ok())
            .filter(|result| result.selected_index == 1)
            .count();
        assert_eq!(wins, 200);
        Ok(())
    }

    #[test]
    fn thompson_sampling_rejects_invalid_parameters() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(thompson_sampling(&[0.0], &[1.0], &mut rng).is_err());
        assert!(thompson_sampling(&[1.0], &[], &mut rng).is_err());
    }

    #[test]
    fn q_learning_exploits_first_max() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(42);
        let result = q_learning(&[vec![0.0, 0.0, 0.0]], 0, 0.0, &mut rng)?;
        assert_eq!(result.action_type, ActionType::Exploit);
        assert_eq!(result.selected_action, 0);
        assert_eq!(result.q_value, 0.0);

        let result = q_learning(&[vec![0.1, 0.7, 0.7]], 0, 0.0, &mut rng)?;
        assert_eq!(result.selected_action, 1);
        Ok(())
    }

    #[test]
    fn q_learning_always_explores_at_epsilon_one() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let result = q_learning(&[vec![1.0, 0.0, 0.0, 0.0]], 0, 1.0, &mut rng)?;
            assert_eq!(result.action_type, ActionType::Explore);
            assert!(result.selected_action < 4);
        }
        Ok(())
    }

    #[test]
    fn q_learning_rejects_unknown_state() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(q_learning(&[vec![0.0]], 1, 0.0, &mut rng).is_err());
        assert!(q_learning(&[vec![]], 0, 0.0, &mut rng).is_err());
        assert!(q_learning(&[vec![0.0]], 0, 1.5, &mut rng).is_err());
    }

    #[test]
    fn knapsack_small_instance() -> Result<()> {
        let weights = [1, 2, 3];
        let result = knapsack(&weights, &[6.0, 10.0, 12.0], 5)?;
        assert_eq!(result.max_value, 22.0);
        assert_eq!(result.selected_items, [1, 2]);
        let used: usize = result.selected_items.iter().map(|&i| weights[i]).sum();
        assert!(used <= 5);
        assert_eq!(result.dp.dim(), (4, 6));
        Ok(())
    }

    #[test]
    fn knapsack_with_question_weights() -> Result<()> {
        // easy = 1, medium = 2, hard = 3; value 1 for a correctly answered question
        let result = knapsack(&[1, 2, 3, 1, 3], &[1.0, 0.0, 1.0, 1.0, 1.0], 8)?;
        assert_eq!(result.max_value, 4.0);
        assert_eq!(result.selected_items, [0, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn knapsack_edge_cases() -> Result<()> {
        let result = knapsack(&[], &[], 4)?;
        assert_eq!(result.max_value, 0.0);
        assert!(result.selected_items.is_empty());

        let result = knapsack(&[2], &[3.0], 0)?;
        assert_eq!(result.max_value, 0.0);
        assert!(result.steps.is_empty());

        assert!(knapsack(&[1, 2], &[1.0], 3).is_err());
        Ok(())
    }

    #[test]
    fn a_star_reaches_goal() {
        let goal = 5;
        let result = a_star(0, goal, |n| goal.abs_diff(n));
        assert_eq!(result.path, [0, 1, 2, 3, 4, 5]);
        assert_eq!(result.cost, Some(5));
        assert_eq!(result.steps.first().map(|s| s.current), Some(0));
        assert_eq!(result.steps.last().map(|s| s.current), Some(goal));
    }

    #[test]
    fn a_star_walks_backwards() {
        let goal = 1;
        let result = a_star(3, goal, |n| goal.abs_diff(n));
        assert_eq!(result.path, [3, 2, 1]);
        assert_eq!(result.cost, Some(2));
    }

    #[test]
    fn a_star_stops_at_step_cap() {
        let goal = 50;
        let result = a_star(0, goal, |n| goal.abs_diff(n));
        assert!(result.path.is_empty());
        assert_eq!(result.cost, None);
        assert_eq!(result.steps.len(), ASTAR_STEP_CAP);
    }

    #[test]
    fn a_star_with_unreachable_goal_terminates() {
        let result = a_star(0, -3, |_| 0);
        assert!(result.path.is_empty());
        assert_eq!(result.steps.len(), 1);
    }

    #[test]
    fn a_star_graph_lists_each_node_once() {
        let result = a_star(0, 2, |n| 2i64.abs_diff(n));
        let graph = result.visualization().map(|v| v.data);
        assert_eq!(
            graph,
            Some(json!({
                "nodes": [
                    { "id": 2, "type": "open" },
                    { "id": 0, "type": "closed" },
                    { "id": 1, "type": "closed" },
                ],
                "path": [0, 1, 2],
            }))
        );
    }

    #[test]
    fn a_star_saturates_infinite_heuristic() {
        let result = a_star(0, 3, |_| u64::MAX);
        assert_eq!(result.path, [0, 1, 2, 3]);
        assert_eq!(result.cost, Some(3));
        assert!(result.steps.iter().all(|s| s.f_score == u64::MAX));
    }

    #[test]
    fn a_star_near_integer_bounds() {
        let goal = i64::MAX;
        let result = a_star(goal - 1, goal, |n| goal.abs_diff(n));
        assert_eq!(result.path, [goal - 1, goal]);
        assert_eq!(result.cost, Some(1));

        let result = a_star(i64::MIN, 0, |n| n.unsigned_abs());
        assert!(result.path.is_empty());
        assert_eq!(result.steps.len(), 1);
    }
}
