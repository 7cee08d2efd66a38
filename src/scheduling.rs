//! Review scheduling: decide when, and in which order, questions come back.

use rand::Rng;
use serde::Serialize;
use serde_json::json;
use snafu::ensure;

use crate::error::{InvalidInputSnafu, Result};
use crate::primitives::{HeapStep, heapify, pop_min};
use crate::types::{Algorithm, AlgorithmPayload, Visualization, VisualizationKind};

const MIN_EASINESS: f64 = 1.3;
const FSRS_D_MIN: f64 = 1.0;
const FSRS_D_MAX: f64 = 10.0;
/// Remaining time assumed for a task that reports none, or zero.
const DEFAULT_TASK_TIME: f64 = 5.0;

pub(crate) trait Round {
    fn to_2_decimal(self) -> f64;
}

impl Round for f64 {
    fn to_2_decimal(self) -> f64 {
        (self * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sm2Result {
    pub new_interval: u32,
    pub easiness_factor: f64,
    pub repetitions: u32,
}

/// SuperMemo-2 step. `difficulty` doubles as the response quality and as the
/// easiness used to stretch the interval.
pub fn sm2(difficulty: f64, interval: u32, repetitions: u32) -> Sm2Result {
    let new_interval = match repetitions {
        0 => 1,
        1 => 6,
        _ => (interval as f64 * difficulty).round().max(0.0) as u32,
    };
    let quality_gap = 5.0 - difficulty;
    let easiness_factor =
        (difficulty + (0.1 - quality_gap * (0.08 + quality_gap * 0.02))).max(MIN_EASINESS);
    Sm2Result {
        new_interval,
        easiness_factor,
        repetitions: repetitions.saturating_add(1),
    }
}

impl AlgorithmPayload for Sm2Result {
    const ALGORITHM: Algorithm = Algorithm::Sm2;

    fn visualization(&self) -> Option<Visualization> {
        Some(Visualization::new(
            VisualizationKind::Timeline,
            json!([
                { "day": 0, "interval": 0, "label": "Initial" },
                { "day": 1, "interval": 1, "label": "First Review" },
                { "day": 7, "interval": 6, "label": "Second Review" },
                { "day": self.new_interval.saturating_add(7), "interval": self.new_interval, "label": "Next Review" },
            ]),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsrsResult {
    pub retrievability: f64,
    pub new_stability: f64,
    pub new_difficulty: f64,
}

pub fn fsrs(stability: f64, difficulty: f64) -> Result<FsrsResult> {
    ensure!(
        stability.is_finite() && stability > 0.0,
        InvalidInputSnafu {
            reason: format!("stability must be positive, got {stability}"),
        }
    );
    ensure!(
        difficulty.is_finite(),
        InvalidInputSnafu {
            reason: "difficulty must be finite",
        }
    );
    let retrievability = (-1.0 / stability).exp();
    let new_stability = stability * (2.5 + (difficulty - 3.0) * 0.15).powf(retrievability);
    let new_difficulty =
        (difficulty + (1.0 - retrievability) * 0.32).clamp(FSRS_D_MIN, FSRS_D_MAX);
    Ok(FsrsResult {
        retrievability: retrievability.to_2_decimal(),
        new_stability: new_stability.to_2_decimal(),
        new_difficulty: new_difficulty.to_2_decimal(),
    })
}

impl AlgorithmPayload for FsrsResult {
    const ALGORITHM: Algorithm = Algorithm::Fsrs;

    fn visualization(&self) -> Option<Visualization> {
        Some(Visualization::new(
            VisualizationKind::Curve,
            json!([
                { "x": 0, "y": 100, "label": "Initial Memory" },
                { "x": 1, "y": self.retrievability * 100.0, "label": "Current Retention" },
                { "x": self.new_stability, "y": 50, "label": "Next Review Point" },
            ]),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinHeapResult {
    /// Priorities in heap layout after the bottom-up build.
    pub heap: Vec<u32>,
    /// Priorities in extraction order, most urgent (smallest) first.
    pub scheduling_order: Vec<u32>,
    /// Question indices in extraction order.
    pub question_order: Vec<usize>,
    pub steps: Vec<HeapStep<u32>>,
}

/// Builds a min-heap over `priorities` and drains it. Equal priorities are
/// scheduled by question index.
pub fn min_heap(priorities: &[u32]) -> MinHeapResult {
    let mut entries: Vec<(u32, usize)> = priorities
        .iter()
        .enumerate()
        .map(|(index, &priority)| (priority, index))
        .collect();
    let mut entry_steps = Vec::new();
    heapify(&mut entries, &mut entry_steps);

    let heap = entries.iter().map(|&(priority, _)| priority).collect();
    let steps = entry_steps
        .into_iter()
        .map(|step| HeapStep {
            swapped: step.swapped,
            heap: step.heap.into_iter().map(|(priority, _)| priority).collect(),
        })
        .collect();

    let mut scheduling_order = Vec::with_capacity(entries.len());
    let mut question_order = Vec::with_capacity(entries.len());
    while let Some((priority, index)) = pop_min(&mut entries) {
        scheduling_order.push(priority);
        question_order.push(index);
    }

    MinHeapResult {
        heap,
        scheduling_order,
        question_order,
        steps,
    }
}

impl AlgorithmPayload for MinHeapResult {
    const ALGORITHM: Algorithm = Algorithm::MinHeap;

    fn visualization(&self) -> Option<Visualization> {
        let nodes: Vec<_> = self
            .heap
            .iter()
            .enumerate()
            .map(|(index, value)| {
                json!({
                    "id": index,
                    "value": value,
                    "parent": (index > 0).then(|| (index - 1) / 2),
                    "level": (index + 1).ilog2(),
                })
            })
            .collect();
        Some(Visualization::new(VisualizationKind::Tree, json!(nodes)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub remaining_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSlice {
    pub task_id: usize,
    pub execution_time: f64,
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRobinResult {
    pub total_time: f64,
    pub execution_order: Vec<TaskSlice>,
    pub adaptive_quantum: f64,
}

/// One round-robin pass with a quantum stretched randomly into
/// `[time_quantum, 1.5 * time_quantum)`.
pub fn adaptive_round_robin<R: Rng + ?Sized>(
    tasks: &[Task],
    time_quantum: f64,
    rng: &mut R,
) -> Result<RoundRobinResult> {
    ensure!(
        time_quantum.is_finite() && time_quantum > 0.0,
        InvalidInputSnafu {
            reason: format!("time quantum must be positive, got {time_quantum}"),
        }
    );
    for (task_id, task) in tasks.iter().enumerate() {
        if let Some(time) = task.remaining_time {
            ensure!(
                time >= 0.0,
                InvalidInputSnafu {
                    reason: format!("task {task_id} has negative remaining time {time}"),
                }
            );
        }
    }
    let adaptive_quantum = time_quantum * (1.0 + rng.random::<f64>() * 0.5);

    let mut total_time = 0.0;
    let mut execution_order = Vec::with_capacity(tasks.len());
    for (task_id, task) in tasks.iter().enumerate() {
        let remaining = task
            .remaining_time
            .filter(|t| *t > 0.0)
            .unwrap_or(DEFAULT_TASK_TIME);
        let execution_time = remaining.min(adaptive_quantum);
        let start_time = total_time;
        total_time += execution_time;
        execution_order.push(TaskSlice {
            task_id,
            execution_time,
            start_time,
            end_time: total_time,
        });
    }

    Ok(RoundRobinResult {
        total_time,
        execution_order,
        adaptive_quantum,
    })
}

impl AlgorithmPayload for RoundRobinResult {
    const ALGORITHM: Algorithm = Algorithm::AdaptiveRoundRobin;

    fn visualization(&self) -> Option<Visualization> {
        let bars: Vec<_> = self
            .execution_order
            .iter()
            .map(|slice| {
                json!({
                    "task": format!("Task {}", slice.task_id),
                    "start": slice.start_time,
                    "duration": slice.execution_time,
                    "end": slice.end_time,
                })
            })
            .collect();
        Some(Visualization::new(VisualizationKind::Gantt, json!(bars)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuizAlgoError;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sm2_first_two_intervals_are_fixed() {
        for interval in [0, 1, 6, 40] {
            assert_eq!(sm2(2.5, interval, 0).new_interval, 1);
            assert_eq!(sm2(2.5, interval, 1).new_interval, 6);
        }
    }

    #[test]
    fn sm2_later_interval_scales_by_difficulty() {
        let result = sm2(2.5, 6, 2);
        assert_eq!(result.new_interval, 15);
        assert_eq!(result.repetitions, 3);
        assert!((result.easiness_factor - 2.275).abs() < 1e-9);
    }

    #[test]
    fn sm2_easiness_is_floored() {
        let result = sm2(0.0, 1, 0);
        assert_eq!(result.easiness_factor, MIN_EASINESS);
    }

    #[test]
    fn sm2_repetitions_saturate() {
        assert_eq!(sm2(2.5, 10, u32::MAX).repetitions, u32::MAX);
    }

    #[test]
    fn fsrs_known_values() -> Result<()> {
        let result = fsrs(2.0, 3.0)?;
        assert_eq!(
            result,
            FsrsResult {
                retrievability: 0.61,
                new_stability: 3.49,
                new_difficulty: 3.13,
            }
        );
        Ok(())
    }

    #[test]
    fn fsrs_stays_in_range() -> Result<()> {
        for stability in [0.1, 0.5, 1.0, 10.0, 365.0] {
            for difficulty in 1..=10 {
                let result = fsrs(stability, difficulty as f64)?;
                assert!((0.0..=1.0).contains(&result.retrievability));
                assert!((FSRS_D_MIN..=FSRS_D_MAX).contains(&result.new_difficulty));
            }
        }
        Ok(())
    }

    #[test]
    fn fsrs_rejects_non_positive_stability() {
        assert!(fsrs(0.0, 5.0).is_err());
        assert!(fsrs(-1.0, 5.0).is_err());
    }

    #[test]
    fn min_heap_orders_by_priority() {
        let priorities = [5, 1, 6, 2, 5, 3];
        let result = min_heap(&priorities);
        assert_eq!(result.scheduling_order, [1, 2, 3, 5, 5, 6]);
        assert_eq!(result.question_order, [1, 3, 5, 0, 4, 2]);
        assert_eq!(result.heap[0], 1);

        let mut sorted = priorities.to_vec();
        sorted.sort();
        assert_eq!(result.scheduling_order, sorted);
    }

    #[test]
    fn min_heap_of_nothing() {
        let result = min_heap(&[]);
        assert!(result.heap.is_empty());
        assert!(result.scheduling_order.is_empty());
        assert!(result.visualization().is_some());
    }

    #[test]
    fn round_robin_slices_tasks() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(42);
        let tasks = [
            Task {
                remaining_time: Some(1.0),
            },
            Task {
                remaining_time: Some(100.0),
            },
            Task::default(),
        ];
        let result = adaptive_round_robin(&tasks, 4.0, &mut rng)?;
        assert!(result.adaptive_quantum >= 4.0 && result.adaptive_quantum < 6.0);
        let slices = &result.execution_order;
        assert_eq!(slices[0].execution_time, 1.0);
        assert_eq!(slices[1].execution_time, result.adaptive_quantum);
        assert_eq!(slices[2].execution_time, DEFAULT_TASK_TIME.min(result.adaptive_quantum));
        assert_eq!(slices[1].start_time, slices[0].end_time);
        assert_eq!(result.total_time, slices[2].end_time);
        Ok(())
    }

    #[test]
    fn round_robin_zero_time_uses_default_and_negative_is_rejected() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(42);
        let zero = Task {
            remaining_time: Some(0.0),
        };
        let result = adaptive_round_robin(&[zero], 10.0, &mut rng)?;
        assert_eq!(result.execution_order[0].execution_time, DEFAULT_TASK_TIME);

        let negative = Task {
            remaining_time: Some(-2.0),
        };
        assert!(matches!(
            adaptive_round_robin(&[zero, negative], 10.0, &mut rng),
            Err(QuizAlgoError::InvalidInput { .. })
        ));
        Ok(())
    }

    #[test]
    fn round_robin_rejects_zero_quantum() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(adaptive_round_robin(&[], 0.0, &mut rng).is_err());
    }
}
