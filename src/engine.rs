use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::AlgorithmConfig;
use crate::error::Result;
use crate::knowledge;
use crate::reward::{self, Activity};
use crate::scheduling::{self, Task};
use crate::selection;
use crate::session::QTable;
use crate::timing;
use crate::types::{AlgorithmExecutionResult, AlgorithmPayload};

/// Runs the algorithms and wraps their payloads into timed
/// [`AlgorithmExecutionResult`]s.
///
/// Holds no session state; everything that changes between questions is
/// passed in by the caller.
#[derive(Debug, Clone)]
pub struct QuizAlgorithms {
    config: AlgorithmConfig,
    rng: StdRng,
}

impl QuizAlgorithms {
    pub fn new(config: AlgorithmConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    fn run<P, F>(&mut self, f: F) -> Result<AlgorithmExecutionResult>
    where
        P: AlgorithmPayload,
        F: FnOnce(&mut StdRng) -> Result<P>,
    {
        let delay = self.config.delay_ms.draw(&mut self.rng);
        let rng = &mut self.rng;
        let (payload, execution_time) = timing::measure(delay, || f(rng));
        let payload = payload?;

        let algorithm = P::ALGORITHM;
        log::debug!("{algorithm} finished in {execution_time:.3} ms");
        Ok(AlgorithmExecutionResult {
            algorithm,
            algorithm_name: algorithm.display_name(),
            execution_time,
            complexity: algorithm.complexity(),
            description: algorithm.description(),
            visualization: payload.visualization(),
            result: payload.into(),
        })
    }

    pub fn sm2(
        &mut self,
        difficulty: f64,
        interval: u32,
        repetitions: u32,
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|_| Ok(scheduling::sm2(difficulty, interval, repetitions)))
    }

    pub fn fsrs(&mut self, stability: f64, difficulty: f64) -> Result<AlgorithmExecutionResult> {
        self.run(|_| scheduling::fsrs(stability, difficulty))
    }

    pub fn min_heap(&mut self, priorities: &[u32]) -> Result<AlgorithmExecutionResult> {
        self.run(|_| Ok(scheduling::min_heap(priorities)))
    }

    pub fn adaptive_round_robin(
        &mut self,
        tasks: &[Task],
        time_quantum: f64,
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|rng| scheduling::adaptive_round_robin(tasks, time_quantum, rng))
    }

    /// UCB with the configured exploration constant.
    pub fn ucb(
        &mut self,
        rewards: &[f64],
        counts: &[u32],
        total_count: u32,
    ) -> Result<AlgorithmExecutionResult> {
        let exploration = self.config.ucb_exploration;
        self.run(|_| selection::ucb(rewards, counts, total_count, exploration))
    }

    pub fn thompson_sampling(
        &mut self,
        alphas: &[f64],
        betas: &[f64],
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|rng| selection::thompson_sampling(alphas, betas, rng))
    }

    pub fn q_learning(
        &mut self,
        q_table: &QTable,
        state: usize,
        epsilon: f64,
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|rng| selection::q_learning(q_table.rows(), state, epsilon, rng))
    }

    pub fn knapsack(
        &mut self,
        weights: &[usize],
        values: &[f64],
        capacity: usize,
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|_| selection::knapsack(weights, values, capacity))
    }

    pub fn a_star<H>(&mut self, start: i64, goal: i64, heuristic: H) -> Result<AlgorithmExecutionResult>
    where
        H: Fn(i64) -> u64,
    {
        self.run(|_| Ok(selection::a_star(start, goal, heuristic)))
    }

    pub fn fenwick_tree(
        &mut self,
        rewards: &[f64],
        index: usize,
        value: f64,
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|_| reward::fenwick_tree(rewards, index, value))
    }

    pub fn greedy(&mut self, activities: &[Activity]) -> Result<AlgorithmExecutionResult> {
        self.run(|_| reward::greedy(activities))
    }

    pub fn variable_ratio(
        &mut self,
        responses: usize,
        schedule: &[u32],
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|rng| reward::variable_ratio(responses, schedule, rng))
    }

    pub fn mdp(
        &mut self,
        states: &[Vec<f64>],
        rewards: &[f64],
        policy: &[i64],
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|_| reward::mdp(states, rewards, policy))
    }

    pub fn bkt(
        &mut self,
        p_know: f64,
        p_learn: f64,
        p_guess: f64,
        p_slip: f64,
        correct: bool,
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|_| knowledge::bkt(p_know, p_learn, p_guess, p_slip, correct))
    }

    pub fn dkt(&mut self, features: &[f64], weights: &[f64]) -> Result<AlgorithmExecutionResult> {
        self.run(|_| knowledge::dkt(features, weights))
    }

    /// Reports a table from [`knowledge::reachability_matrix`].
    pub fn dp(&mut self, matrix: Array2<u8>) -> Result<AlgorithmExecutionResult> {
        self.run(|_| Ok(knowledge::dp(matrix)))
    }

    pub fn hmm(
        &mut self,
        observations: &[u32],
        states: &[usize],
        transitions: &[Vec<f64>],
    ) -> Result<AlgorithmExecutionResult> {
        self.run(|_| knowledge::hmm(observations, states, transitions))
    }
}
