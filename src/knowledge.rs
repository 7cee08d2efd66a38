//! Knowledge tracing: estimates of what the learner currently knows.

use itertools::Itertools;
use ndarray::Array2;
use serde::Serialize;
use serde_json::json;
use snafu::ensure;
use strum::Display;

use crate::error::{InvalidInputSnafu, Result};
use crate::primitives::first_argmax;
use crate::types::{Algorithm, AlgorithmPayload, Visualization, VisualizationKind, serialize_rows};

/// Most observations the Viterbi pass will consume.
pub const HMM_MAX_STEPS: usize = 5;
/// Transition probability assumed when the table has no entry.
pub const HMM_DEFAULT_TRANSITION: f64 = 0.5;
/// Width cap of the DKT hidden layer.
pub const DKT_MAX_HIDDEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Evidence {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BktParameters {
    pub p_learn: f64,
    pub p_guess: f64,
    pub p_slip: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BktResult {
    pub p_know_before: f64,
    pub p_know_after: f64,
    pub p_know_next: f64,
    pub p_correct: f64,
    pub evidence: Evidence,
    pub parameters: BktParameters,
}

/// One Bayesian knowledge tracing step: condition `p_know` on the observed
/// answer, then apply the learning transition.
pub fn bkt(p_know: f64, p_learn: f64, p_guess: f64, p_slip: f64, correct: bool) -> Result<BktResult> {
    for (name, value) in [
        ("pKnow", p_know),
        ("pLearn", p_learn),
        ("pGuess", p_guess),
        ("pSlip", p_slip),
    ] {
        ensure!(
            (0.0..=1.0).contains(&value),
            InvalidInputSnafu {
                reason: format!("{name} must be a probability, got {value}"),
            }
        );
    }

    let p_correct = p_know * (1.0 - p_slip) + (1.0 - p_know) * p_guess;
    let (numerator, evidence_probability) = if correct {
        (p_know * (1.0 - p_slip), p_correct)
    } else {
        (p_know * p_slip, 1.0 - p_correct)
    };
    let p_know_after = if evidence_probability > 0.0 {
        (numerator / evidence_probability).clamp(0.0, 1.0)
    } else {
        log::warn!(
            "BKT evidence has zero probability (correct = {correct}, pCorrect = {p_correct}), keeping the prior"
        );
        p_know
    };
    let p_know_next = (p_know_after + (1.0 - p_know_after) * p_learn).clamp(0.0, 1.0);

    Ok(BktResult {
        p_know_before: p_know,
        p_know_after,
        p_know_next,
        p_correct,
        evidence: if correct {
            Evidence::Correct
        } else {
            Evidence::Incorrect
        },
        parameters: BktParameters {
            p_learn,
            p_guess,
            p_slip,
        },
    })
}

impl AlgorithmPayload for BktResult {
    const ALGORITHM: Algorithm = Algorithm::Bkt;

    fn visualization(&self) -> Option<Visualization> {
        Some(Visualization::new(
            VisualizationKind::Probability,
            json!([
                { "state": "Before", "probability": self.p_know_before * 100.0, "type": "knowledge" },
                { "state": "After", "probability": self.p_know_after * 100.0, "type": "knowledge" },
                { "state": "Next", "probability": self.p_know_next * 100.0, "type": "prediction" },
            ]),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum LayerName {
    Input,
    Hidden,
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub name: LayerName,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DktResult {
    pub knowledge_state: f64,
    pub layers: Vec<Layer>,
    pub hidden_activations: Vec<f64>,
    /// Distance from an undecided 0.5, scaled to `[0, 1]`.
    pub confidence: f64,
}

/// Untrained single-hidden-layer forward pass. Hidden unit `i` is
/// `tanh(features[i % F] * weights[i % W])`; the output is the sigmoid of
/// their mean.
pub fn dkt(features: &[f64], weights: &[f64]) -> Result<DktResult> {
    let input = Layer {
        name: LayerName::Input,
        values: features.to_vec(),
    };
    if features.is_empty() {
        return Ok(DktResult {
            knowledge_state: 0.5,
            layers: vec![
                input,
                Layer {
                    name: LayerName::Output,
                    values: vec![0.5],
                },
            ],
            hidden_activations: Vec::new(),
            confidence: 0.0,
        });
    }
    ensure!(
        !weights.is_empty(),
        InvalidInputSnafu {
            reason: "DKT needs at least one weight",
        }
    );

    let hidden_size = features.len().min(DKT_MAX_HIDDEN);
    let hidden = (0..hidden_size)
        .map(|i| (features[i % features.len()] * weights[i % weights.len()]).tanh())
        .collect_vec();
    let mean = hidden.iter().sum::<f64>() / hidden_size as f64;
    let knowledge_state = 1.0 / (1.0 + (-mean).exp());

    Ok(DktResult {
        knowledge_state,
        layers: vec![
            input,
            Layer {
                name: LayerName::Hidden,
                values: hidden.clone(),
            },
            Layer {
                name: LayerName::Output,
                values: vec![knowledge_state],
            },
        ],
        hidden_activations: hidden,
        confidence: (0.5 - knowledge_state).abs() * 2.0,
    })
}

impl AlgorithmPayload for DktResult {
    const ALGORITHM: Algorithm = Algorithm::Dkt;

    fn visualization(&self) -> Option<Visualization> {
        let inputs = self.layers.first().map_or(0, |layer| layer.values.len()).max(1);
        let connections = self
            .hidden_activations
            .iter()
            .enumerate()
            .map(|(i, activation)| {
                json!({
                    "from": format!("input_{}", i % inputs),
                    "to": format!("hidden_{i}"),
                    "weight": activation,
                })
            })
            .collect_vec();
        Some(Visualization::new(
            VisualizationKind::Network,
            json!({ "layers": self.layers, "connections": connections }),
        ))
    }
}

/// Which correct-answer counts are reachable after each question.
///
/// Cell `[s, q]` is 1 when `s` correct answers are possible after the first
/// `q` questions. A question answered correctly lets the count advance by one;
/// the count may always stay where it is.
pub fn reachability_matrix(outcomes: &[bool]) -> Array2<u8> {
    let n = outcomes.len();
    let mut matrix = Array2::<u8>::zeros((n + 1, n + 1));
    matrix[[0, 0]] = 1;
    for q in 1..=n {
        for s in 0..=q {
            let stay = matrix[[s, q - 1]] == 1;
            let advance = s > 0 && outcomes[q - 1] && matrix[[s - 1, q - 1]] == 1;
            if stay || advance {
                matrix[[s, q]] = 1;
            }
        }
    }
    matrix
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DpCell {
    pub row: usize,
    pub col: usize,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DpResult {
    #[serde(serialize_with = "serialize_rows")]
    pub dp: Array2<u8>,
    /// Highest reachable row of every column that has one.
    pub path: Vec<DpCell>,
    /// Highest reachable row of the last column.
    pub max_value: usize,
}

/// Reports a reachability table built by [`reachability_matrix`].
pub fn dp(matrix: Array2<u8>) -> DpResult {
    let path = matrix
        .columns()
        .into_iter()
        .enumerate()
        .filter_map(|(col, column)| {
            (0..column.len())
                .rev()
                .find(|&row| column[row] != 0)
                .map(|row| DpCell {
                    row,
                    col,
                    value: column[row],
                })
        })
        .collect_vec();
    let last_col = matrix.ncols().checked_sub(1);
    let max_value = path
        .last()
        .filter(|cell| Some(cell.col) == last_col)
        .map_or(0, |cell| cell.row);

    DpResult {
        dp: matrix,
        path,
        max_value,
    }
}

impl AlgorithmPayload for DpResult {
    const ALGORITHM: Algorithm = Algorithm::Dp;

    fn visualization(&self) -> Option<Visualization> {
        let cells = self
            .dp
            .indexed_iter()
            .map(|((row, col), value)| {
                json!({
                    "row": row,
                    "col": col,
                    "value": value,
                    "isOptimal": self.path.iter().any(|cell| cell.row == row && cell.col == col),
                })
            })
            .collect_vec();
        Some(Visualization::new(VisualizationKind::Matrix, json!(cells)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HmmStep {
    pub observation: u32,
    /// Best path ending in each state.
    pub paths: Vec<Vec<usize>>,
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateLabel {
    pub state: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HmmResult {
    pub best_path: Vec<usize>,
    pub probability: f64,
    pub steps: Vec<HmmStep>,
    pub state_sequence: Vec<StateLabel>,
    #[serde(skip)]
    pub observations: Vec<u32>,
    #[serde(skip)]
    pub transitions: Vec<Vec<f64>>,
}

/// Viterbi pass over at most [`HMM_MAX_STEPS`] observations, starting from a
/// uniform distribution over `states`.
///
/// Only the number of states matters. `transitions[prev][next]` entries that
/// are absent count as [`HMM_DEFAULT_TRANSITION`].
pub fn hmm(observations: &[u32], states: &[usize], transitions: &[Vec<f64>]) -> Result<HmmResult> {
    let num_states = states.len();
    if observations.is_empty() {
        return Ok(HmmResult {
            best_path: Vec::new(),
            probability: 0.0,
            steps: Vec::new(),
            state_sequence: Vec::new(),
            observations: Vec::new(),
            transitions: transitions.to_vec(),
        });
    }
    ensure!(
        num_states > 0,
        InvalidInputSnafu {
            reason: "an HMM needs at least one hidden state",
        }
    );

    let mut missing_transition = false;
    let mut transition = |prev: usize, next: usize| match transitions.get(prev).and_then(|row| row.get(next)) {
        Some(&p) => p,
        None => {
            missing_transition = true;
            HMM_DEFAULT_TRANSITION
        }
    };

    let mut paths = (0..num_states).map(|s| vec![s]).collect_vec();
    let mut probabilities = vec![1.0 / num_states as f64; num_states];
    let mut steps = vec![HmmStep {
        observation: observations[0],
        paths: paths.clone(),
        probabilities: probabilities.clone(),
    }];

    for &observation in observations.iter().take(HMM_MAX_STEPS).skip(1) {
        let mut next_paths = Vec::with_capacity(num_states);
        let mut next_probabilities = Vec::with_capacity(num_states);
        for state in 0..num_states {
            let candidates = probabilities
                .iter()
                .enumerate()
                .map(|(prev, p)| p * transition(prev, state))
                .collect_vec();
            let best = first_argmax(candidates.iter().copied()).unwrap_or(0);
            let mut path = paths[best].clone();
            path.push(state);
            next_paths.push(path);
            next_probabilities.push(candidates[best]);
        }
        steps.push(HmmStep {
            observation,
            paths: next_paths.clone(),
            probabilities: next_probabilities.clone(),
        });
        paths = next_paths;
        probabilities = next_probabilities;
    }
    if missing_transition {
        log::warn!("HMM transition table is incomplete, using {HMM_DEFAULT_TRANSITION} for missing entries");
    }

    let best = first_argmax(probabilities.iter().copied()).unwrap_or(0);
    let best_path = paths.swap_remove(best);
    let state_sequence = best_path
        .iter()
        .map(|&state| StateLabel {
            state,
            name: format!("Knowledge_{state}"),
        })
        .collect();

    Ok(HmmResult {
        best_path,
        probability: probabilities[best],
        steps,
        state_sequence,
        observations: observations.to_vec(),
        transitions: transitions.to_vec(),
    })
}

impl AlgorithmPayload for HmmResult {
    const ALGORITHM: Algorithm = Algorithm::Hmm;

    fn visualization(&self) -> Option<Visualization> {
        Some(Visualization::new(
            VisualizationKind::Sequence,
            json!({
                "observations": self.observations,
                "states": self.state_sequence,
                "transitions": self.transitions,
                "bestPath": self.best_path,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestHelper;
    use ndarray::array;

    #[test]
    fn bkt_correct_answer_raises_knowledge() -> Result<()> {
        let result = bkt(0.5, 0.1, 0.2, 0.1, true)?;
        assert!((result.p_correct - 0.55).abs() < 1e-12);
        assert!((result.p_know_after - 0.818_181_8).abs() < 1e-6);
        assert!((result.p_know_next - 0.836_363_6).abs() < 1e-6);
        assert_eq!(result.evidence, Evidence::Correct);
        assert_eq!(result.p_know_before, 0.5);
        Ok(())
    }

    #[test]
    fn bkt_incorrect_answer_lowers_knowledge() -> Result<()> {
        let result = bkt(0.5, 0.1, 0.2, 0.1, false)?;
        assert!((result.p_know_after - 0.05 / 0.45).abs() < 1e-12);
        assert!((result.p_know_next - 0.2).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn bkt_posteriors_stay_in_unit_interval() -> Result<()> {
        let grid = [0.0, 0.3, 0.7, 1.0];
        for &p_know in &grid {
            for &p_guess in &grid {
                for &p_slip in &grid {
                    for correct in [true, false] {
                        let result = bkt(p_know, 0.1, p_guess, p_slip, correct)?;
                        assert!((0.0..=1.0).contains(&result.p_know_after));
                        assert!((0.0..=1.0).contains(&result.p_know_next));
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn bkt_degenerate_evidence_keeps_prior() -> Result<()> {
        // impossible correct answer
        let result = bkt(0.0, 0.3, 0.0, 0.5, true)?;
        assert_eq!(result.p_correct, 0.0);
        assert_eq!(result.p_know_after, 0.0);
        assert!((result.p_know_next - 0.3).abs() < 1e-12);

        // impossible wrong answer
        let result = bkt(1.0, 0.3, 0.2, 0.0, false)?;
        assert_eq!(result.p_know_after, 1.0);
        Ok(())
    }

    #[test]
    fn bkt_rejects_non_probabilities() {
        assert!(bkt(1.2, 0.1, 0.2, 0.1, true).is_err());
        assert!(bkt(0.5, f64::NAN, 0.2, 0.1, true).is_err());
    }

    #[test]
    fn dkt_forward_pass() -> Result<()> {
        let result = dkt(&[1.0, 0.0], &[0.5])?;
        result.hidden_activations.assert_approx_eq([0.5f64.tanh(), 0.0]);
        let mean = 0.5f64.tanh() / 2.0;
        let expected = 1.0 / (1.0 + (-mean).exp());
        assert!((result.knowledge_state - expected).abs() < 1e-12);
        assert!((result.confidence - (expected - 0.5) * 2.0).abs() < 1e-12);
        let names = result.layers.iter().map(|l| l.name).collect_vec();
        assert_eq!(names, [LayerName::Input, LayerName::Hidden, LayerName::Output]);
        Ok(())
    }

    #[test]
    fn dkt_hidden_layer_is_capped() -> Result<()> {
        let features = vec![1.0; 25];
        let result = dkt(&features, &[0.2, -0.2])?;
        assert_eq!(result.hidden_activations.len(), DKT_MAX_HIDDEN);
        // alternating weights cancel out
        assert!((result.knowledge_state - 0.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn dkt_without_history_is_undecided() -> Result<()> {
        let result = dkt(&[], &[])?;
        assert_eq!(result.knowledge_state, 0.5);
        assert_eq!(result.confidence, 0.0);
        assert!(result.hidden_activations.is_empty());
        assert!(dkt(&[1.0], &[]).is_err());
        Ok(())
    }

    #[test]
    fn reachability_follows_answers() {
        let matrix = reachability_matrix(&[true, false, true]);
        assert_eq!(
            matrix,
            array![
                [1u8, 1, 1, 1],
                [0, 1, 1, 1],
                [0, 0, 0, 1],
                [0, 0, 0, 0],
            ]
        );
    }

    #[test]
    fn dp_reports_highest_reachable_counts() {
        let result = dp(reachability_matrix(&[true, false, true]));
        let rows = result.path.iter().map(|cell| cell.row).collect_vec();
        assert_eq!(rows, [0, 1, 1, 2]);
        assert_eq!(result.max_value, 2);
        assert_eq!(result.dp.dim(), (4, 4));
    }

    #[test]
    fn dp_of_all_wrong_answers() {
        let result = dp(reachability_matrix(&[false, false]));
        assert_eq!(result.max_value, 0);
        assert!(result.path.iter().all(|cell| cell.row == 0));
        let empty = dp(Array2::zeros((0, 0)));
        assert!(empty.path.is_empty());
        assert_eq!(empty.max_value, 0);
    }

    #[test]
    fn hmm_caps_path_length() -> Result<()> {
        let transitions = vec![vec![0.7, 0.3], vec![0.4, 0.6]];
        let result = hmm(&[1, 0, 1, 1, 0, 1, 1, 1], &[0, 1], &transitions)?;
        assert_eq!(result.best_path.len(), HMM_MAX_STEPS);
        assert_eq!(result.steps.len(), HMM_MAX_STEPS);
        assert_eq!(result.best_path, [0, 0, 0, 0, 0]);
        assert!((result.probability - 0.5 * 0.7f64.powi(4)).abs() < 1e-12);
        assert_eq!(result.state_sequence[0].name, "Knowledge_0");
        Ok(())
    }

    #[test]
    fn hmm_short_sequence_and_missing_transitions() -> Result<()> {
        let result = hmm(&[1, 1, 0], &[0, 1], &[])?;
        assert_eq!(result.best_path, [0, 0, 0]);
        assert!((result.probability - 0.125).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn hmm_edge_cases() -> Result<()> {
        let result = hmm(&[], &[0, 1], &[])?;
        assert!(result.best_path.is_empty());
        assert_eq!(result.probability, 0.0);
        assert!(hmm(&[1], &[], &[]).is_err());
        Ok(())
    }
}
