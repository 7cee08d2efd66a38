use ndarray::Array2;
use serde::{Serialize, Serializer};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{QuizAlgoError, Result};
use crate::knowledge::{BktResult, DktResult, DpResult, HmmResult};
use crate::reward::{FenwickResult, GreedyResult, MdpResult, VariableRatioResult};
use crate::scheduling::{FsrsResult, MinHeapResult, RoundRobinResult, Sm2Result};
use crate::selection::{AStarResult, KnapsackResult, QLearningResult, ThompsonResult, UcbResult};

/// The four groups an algorithm can be selected from for a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Family {
    ReviewScheduling,
    QuestionSelection,
    RewardSystem,
    KnowledgeTracing,
}

/// Identifier of every algorithm in the library.
///
/// The string forms are the identifiers used by the quiz UI (`"SM2"`,
/// `"QLearning"`, ...). Parsing is case-insensitive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
    Serialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(into = "&'static str")]
pub enum Algorithm {
    #[strum(serialize = "SM2")]
    Sm2,
    #[strum(serialize = "FSRS")]
    Fsrs,
    MinHeap,
    AdaptiveRoundRobin,
    #[strum(serialize = "UCB")]
    Ucb,
    ThompsonSampling,
    QLearning,
    Knapsack,
    AStar,
    FenwickTree,
    Greedy,
    VariableRatio,
    #[strum(serialize = "MDP")]
    Mdp,
    #[strum(serialize = "BKT")]
    Bkt,
    #[strum(serialize = "DKT")]
    Dkt,
    #[strum(serialize = "DP")]
    Dp,
    #[strum(serialize = "HMM")]
    Hmm,
}

impl Algorithm {
    pub fn parse(name: &str) -> Result<Self> {
        name.parse().map_err(|_| QuizAlgoError::UnknownAlgorithm {
            name: name.to_string(),
        })
    }

    pub fn family(self) -> Family {
        use Algorithm::*;
        match self {
            Sm2 | Fsrs | MinHeap | AdaptiveRoundRobin => Family::ReviewScheduling,
            Ucb | ThompsonSampling | QLearning | Knapsack | AStar => Family::QuestionSelection,
            FenwickTree | Greedy | VariableRatio | Mdp => Family::RewardSystem,
            Bkt | Dkt | Dp | Hmm => Family::KnowledgeTracing,
        }
    }

    pub fn display_name(self) -> &'static str {
        use Algorithm::*;
        match self {
            Sm2 => "SM2 Spaced Repetition",
            Fsrs => "FSRS (Free Spaced Repetition Scheduler)",
            MinHeap => "Min-Heap Priority Scheduling",
            AdaptiveRoundRobin => "Adaptive Round Robin",
            Ucb => "Upper Confidence Bound (UCB)",
            ThompsonSampling => "Thompson Sampling",
            QLearning => "Q-Learning",
            Knapsack => "Knapsack Optimization",
            AStar => "A* Search",
            FenwickTree => "Fenwick Tree (Binary Indexed Tree)",
            Greedy => "Greedy Reward Maximization",
            VariableRatio => "Variable Ratio Reinforcement",
            Mdp => "Markov Decision Process (MDP)",
            Bkt => "Bayesian Knowledge Tracing (BKT)",
            Dkt => "Deep Knowledge Tracing (DKT)",
            Dp => "Dynamic Programming Knowledge Tracking",
            Hmm => "Hidden Markov Model (HMM)",
        }
    }

    /// Big-O annotations shown next to a result. Descriptive only.
    pub fn complexity(self) -> Complexity {
        use Algorithm::*;
        let (time, space) = match self {
            Sm2 | Fsrs => ("O(1)", "O(1)"),
            MinHeap => ("O(n log n)", "O(1)"),
            AdaptiveRoundRobin => ("O(n)", "O(1)"),
            Ucb | ThompsonSampling => ("O(n)", "O(1)"),
            QLearning => ("O(1)", "O(|S| × |A|)"),
            Knapsack => ("O(nW)", "O(nW)"),
            AStar => ("O(b^d)", "O(b^d)"),
            FenwickTree => ("O(log n)", "O(n)"),
            Greedy => ("O(n log n)", "O(1)"),
            VariableRatio => ("O(1)", "O(1)"),
            Mdp => ("O(|S|²|A|)", "O(|S|)"),
            Bkt => ("O(1)", "O(1)"),
            Dkt => ("O(n)", "O(n)"),
            Dp => ("O(n²)", "O(n²)"),
            Hmm => ("O(T × N²)", "O(T × N)"),
        };
        Complexity { time, space }
    }

    pub fn description(self) -> &'static str {
        use Algorithm::*;
        match self {
            Sm2 => {
                "SuperMemo 2 algorithm for optimal review scheduling based on difficulty and previous intervals."
            }
            Fsrs => {
                "Modern spaced repetition algorithm that improves upon SM2 with more sophisticated difficulty calculation."
            }
            MinHeap => "Uses a min-heap to prioritize reviews based on urgency and importance scores.",
            AdaptiveRoundRobin => {
                "Round-robin scheduling with adaptive time quantum based on task difficulty and student performance."
            }
            Ucb => {
                "Multi-armed bandit algorithm balancing exploitation of well-performing questions and exploration of untested ones."
            }
            ThompsonSampling => {
                "Bayesian approach to question selection using beta distributions to model question effectiveness."
            }
            QLearning => {
                "Reinforcement learning algorithm that learns optimal question selection policy through interaction."
            }
            Knapsack => {
                "Dynamic programming approach to select optimal combination of questions within time/difficulty constraints."
            }
            AStar => {
                "Heuristic search algorithm for finding optimal learning paths through the question space."
            }
            FenwickTree => {
                "Efficient data structure for cumulative reward calculation and range queries."
            }
            Greedy => {
                "Greedy approach to maximize reward per unit time by prioritizing high-value activities."
            }
            VariableRatio => {
                "Psychological reinforcement schedule that provides rewards on an unpredictable basis to maximize engagement."
            }
            Mdp => {
                "Decision-making framework for optimal reward distribution based on student states and actions."
            }
            Bkt => {
                "Probabilistic model tracking student knowledge state based on correct/incorrect responses."
            }
            Dkt => {
                "Neural network-based approach to model complex patterns in student learning sequences."
            }
            Dp => "Possible correct answers DP matrix.",
            Hmm => {
                "Probabilistic model for inferring hidden knowledge states from observable student responses."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Complexity {
    pub time: &'static str,
    pub space: &'static str,
}

/// Chart vocabulary understood by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VisualizationKind {
    Timeline,
    Curve,
    Tree,
    Gantt,
    Bar,
    Distribution,
    Heatmap,
    Matrix,
    Graph,
    Sequence,
    Network,
    Probability,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visualization {
    #[serde(rename = "type")]
    pub kind: VisualizationKind,
    pub data: serde_json::Value,
}

impl Visualization {
    pub fn new(kind: VisualizationKind, data: serde_json::Value) -> Self {
        Self { kind, data }
    }
}

/// Writes a 2-D table as a list of rows, the shape the dashboard plots.
pub(crate) fn serialize_rows<T, S>(matrix: &Array2<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize + Clone,
    S: Serializer,
{
    serializer.collect_seq(matrix.rows().into_iter().map(|row| row.to_vec()))
}

/// A typed result produced by one algorithm.
pub trait AlgorithmPayload: Into<AlgorithmOutput> {
    const ALGORITHM: Algorithm;

    fn visualization(&self) -> Option<Visualization>;
}

/// The algorithm-specific part of an [`AlgorithmExecutionResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AlgorithmOutput {
    Sm2(Sm2Result),
    Fsrs(FsrsResult),
    MinHeap(MinHeapResult),
    AdaptiveRoundRobin(RoundRobinResult),
    Ucb(UcbResult),
    ThompsonSampling(ThompsonResult),
    QLearning(QLearningResult),
    Knapsack(KnapsackResult),
    AStar(AStarResult),
    FenwickTree(FenwickResult),
    Greedy(GreedyResult),
    VariableRatio(VariableRatioResult),
    Mdp(MdpResult),
    Bkt(BktResult),
    Dkt(DktResult),
    Dp(DpResult),
    Hmm(HmmResult),
}

impl AlgorithmOutput {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            AlgorithmOutput::Sm2(_) => Algorithm::Sm2,
            AlgorithmOutput::Fsrs(_) => Algorithm::Fsrs,
            AlgorithmOutput::MinHeap(_) => Algorithm::MinHeap,
            AlgorithmOutput::AdaptiveRoundRobin(_) => Algorithm::AdaptiveRoundRobin,
            AlgorithmOutput::Ucb(_) => Algorithm::Ucb,
            AlgorithmOutput::ThompsonSampling(_) => Algorithm::ThompsonSampling,
            AlgorithmOutput::QLearning(_) => Algorithm::QLearning,
            AlgorithmOutput::Knapsack(_) => Algorithm::Knapsack,
            AlgorithmOutput::AStar(_) => Algorithm::AStar,
            AlgorithmOutput::FenwickTree(_) => Algorithm::FenwickTree,
            AlgorithmOutput::Greedy(_) => Algorithm::Greedy,
            AlgorithmOutput::VariableRatio(_) => Algorithm::VariableRatio,
            AlgorithmOutput::Mdp(_) => Algorithm::Mdp,
            AlgorithmOutput::Bkt(_) => Algorithm::Bkt,
            AlgorithmOutput::Dkt(_) => Algorithm::Dkt,
            AlgorithmOutput::Dp(_) => Algorithm::Dp,
            AlgorithmOutput::Hmm(_) => Algorithm::Hmm,
        }
    }
}

macro_rules! impl_into_output {
    ($($payload:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$payload> for AlgorithmOutput {
                fn from(payload: $payload) -> Self {
                    AlgorithmOutput::$variant(payload)
                }
            }
        )+
    };
}

impl_into_output!(
    Sm2Result => Sm2,
    FsrsResult => Fsrs,
    MinHeapResult => MinHeap,
    RoundRobinResult => AdaptiveRoundRobin,
    UcbResult => Ucb,
    ThompsonResult => ThompsonSampling,
    QLearningResult => QLearning,
    KnapsackResult => Knapsack,
    AStarResult => AStar,
    FenwickResult => FenwickTree,
    GreedyResult => Greedy,
    VariableRatioResult => VariableRatio,
    MdpResult => Mdp,
    BktResult => Bkt,
    DktResult => Dkt,
    DpResult => Dp,
    HmmResult => Hmm,
);

/// Uniform result returned for every algorithm invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmExecutionResult {
    #[serde(skip)]
    pub algorithm: Algorithm,
    pub algorithm_name: &'static str,
    /// Wall-clock milliseconds, including the configured demo delay.
    pub execution_time: f64,
    pub complexity: Complexity,
    pub description: &'static str,
    pub result: AlgorithmOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
}
