use snafu::Snafu;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum QuizAlgoError {
    #[snafu(display("invalid input: {reason}"))]
    InvalidInput { reason: String },
    #[snafu(display("unknown algorithm: {name}"))]
    UnknownAlgorithm { name: String },
    #[snafu(display("invalid config: {reason}"))]
    InvalidConfig { reason: String },
    #[snafu(display("failed to parse config: {source}"))]
    ConfigParse { source: serde_json::Error },
}

pub type Result<T, E = QuizAlgoError> = std::result::Result<T, E>;
