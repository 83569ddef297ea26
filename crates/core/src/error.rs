use std::num::NonZeroU32;

/// Errors produced by the analysis pipeline.
///
/// Transport failures (`TimedOut`, `Backend`) originate in the AI request
/// client and are distinct from validation failures (`InvalidJson`,
/// `IncompleteAnswer`), which mean the model answered but the answer was
/// unusable after the configured number of attempts.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Request timed out.")]
    TimedOut,
    #[error("{0}")]
    Backend(String),
    #[error("The AI returned invalid JSON after {0} attempts.")]
    InvalidJson(NonZeroU32),
    #[error("The AI returned an incomplete answer after {0} attempts.")]
    IncompleteAnswer(NonZeroU32),
    #[error("analysis cancelled")]
    Cancelled,
    #[error("invalid question file: {0}")]
    InvalidQuestionFile(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
