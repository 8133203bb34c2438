use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("Variation exhausted after {0} attempts")]
    VariationExhausted(usize),
}

pub type SynthResult<T> = Result<T, SynthError>;
