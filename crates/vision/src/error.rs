use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("no Gemini API key configured")]
    MissingApiKey,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, VisionError>;
