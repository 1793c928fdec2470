use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevoiceError {
    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Speech recognition failed: {0}")]
    Recognition(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Failed to load model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Cannot compose a timeline from zero segments")]
    EmptyTimeline,

    #[error("Time stretch failed: {0}")]
    TimeStretch(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Another run is already in progress")]
    RunInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, RevoiceError>;
