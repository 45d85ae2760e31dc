use thiserror::Error;

/// All errors produced by guardline-core.
#[derive(Debug, Error)]
pub enum GuardlineError {
    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("model load error: {0}")]
    ModelLoad(String),

    #[error("acoustic engine used before load completed")]
    NotLoaded,

    #[error("engine runtime error: {0}")]
    EngineRuntime(String),

    #[error("vocabulary error: {0}")]
    Vocabulary(String),

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GuardlineError>;
