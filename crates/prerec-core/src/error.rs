use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrerecError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PrerecError {
    /// Short error code string for logs and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PrerecError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PrerecError>;
