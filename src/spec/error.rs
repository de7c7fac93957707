use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Failed to read spec {path}: {error}")]
    Read { path: String, error: String },

    #[error("Failed to parse spec {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Spec validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },
}

pub type Result<T> = std::result::Result<T, SpecError>;
