use thiserror::Error;

use crate::types::ComponentKind;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Template not found for {kind}: {template}")]
    TemplateNotFound {
        kind: ComponentKind,
        template: String,
    },

    #[error("Template registration failed for {template}: {error}")]
    TemplateRegistration { template: String, error: String },

    #[error("Template rendering failed for {kind}: {error}")]
    RenderFailed { kind: ComponentKind, error: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PayloadError>;
