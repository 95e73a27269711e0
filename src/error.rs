//! Error types for the intake core.

use serde::Serialize;
use uuid::Uuid;

use crate::intake::state::StepId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A single failed field rule, shown inline next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every rule a step draft failed. Blocks forward navigation; the user fixes
/// the fields and tries again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} field(s) need attention: {}", .errors.len(), field_list(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Whether a given field failed.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn field_list(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Misuse of the step flow by a caller.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Answers for step {submitted} submitted while step {active} is active")]
    WrongStep { active: StepId, submitted: StepId },

    #[error("Consent can only be completed on the consent step (active: {active})")]
    NotOnConsent { active: StepId },

    #[error("Intake session {id} not found")]
    SessionNotFound { id: Uuid },
}

/// Signature capture and encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),

    #[error("Invalid signature data URI: {0}")]
    InvalidDataUri(String),

    #[error("Signature surface of {width}x{height} device pixels is too large")]
    SurfaceTooLarge { width: u32, height: u32 },
}

/// Result type alias for the intake core.
pub type Result<T> = std::result::Result<T, Error>;
