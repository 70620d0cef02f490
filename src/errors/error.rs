use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Request validation errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum ValidationError {
    #[error("Validation error on {field}: {message}")]
    Field { field: String, message: String },

    #[error("{0}")]
    Custom(String),
}

impl ValidationError {
    pub fn field(field: &str, message: &str) -> Self {
        ValidationError::Field {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn custom(message: &str) -> Self {
        ValidationError::Custom(message.to_string())
    }
}

/// Errors produced by the codec adapter and the external tool layer.
///
/// `ToolUnavailable` is deliberately distinct from the other variants: it
/// signals an environment/deployment problem (missing binary), not a data
/// problem, and the escalation chain treats it as "skip this tier" rather
/// than "this tier failed".
#[derive(Debug, Error, Clone, Serialize)]
pub enum EncodeError {
    #[error("Invalid or corrupt input: {0}")]
    InvalidInput(String),

    #[error("External tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("External tool timed out after {0:?}")]
    ToolTimeout(Duration),

    #[error("Encoder failure: {0}")]
    Internal(String),
}

/// Why a target byte budget could not be met, classified from measured
/// signals only (ratio of best achieved size to original size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShortfallCause {
    /// Best attempt barely moved the size: content is dominated by
    /// already-compressed or non-resamplable data (vector text, fonts).
    LowCompressibleContent,

    /// Attempts did shrink the file substantially, just not enough:
    /// content is image-dominated and a lower target may be reachable
    /// with external preprocessing.
    ImageDominatedContent,

    /// The target is below what any quality/resolution can produce for
    /// this input (smaller than the floor of the encoder).
    TargetBelowFloor,
}

/// Diagnostic payload carried by `DomainError::BudgetUnreachable`.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetShortfall {
    pub original_size: u64,
    pub target_bytes: u64,
    /// Smallest output actually produced across all attempted tiers.
    pub best_achieved_size: u64,
    pub cause: ShortfallCause,
    /// Human-readable suggestion; part of the contract because it depends
    /// on which tiers were tried.
    pub suggestion: String,
}

/// Domain-level errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{context}: {source}")]
    Encode {
        context: String,
        #[source]
        source: EncodeError,
    },

    #[error(
        "Target size unreachable: best achieved {} bytes against a target of {} bytes",
        .0.best_achieved_size,
        .0.target_bytes
    )]
    BudgetUnreachable(BudgetShortfall),

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    #[error("PDF is password protected and no password was supplied")]
    PasswordRequired,

    #[error("The supplied PDF password is incorrect")]
    InvalidPassword,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Wrap a codec/tool error with the tier and parameters it occurred in.
    pub fn encode(context: impl Into<String>, source: EncodeError) -> Self {
        DomainError::Encode {
            context: context.into(),
            source,
        }
    }
}
