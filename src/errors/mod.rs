mod error;

pub use error::{
    BudgetShortfall, DomainError, EncodeError, ShortfallCause, ValidationError,
};

/// Result type for codec adapter operations
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
