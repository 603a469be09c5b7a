//! Convenience result type alias for DataShare.

use crate::error::AppError;

/// A specialized `Result` type for DataShare operations.
pub type AppResult<T> = Result<T, AppError>;
