//! The module contains the errors the engine can throw.
//!
//! Every error carries a stable machine-readable kind (see
//! [`EngineError::kind`]) plus a human message:
//!
//! - [`Validation`] malformed or out-of-range input (e.g. amount <= 0).
//! - [`NotFound`] a referenced check, user or station is absent.
//! - [`Conflict`] invalid state transition or a lost concurrent transition.
//! - [`Forbidden`] role or station mismatch.
//! - [`Unauthenticated`] missing, unknown or expired session.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`NotFound`]: EngineError::NotFound
//!  [`Conflict`]: EngineError::Conflict
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`Unauthenticated`]: EngineError::Unauthenticated
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Stable, machine-readable error kind exposed to API callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "authorization_error",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Database(_) => "internal_error",
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Unauthenticated(a), Self::Unauthenticated(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            EngineError::Validation("x".to_string()).kind(),
            "validation_error"
        );
        assert_eq!(EngineError::NotFound("x".to_string()).kind(), "not_found");
        assert_eq!(EngineError::Conflict("x".to_string()).kind(), "conflict");
        assert_eq!(
            EngineError::Forbidden("x".to_string()).kind(),
            "authorization_error"
        );
        assert_eq!(
            EngineError::Database(DbErr::Custom("boom".to_string())).kind(),
            "internal_error"
        );
    }
}
