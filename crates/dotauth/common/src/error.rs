// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Error taxonomy for the access-control authority

use thiserror::Error;

/// Failure of the persistence collaborator
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Malformed {entity} row {id}: {message}")]
    MalformedRow { entity: &'static str, id: i64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Authority error types
#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthzError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AuthzError::InvalidInput { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AuthzError::NotFound { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AuthzError::Unauthorized { message: message.into() }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        AuthzError::Unauthenticated { message: message.into() }
    }

    /// Whether the caller supplied something wrong (never worth retrying)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthzError::Store(_))
    }

    /// Whether this is a permission denial
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthzError::Unauthorized { .. })
    }

    /// Whether a referenced entity was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthzError::NotFound { .. })
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthzError::InvalidInput { .. } => "invalid_input",
            AuthzError::NotFound { .. } => "not_found",
            AuthzError::Unauthorized { .. } => "unauthorized",
            AuthzError::Unauthenticated { .. } => "unauthenticated",
            AuthzError::Store(_) => "store_error",
        }
    }
}

/// Result type for authority operations
pub type AuthzResult<T> = Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AuthzError::not_found("role 1").is_client_error());
        assert!(AuthzError::unauthorized("denied").is_unauthorized());

        let store = AuthzError::from(StoreError::Unavailable { message: "down".to_string() });
        assert!(!store.is_client_error());
        assert_eq!(store.error_type(), "store_error");
        assert_eq!(store.to_string(), "Store error: Storage unavailable: down");
    }
}
