//! Error types shared by the configuration store and the client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("'{prefix}' matches more than one {kind}: {matches}")]
    Ambiguous {
        kind: &'static str,
        prefix: String,
        matches: String,
    },

    #[error("Illegal operation: {0}")]
    IllegalOperation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn illegal(msg: impl Into<String>) -> Self {
        Self::IllegalOperation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_entity() {
        let err = StoreError::not_found("stack", "prod");
        assert_eq!(err.to_string(), "stack 'prod' not found");
        assert!(err.is_not_found());

        let err = StoreError::already_exists("workspace", "default");
        assert_eq!(err.to_string(), "workspace 'default' already exists");
        assert!(!err.is_not_found());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: StoreError = io.into();
        assert!(err.to_string().starts_with("IO error"));
    }
}
