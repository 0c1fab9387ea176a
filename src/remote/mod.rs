use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod client;
pub mod dto;
#[cfg(test)]
pub mod fake;

pub use client::ClerkClient;
pub use dto::{ApiErrorDetail, CreateUserRequest, RemoteUser};

/// How the driver should treat a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The user already exists remotely.
    Conflict,
    /// Too many requests; retry after a cooldown.
    RateLimited,
    Other,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("remote returned {status}: {}", summarize(.errors))]
    Status {
        status: u16,
        errors: Vec<ApiErrorDetail>,
    },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

fn summarize(errors: &[ApiErrorDetail]) -> String {
    if errors.is_empty() {
        return "no error details".into();
    }
    errors
        .iter()
        .map(|e| e.long_message.as_deref().unwrap_or(&e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status() {
            Some(422) => ErrorKind::Conflict,
            Some(429) => ErrorKind::RateLimited,
            _ => ErrorKind::Other,
        }
    }

    /// Structured error payload for the outcome log.
    pub fn detail(&self) -> Value {
        match self {
            ApiError::Status { errors, .. } if !errors.is_empty() => {
                serde_json::to_value(errors).unwrap_or_else(|_| Value::String(self.to_string()))
            }
            _ => Value::String(self.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// User operations of the identity platform's backend API.
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn create_user(&self, request: &CreateUserRequest) -> Result<RemoteUser, ApiError>;
    async fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<RemoteUser>, ApiError>;
    async fn delete_user(&self, id: &str) -> Result<(), ApiError>;
}
