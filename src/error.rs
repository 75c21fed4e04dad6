use reqwest::StatusCode;
use thiserror::Error;

use crate::models::MaintenanceStatus;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Session expired")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No proposal to confirm")]
    MissingProposal,

    #[error("Cannot {action} a request in status {status}")]
    InvalidTransition {
        action: &'static str,
        status: MaintenanceStatus,
    },

    #[error("Request {0} is already being updated")]
    AlreadyInFlight(i64),

    #[error("Server error {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed server data: {0}")]
    Decode(String),

    #[error("Invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        ClientError::Validation(message)
    }
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::NotAuthenticated(_) => "NOT_AUTHENTICATED",
            ClientError::Unauthorized => "UNAUTHORIZED",
            ClientError::Forbidden => "FORBIDDEN",
            ClientError::NotFound(_) => "NOT_FOUND",
            ClientError::Validation(_) => "VALIDATION_ERROR",
            ClientError::MissingProposal => "MISSING_PROPOSAL",
            ClientError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ClientError::AlreadyInFlight(_) => "ALREADY_IN_FLIGHT",
            ClientError::Http { .. } => "HTTP_ERROR",
            ClientError::Transport(_) => "TRANSPORT_ERROR",
            ClientError::Decode(_) => "DECODE_ERROR",
            ClientError::Jwt(_) => "INVALID_TOKEN",
        }
    }

    /// Message suitable for an inline alert. Server and transport details
    /// are logged where the call failed and never shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::NotAuthenticated(_) | ClientError::Unauthorized | ClientError::Jwt(_) => {
                "Please log in again".to_string()
            }
            ClientError::Forbidden => "You are not allowed to do that".to_string(),
            ClientError::NotFound(msg) | ClientError::Validation(msg) => msg.clone(),
            ClientError::MissingProposal => "No proposal to confirm".to_string(),
            ClientError::InvalidTransition { .. } | ClientError::AlreadyInFlight(_) => {
                self.to_string()
            }
            ClientError::Http { .. } | ClientError::Transport(_) | ClientError::Decode(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// Failures detected before anything was sent to the backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::NotAuthenticated(_)
                | ClientError::Validation(_)
                | ClientError::MissingProposal
                | ClientError::InvalidTransition { .. }
                | ClientError::AlreadyInFlight(_)
        )
    }

    /// The session can no longer be used and the user has to log in.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::NotAuthenticated(_) | ClientError::Unauthorized | ClientError::Jwt(_)
        )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
