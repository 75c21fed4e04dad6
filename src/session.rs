use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    #[serde(rename = "Buyer/Tenant")]
    Tenant,
    Owner,
    Technician,
    Administrator,
    Unknown,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Unknown
    }
}

pub fn parse_role(role_str: &str) -> UserRole {
    match role_str.trim().to_ascii_lowercase().as_str() {
        "buyer/tenant" | "tenant" | "buyer" => UserRole::Tenant,
        "owner" => UserRole::Owner,
        "technician" => UserRole::Technician,
        "administrator" | "admin" => UserRole::Administrator,
        _ => UserRole::Unknown,
    }
}

pub fn is_technician(role: &UserRole) -> bool {
    matches!(role, UserRole::Technician | UserRole::Administrator)
}

pub fn is_tenant(role: &UserRole) -> bool {
    matches!(role, UserRole::Tenant | UserRole::Administrator)
}

/// Who is acting. Passed into every workflow call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    pub user_id: Option<i64>,
    pub technician_id: Option<i64>,
    pub role: UserRole,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_technician_id(mut self, technician_id: i64) -> Self {
        self.technician_id = Some(technician_id);
        self
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && (self.user_id.is_some() || self.technician_id.is_some())
    }

    pub fn bearer(&self) -> ClientResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ClientError::NotAuthenticated("missing token".to_string()))
    }

    pub fn require_user_id(&self) -> ClientResult<i64> {
        self.user_id
            .ok_or_else(|| ClientError::NotAuthenticated("missing user id".to_string()))
    }

    /// Technician id, falling back to the user id of a technician account.
    pub fn require_technician_id(&self) -> ClientResult<i64> {
        self.technician_id
            .or_else(|| {
                if self.role == UserRole::Technician {
                    self.user_id
                } else {
                    None
                }
            })
            .ok_or_else(|| ClientError::NotAuthenticated("missing technician id".to_string()))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drops the credentials when `err` means they are no longer accepted.
    /// Returns true when the user has to log in again.
    pub fn clear_on(&mut self, err: &ClientError) -> bool {
        if err.requires_login() {
            tracing::warn!("Clearing session: {}", err);
            self.clear();
            true
        } else {
            false
        }
    }
}
