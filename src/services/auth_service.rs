use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::session::{parse_role, Session, UserRole};

/// Claims issued by the backend at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
}

pub struct AuthService;

impl AuthService {
    /// Reads the claims without checking the signature: the signing key lives
    /// on the backend, which verifies every call anyway. Expiry is checked here
    /// so a dead token never reaches the network.
    pub fn inspect_token(token: &str) -> ClientResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;

        let token_data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
        let claims = token_data.claims;

        if claims.exp <= Utc::now().timestamp() {
            return Err(ClientError::NotAuthenticated("token expired".to_string()));
        }

        Ok(claims)
    }

    /// Builds a session from the token; ids and role from the token fill in
    /// whatever was not given explicitly.
    pub fn session_from_token(
        token: &str,
        user_id: Option<i64>,
        technician_id: Option<i64>,
        role: Option<&str>,
    ) -> ClientResult<Session> {
        let claims = Self::inspect_token(token)?;

        let role = role
            .map(parse_role)
            .or_else(|| claims.role.as_deref().map(parse_role))
            .unwrap_or_default();

        let mut session = Session::new(token)
            .with_user_id(user_id.unwrap_or(claims.user_id))
            .with_role(role);

        if let Some(technician_id) = technician_id {
            session = session.with_technician_id(technician_id);
        } else if role == UserRole::Technician {
            session = session.with_technician_id(claims.user_id);
        }

        tracing::debug!(
            user_id = ?session.user_id,
            technician_id = ?session.technician_id,
            role = ?session.role,
            "Session restored from token"
        );
        Ok(session)
    }

    pub fn session_from_config(config: &Config) -> ClientResult<Session> {
        let token = config
            .session_token
            .as_deref()
            .ok_or_else(|| ClientError::NotAuthenticated("SESSION_TOKEN is not set".to_string()))?;

        Self::session_from_token(
            token,
            config.session_user_id,
            config.session_technician_id,
            config.session_role.as_deref(),
        )
    }
}

#[cfg(test)]
pub(crate) fn issue_test_token(user_id: i64, role: &str, ttl_seconds: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        user_id,
        email: Some(format!("user{}@example.com", user_id)),
        role: Some(role.to_string()),
        exp: Utc::now().timestamp() + ttl_seconds,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .unwrap()
}
