use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub static_base_url: String,
    pub session_token: Option<String>,
    pub session_user_id: Option<i64>,
    pub session_technician_id: Option<i64>,
    pub session_role: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            static_base_url: "http://localhost:5000".to_string(),
            session_token: None,
            session_user_id: None,
            session_technician_id: None,
            session_role: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let api_base_url = env::var("API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| Self::default().api_base_url);
        Ok(Self {
            static_base_url: env::var("STATIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| Self::static_base_from_api(&api_base_url)),
            api_base_url,
            session_token: env::var("SESSION_TOKEN").ok().filter(|t| !t.is_empty()),
            session_user_id: env::var("SESSION_USER_ID").ok().and_then(|v| v.parse().ok()),
            session_technician_id: env::var("SESSION_TECHNICIAN_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            session_role: env::var("SESSION_ROLE").ok().filter(|r| !r.is_empty()),
        })
    }

    /// Same host as the API, used when only the API URL is known.
    pub fn static_base_from_api(api_base_url: &str) -> String {
        api_base_url
            .trim_end_matches('/')
            .trim_end_matches("/api")
            .to_string()
    }
}
