use std::env;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TOKEN: &str = "dev-token";

/// Where the backend lives and which token to present to it.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_TOKEN)
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Reads `MESTO_API_URL` and `MESTO_TOKEN`, falling back to the local
    /// development backend.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(
            lookup("MESTO_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            lookup("MESTO_TOKEN").unwrap_or_else(|| DEFAULT_TOKEN.to_string()),
        )
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
