//! Access-token checks for the terminal endpoints.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

/// Decides whether a presented token may open terminals. The static list
/// below is the default; anything backed by a real identity provider slots
/// in behind this trait.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> bool;
}

/// Fixed token list from the config file.
pub struct StaticTokenValidator {
    tokens: Vec<SecretString>,
}

impl StaticTokenValidator {
    pub fn new(tokens: Vec<SecretString>) -> Self {
        Self { tokens }
    }
}

impl TokenValidator for StaticTokenValidator {
    fn validate(&self, token: &str) -> bool {
        !token.is_empty() && self.tokens.iter().any(|t| t.expose_secret() == token)
    }
}

/// Token lookup order: explicit query parameter first, then the
/// `Authorization` header with or without a `Bearer` prefix.
pub fn extract_token(query_token: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query_token {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
