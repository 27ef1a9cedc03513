use serde::{Deserialize, Serialize};

/// Credentials issued by the authentication service after login.
///
/// The session is handed explicitly to whatever needs it: the telemetry
/// channel puts the token on its CONNECT frame, route guards inspect the
/// role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    token: Option<String>,
    role: Option<String>,
}

impl AuthSession {
    pub fn new(token: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            role: Some(role.into()),
        }
    }

    /// A session that never logged in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated()
            && self
                .role
                .as_deref()
                .is_some_and(|role| role.eq_ignore_ascii_case("ADMIN"))
    }

    pub fn logout(&mut self) {
        self.token = None;
        self.role = None;
    }

    /// Value for an `Authorization` header, if there is a token.
    pub fn bearer(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {token}"))
    }
}
