use std::fmt;

/// Access credentials, optionally temporary (with a session token).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub secret_id:     String,
    pub secret_key:    String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id:     secret_id.into(),
            secret_key:    secret_key.into(),
            session_token: None,
        }
    }

    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }

    /// Both halves of the key pair are present.
    pub fn is_complete(&self) -> bool { !self.secret_id.is_empty() && !self.secret_key.is_empty() }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}
