//! Alist API Error Types
//!
//! Structured errors for upstream operations. Variants separate the cases
//! the client handles itself (a 401 envelope gets one relogin-and-retry)
//! from the ones it surfaces to callers. All variants are cloneable so a
//! coalesced fetch can hand the same failure to every waiter.

/// Alist API error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum AlistError {
    #[error("Login rejected: {0}")]
    Auth(String),

    #[error("Too many login attempts")]
    TooManyLoginAttempts,

    #[error("Unauthorized: session rejected by upstream")]
    Unauthorized,

    #[error("Upstream error ({0}): {1}")]
    Upstream(u16, String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AlistError {
    /// Map a non-success envelope to an error
    ///
    /// Code 401 becomes `Unauthorized`, which the client treats as a stale
    /// session; every other code is surfaced verbatim with the upstream
    /// message.
    pub fn from_envelope(code: u16, message: &str) -> Self {
        match code {
            401 => AlistError::Unauthorized,
            _ => AlistError::Upstream(code, message.to_string()),
        }
    }

    /// Whether this error means the session token was rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AlistError::Unauthorized)
    }

    /// Whether this error came from the transport rather than the API
    pub fn is_transport(&self) -> bool {
        matches!(self, AlistError::Transport(_))
    }
}

impl From<reqwest::Error> for AlistError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AlistError::InvalidResponse(err.to_string())
        } else {
            AlistError::Transport(err.to_string())
        }
    }
}
