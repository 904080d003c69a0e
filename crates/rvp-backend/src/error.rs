//! Error kinds shared by every backend implementation.

/// Classification of a backend failure, matching the session driver's
/// abort-status mapping one-to-one.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Upstream was unreachable after the configured retry budget.
    #[error("upstream {host}:{port} unreachable after {attempts} attempts")]
    NotFound {
        host: String,
        port: u16,
        attempts: u32,
    },

    /// Connection reset, protocol violation, or other mid-session failure
    /// originating from the remote end.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Local misconfiguration, e.g. a setting combination the backend
    /// cannot satisfy (SFTP requested without a username, repeater fields
    /// set on a backend that doesn't support repeating).
    #[error("server misconfiguration: {0}")]
    Server(String),

    /// A per-frame allocation or conversion failure. Logged and the
    /// offending frame dropped; never escalated past the call site that
    /// produced it.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Unrecoverable resource exhaustion (scratch allocation, pipe
    /// creation) at startup. The operation returns `None`/`Err` and the
    /// caller escalates to a session abort.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl BackendError {
    /// The user-visible status code for a session-abort message.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "UPSTREAM_NOT_FOUND",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Server(_) => "SERVER_ERROR",
            Self::Transient(_) => "TRANSIENT",
            Self::Fatal(_) => "FATAL",
        }
    }

    /// Whether this error should abort the session, as opposed to being
    /// absorbed at the frame level.
    #[must_use]
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, Self::Transient(_))
    }
}
