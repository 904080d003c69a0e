//! Session-abort reporting (spec.md §7 "User-visible behavior": "every
//! hard failure produces exactly one session-abort message with a status
//! code and a human-readable reason").

use rvp_backend::BackendError;

/// The one abort message a session produces on a hard failure, carrying
/// the same status-code vocabulary as [`BackendError::status_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAbort {
    pub status: &'static str,
    pub reason: String,
}

impl std::fmt::Display for SessionAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.reason)
    }
}

impl From<&BackendError> for SessionAbort {
    fn from(err: &BackendError) -> Self {
        Self {
            status: err.status_code(),
            reason: err.to_string(),
        }
    }
}

impl From<BackendError> for SessionAbort {
    fn from(err: BackendError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_upstream_not_found_status() {
        let err = BackendError::NotFound {
            host: "vnc.example".to_string(),
            port: 5900,
            attempts: 3,
        };
        let abort: SessionAbort = (&err).into();
        assert_eq!(abort.status, "UPSTREAM_NOT_FOUND");
        assert!(abort.reason.contains("vnc.example"));
    }

    #[test]
    fn server_misconfiguration_maps_to_server_error_status() {
        let err = BackendError::Server("SFTP requires a username".to_string());
        let abort: SessionAbort = err.into();
        assert_eq!(abort.status, "SERVER_ERROR");
    }
}
