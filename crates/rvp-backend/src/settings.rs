//! Backend connection settings (spec.md §6).

use serde::{Deserialize, Serialize};

/// Inputs to [`crate::Backend`] connection establishment, shared by every
/// implementation. Fields the active backend ignores (e.g. `color_depth`
/// on the vendor-SDK backend) are still accepted so a single configuration
/// file works across backend choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub hostname: String,
    pub port: u16,

    /// `None` disables password authentication.
    pub password: Option<String>,

    /// Space-separated wire encoding list. Advisory; the vendor-SDK
    /// backend ignores it entirely.
    pub encodings: String,

    /// 8, 16, 24, or 32. Library backend only.
    pub color_depth: u8,

    /// Disables clipboard and input delivery when set.
    pub read_only: bool,

    /// Repeater target. Unsupported by the vendor-SDK backend.
    pub dest_host: Option<String>,
    pub dest_port: Option<u16>,

    /// Incoming-connect (listen) mode. Unsupported by the vendor-SDK backend.
    pub reverse_connect: bool,
    pub listen_timeout_ms: u32,

    /// Render the cursor remotely (composited server-side) vs. locally.
    pub remote_cursor: bool,

    /// Override red/blue channel order for this connection.
    pub swap_red_blue: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: 5900,
            password: None,
            encodings: "tight zrle hextile raw".to_string(),
            color_depth: 32,
            read_only: false,
            dest_host: None,
            dest_port: None,
            reverse_connect: false,
            listen_timeout_ms: 0,
            remote_cursor: true,
            swap_red_blue: false,
        }
    }
}

impl BackendSettings {
    /// Repeater mode requires both a destination host and port; a lone
    /// `dest_host` or `dest_port` is a server misconfiguration.
    #[must_use]
    pub fn repeater_target(&self) -> Option<(&str, u16)> {
        match (self.dest_host.as_deref(), self.dest_port) {
            (Some(host), Some(port)) => Some((host, port)),
            _ => None,
        }
    }
}
