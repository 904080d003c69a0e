//! Session configuration, loaded the same way as
//! `cosmic-ext-rdp-broker/src/config.rs`: TOML from a path, falling back
//! to in-code defaults when the file is absent.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rvp_backend::BackendSettings;
use serde::{Deserialize, Serialize};

/// Default config directory under `$XDG_CONFIG_HOME`.
const CONFIG_DIR: &str = "rvp-session";
/// Default config file name.
const CONFIG_FILE: &str = "config.toml";

/// Resolve the default config file path: `$XDG_CONFIG_HOME/rvp-session/config.toml`,
/// or `~/.config/rvp-session/config.toml` if `$XDG_CONFIG_HOME` is unset.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Top-level session configuration (spec.md §6 "Backend settings
/// structure" plus the ambient retry/video knobs the session driver
/// needs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: BackendSettings,

    /// Additional connection attempts after the first failure
    /// (spec.md §4.8 step 1).
    pub retries: u32,

    /// Video encoding is only enabled when this is present.
    pub video: Option<VideoConfig>,
}

/// Video encoder configuration (spec.md §6 "Video encoder configuration").
/// Framerate is deliberately absent: it is fixed at 25fps
/// (spec.md §4.4) and not operator-configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub bitrate_bps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec: "h264".to_string(),
            width: 1280,
            height: 720,
            bitrate_bps: 4_000_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            retries: 5,
            video: None,
        }
    }
}

/// Load the session configuration from `path`, or [`default_config_path`]
/// if `path` is `None`. Returns the default configuration if the file does
/// not exist; an absent config file is not an error, an unparseable one is.
pub fn load(path: Option<&Path>) -> Result<SessionConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };

    if !path.exists() {
        tracing::debug!(?path, "session config not found, using defaults");
        return Ok(SessionConfig::default());
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read session config: {}", path.display()))?;

    let config: SessionConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse session config: {}", path.display()))?;

    tracing::info!(?path, "session configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load(Some(Path::new("/nonexistent/rvp-session-config-test.toml"))).unwrap();
        assert_eq!(config.retries, 5);
        assert_eq!(config.backend.port, 5900);
        assert!(config.video.is_none());
    }

    #[test]
    fn parses_a_minimal_toml_document() {
        let dir = std::env::temp_dir().join(format!("rvp-session-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
            retries = 2

            [backend]
            hostname = "vnc.example.internal"
            port = 5901

            [video]
            codec = "h264"
            width = 640
            height = 480
            bitrate_bps = 1000000
            "#,
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.retries, 2);
        assert_eq!(config.backend.hostname, "vnc.example.internal");
        assert_eq!(config.backend.port, 5901);
        assert_eq!(config.video.unwrap().width, 640);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
