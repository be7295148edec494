//! # Player Configuration
//!
//! One TOML file for the whole player. Every section is optional:
//!
//! ```toml
//! output = "shared"          # shared | udp | fake
//! pattern = "grid"           # solid | grid | lines
//! frame_rate = 30
//! shared_file = "/tmp/skyscreen.frame"
//!
//! [geometry]
//! vane_count = 360
//! vane_length = 288
//! channel_count = 3
//!
//! [sync]
//! mode = "message_bus"
//! port = 5555
//!
//! [stream]
//! target = "skyscreen.local:5555"
//!
//! [renderer]
//! command = "skyscreen-render"
//! args = ["--fullscreen"]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skyscreen_core::{Geometry, SkyError, SkyResult, SyncConfig};
use skyscreen_net::StreamConfig;

use crate::clock::DEFAULT_FRAME_RATE;
use crate::patterns::PatternKind;

/// File name of the shared frame when none is configured.
pub const DEFAULT_SHARED_FILE_NAME: &str = "skyscreen.frame";

/// Where the player sends frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Shared frame file plus the configured sync backend.
    #[default]
    Shared,
    /// UDP stream; no sync backend.
    Udp,
    /// Local buffer, no sync, no renderer.
    Fake,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shared => "shared",
            Self::Udp => "udp",
            Self::Fake => "fake",
        })
    }
}

impl FromStr for OutputMode {
    type Err = SkyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "udp" => Ok(Self::Udp),
            "fake" => Ok(Self::Fake),
            other => Err(SkyError::InvalidConfig(format!("unknown output mode '{other}'"))),
        }
    }
}

/// External renderer started alongside a shared-output player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Program to run.
    pub command: String,
    /// Arguments passed to it.
    pub args: Vec<String>,
}

/// Complete player configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Display shape.
    pub geometry: Geometry,
    /// Signalling backend for shared output.
    pub sync: SyncConfig,
    /// UDP settings for udp output.
    pub stream: StreamConfig,
    /// Output selection.
    pub output: OutputMode,
    /// Pattern to play.
    pub pattern: PatternKind,
    /// Shared frame file. Defaults to a file in the temp directory.
    pub shared_file: Option<PathBuf>,
    /// Frames per second.
    pub frame_rate: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Renderer to supervise (shared output only).
    pub renderer: Option<RendererConfig>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::SKYSCREEN,
            sync: SyncConfig::default(),
            stream: StreamConfig::default(),
            output: OutputMode::Shared,
            pattern: PatternKind::Solid,
            shared_file: None,
            frame_rate: DEFAULT_FRAME_RATE,
            max_frames: None,
            renderer: None,
        }
    }
}

impl PlayerConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// [`SkyError::NotFound`]/[`SkyError::Io`] if the file cannot be read,
    /// [`SkyError::InvalidConfig`] if it does not parse or validate.
    pub fn load(path: impl AsRef<Path>) -> SkyResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SkyError::from_fs(path, e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("loaded player config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidConfig`] on malformed or invalid input.
    pub fn from_toml_str(text: &str) -> SkyResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SkyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that the type system does not.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidConfig`] or [`SkyError::InvalidGeometry`].
    pub fn validate(&self) -> SkyResult<()> {
        self.geometry.validate()?;
        if self.frame_rate == 0 {
            return Err(SkyError::InvalidConfig("frame_rate must be at least 1".to_string()));
        }
        if let Some(renderer) = &self.renderer {
            if renderer.command.is_empty() {
                return Err(SkyError::InvalidConfig("renderer command is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Path of the shared frame file.
    #[must_use]
    pub fn shared_path(&self) -> PathBuf {
        self.shared_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SHARED_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscreen_core::SyncMode;

    #[test]
    fn test_empty_file_is_default() {
        let config = PlayerConfig::from_toml_str("").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.geometry.frame_byte_size(), 360 * 288 * 3);
    }

    #[test]
    fn test_nested_sections() {
        let config = PlayerConfig::from_toml_str(
            r#"
            output = "udp"
            pattern = "lines"
            frame_rate = 60

            [geometry]
            vane_count = 90

            [sync]
            mode = "no_sync"

            [stream]
            target = "10.0.0.2"

            [renderer]
            command = "render"
            args = ["--window"]
            "#,
        )
        .unwrap();

        assert_eq!(config.output, OutputMode::Udp);
        assert_eq!(config.pattern, PatternKind::Lines);
        assert_eq!(config.geometry.vane_count, 90);
        assert_eq!(config.geometry.vane_length, 288);
        assert_eq!(config.sync.mode, SyncMode::NoSync);
        assert_eq!(config.stream.destination().unwrap().port, 5555);
        assert_eq!(config.renderer.unwrap().args, vec!["--window".to_string()]);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(PlayerConfig::from_toml_str("frame_rate = 0").is_err());
        assert!(PlayerConfig::from_toml_str("[geometry]\nvane_count = 0").is_err());
        assert!(PlayerConfig::from_toml_str("output = \"hdmi\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlayerConfig::load(dir.path().join("player.toml")).unwrap_err();
        assert!(matches!(err, SkyError::NotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.toml");
        std::fs::write(&path, "pattern = \"grid\"\nshared_file = \"/tmp/x.frame\"").unwrap();

        let config = PlayerConfig::load(&path).unwrap();
        assert_eq!(config.pattern, PatternKind::Grid);
        assert_eq!(config.shared_path(), PathBuf::from("/tmp/x.frame"));
    }
}
