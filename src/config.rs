//! Configuration types for the chat client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ChatError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SonaConfig {
    /// Chat backend settings.
    pub backend: BackendConfig,
    /// Voice capture/playback settings.
    pub voice: VoiceConfig,
    /// Audio device settings.
    pub audio: AudioConfig,
    /// Session storage settings.
    pub storage: StorageConfig,
}

/// Chat backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// URL of the chat streaming endpoint.
    pub chat_url: String,
    /// URL of the artifact endpoint for tool completions.
    pub artifact_url: String,
    /// Tool names whose completion is posted to the artifact endpoint.
    pub artifact_tools: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            chat_url: "http://localhost:3000/api/chat".into(),
            artifact_url: "http://localhost:3000/api/artifacts".into(),
            artifact_tools: vec!["show_needs_chart".into()],
        }
    }
}

/// Voice service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// URL of the speech-to-text endpoint.
    pub transcription_url: String,
    /// URL of the text-to-speech endpoint.
    pub synthesis_url: String,
    /// Voice identifier passed to synthesis (None = service default).
    pub voice: Option<String>,
    /// Whether completed replies are spoken automatically.
    pub auto_speak: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            transcription_url: "http://localhost:3000/api/transcribe".into(),
            synthesis_url: "http://localhost:3000/api/speech".into(),
            voice: None,
            auto_speak: true,
        }
    }
}

/// Audio I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (recordings are downsampled to this).
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
            output_device: None,
        }
    }
}

/// Session storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for local session files (None = platform data dir).
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: None }
    }
}

impl StorageConfig {
    /// Resolve the session directory, honoring the override.
    pub fn session_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("sona")
            .join("sessions")
    }
}

impl SonaConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Load from the default path, or defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error only when a file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/sona/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp/sona-config"))
            .join("sona")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_sensible() {
        let config = SonaConfig::default();
        assert!(config.backend.chat_url.contains("/api/chat"));
        assert_eq!(config.backend.artifact_tools, vec!["show_needs_chart"]);
        assert_eq!(config.audio.input_sample_rate, 16_000);
        assert!(config.voice.auto_speak);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => unreachable!("tempdir failed: {e}"),
        };
        let path = dir.path().join("config.toml");

        let mut config = SonaConfig::default();
        config.backend.chat_url = "https://example.com/chat".into();
        config.voice.voice = Some("aria".into());
        config.voice.auto_speak = false;

        let saved = config.save_to_file(&path);
        assert!(saved.is_ok());

        let loaded = match SonaConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => unreachable!("load failed: {e}"),
        };
        assert_eq!(loaded.backend.chat_url, "https://example.com/chat");
        assert_eq!(loaded.voice.voice.as_deref(), Some("aria"));
        assert!(!loaded.voice.auto_speak);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let toml_str = r#"
            [voice]
            auto_speak = false
        "#;
        let config: SonaConfig = match toml::from_str(toml_str) {
            Ok(config) => config,
            Err(e) => unreachable!("parse failed: {e}"),
        };
        assert!(!config.voice.auto_speak);
        // Untouched sections keep their defaults
        assert_eq!(config.audio.input_sample_rate, 16_000);
        assert!(config.backend.chat_url.contains("/api/chat"));
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let result = SonaConfig::from_file(std::path::Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn storage_override_wins() {
        let config = StorageConfig {
            data_dir: Some(PathBuf::from("/custom/sessions")),
        };
        assert_eq!(config.session_dir(), PathBuf::from("/custom/sessions"));
    }

    #[test]
    fn default_storage_path_ends_with_sessions() {
        let config = StorageConfig::default();
        assert!(config.session_dir().ends_with("sona/sessions"));
    }
}
