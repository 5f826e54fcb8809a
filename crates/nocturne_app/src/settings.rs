// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session settings stored as RON.

use nocturne_graph::Resolution;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file read when none is given on the command line
pub const DEFAULT_SETTINGS_FILE: &str = "nocturne.ron";

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON for these settings
    #[error("Settings parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be encoded
    #[error("Settings encode error: {0}")]
    Encode(#[from] ron::Error),

    /// Written by a newer build
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },
}

/// Everything a headless session needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Settings format version
    pub version: u32,
    /// Target resolution for new patches
    pub resolution: Resolution,
    /// Number of frames to run
    pub frames: u32,
    /// Substring of the MIDI output port to open
    pub midi_output: Option<String>,
    /// Substring of the MIDI input port to open
    pub midi_input: Option<String>,
    /// Preset to restore instead of the demo patch
    pub load_preset: Option<PathBuf>,
    /// Where to write the preset when the session ends
    pub save_preset: Option<PathBuf>,
    /// Where to write the last presented frame as PNG
    pub frame_path: Option<PathBuf>,
    /// Initial canvas pan
    pub translation: [f32; 2],
    /// Initial canvas zoom
    pub zoom: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            resolution: Resolution::new(640, 360),
            frames: 60,
            midi_output: None,
            midi_input: None,
            load_preset: None,
            save_preset: Some(PathBuf::from("preset.ron")),
            frame_path: Some(PathBuf::from("frame.png")),
            translation: [0.0, 0.0],
            zoom: 1.0,
        }
    }
}

impl SessionSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: SessionSettings = ron::from_str(&content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no settings file; using defaults");
            Ok(Self::default())
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
