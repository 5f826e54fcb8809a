// SPDX-License-Identifier: MIT OR Apache-2.0
//! A headless session: build or restore a patch, run frames, write results.

use crate::midi_io::{MidirSink, MidirSource};
use crate::settings::{SessionSettings, SettingsError};
use nocturne_graph::{
    DrawList, ModuleKey, Patch, PatchConfig, PatchError, PatchSnapshot, PortAddress, Pos2, Vec2,
};
use nocturne_graph::patch::Result as PatchResult;
use nocturne_modules::{default_registry, BlendMode, Light, Mixer, ScreenOutput, Shader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Settings could not be loaded
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Preset file could not be read or written
    #[error("Preset I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Preset file is not a valid snapshot
    #[error("Preset parse error: {0}")]
    PresetParse(#[from] ron::error::SpannedError),

    /// Snapshot could not be encoded
    #[error("Preset encode error: {0}")]
    PresetEncode(#[from] ron::Error),

    /// Building the patch failed
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Frame could not be written
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// No module presents a frame
    #[error("No screen output in the patch")]
    NoPresentedFrame,
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// A running patch plus its hardware connections
pub struct Session {
    settings: SessionSettings,
    patch: Patch,
    midi_in: Option<MidirSource>,
    frames_run: u64,
}

impl Session {
    /// Build the session described by `settings`
    pub fn new(settings: SessionSettings) -> Result<Self> {
        let config = PatchConfig {
            resolution: settings.resolution,
            ..PatchConfig::default()
        };
        let mut patch = match &settings.load_preset {
            Some(path) => {
                let snapshot = load_preset(path)?;
                Patch::restore(default_registry(), config, &snapshot)
            }
            None => demo_patch(config)?,
        };
        patch.set_translation(Vec2::from(settings.translation));
        patch.set_zoom(settings.zoom);

        if let Some(wanted) = &settings.midi_output {
            match MidirSink::connect(wanted) {
                Ok(sink) => {
                    debug!(port = sink.port_name(), "MIDI output attached");
                    patch.set_midi_sink(Box::new(sink));
                }
                Err(err) => warn!(%err, "continuing without MIDI output"),
            }
        }
        let midi_in = settings
            .midi_input
            .as_deref()
            .and_then(|wanted| {
                MidirSource::connect(wanted)
                    .inspect_err(|err| warn!(%err, "continuing without MIDI input"))
                    .ok()
            });

        Ok(Self {
            settings,
            patch,
            midi_in,
            frames_run: 0,
        })
    }

    /// The patch being run
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// Frames run so far
    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Run one frame: deliver pending MIDI, then update
    pub fn step(&mut self) {
        if let Some(source) = &self.midi_in {
            for event in source.drain() {
                self.patch.receive_midi(&event);
            }
        }
        self.patch.update();
        self.frames_run += 1;
    }

    /// Run the configured number of frames and record the final draw
    pub fn run(&mut self) -> DrawList {
        for _ in 0..self.settings.frames {
            self.step();
        }
        let mut list = DrawList::new();
        self.patch.draw(&mut list);
        debug!(
            frames = self.frames_run,
            commands = list.commands().len(),
            "session frames done"
        );
        list
    }

    /// Write the preset and the last frame wherever the settings ask
    pub fn finish(&self) -> Result<()> {
        if let Some(path) = &self.settings.save_preset {
            save_preset(&self.patch.snapshot(), path)?;
        }
        if let Some(path) = &self.settings.frame_path {
            self.write_frame(path)?;
        }
        Ok(())
    }

    /// Save the first presented frame as an image
    pub fn write_frame(&self, path: &Path) -> Result<()> {
        let frame = self
            .patch
            .presented_frames()
            .into_iter()
            .find_map(|(_, frame)| frame.upgrade())
            .ok_or(SessionError::NoPresentedFrame)?;
        frame.borrow().image().save(path)?;
        info!(path = %path.display(), "frame written");
        Ok(())
    }
}

/// Read a snapshot from a RON file
pub fn load_preset(path: &Path) -> Result<PatchSnapshot> {
    let content = std::fs::read_to_string(path)?;
    let snapshot: PatchSnapshot = ron::from_str(&content)?;
    info!(path = %path.display(), modules = snapshot.modules.len(), "preset loaded");
    Ok(snapshot)
}

/// Write a snapshot as a RON file
pub fn save_preset(snapshot: &PatchSnapshot, path: &Path) -> Result<()> {
    let content = ron::ser::to_string_pretty(snapshot, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, content)?;
    info!(path = %path.display(), "preset saved");
    Ok(())
}

/// Two lit shaders added together onto the screen
pub fn demo_patch(config: PatchConfig) -> PatchResult<Patch> {
    let mut patch = Patch::new(default_registry(), config);

    let light = add_at(&mut patch, Light::TYPE_NAME, 40.0, 120.0)?;
    let warm = add_at(&mut patch, Shader::TYPE_NAME, 300.0, 40.0)?;
    let cool = add_at(&mut patch, Shader::TYPE_NAME, 300.0, 260.0)?;
    let mixer = add_at(&mut patch, Mixer::TYPE_NAME, 560.0, 120.0)?;
    let screen = add_at(&mut patch, ScreenOutput::TYPE_NAME, 820.0, 120.0)?;

    for (name, value) in [("green", 0.2), ("blue", 0.4)] {
        patch.set_parameter(&warm, name, value)?;
    }
    for (name, value) in [("red", 0.0), ("green", 0.2)] {
        patch.set_parameter(&cool, name, value)?;
    }
    patch.set_parameter(&mixer, "blend", BlendMode::Add.as_parameter())?;

    for (from, output, to, input) in [
        (&light, "out", &warm, "light"),
        (&warm, "out", &mixer, "fbo1"),
        (&cool, "out", &mixer, "fbo2"),
        (&mixer, "out", &screen, "in"),
    ] {
        patch.connect(&PortAddress::new(from, output), &PortAddress::new(to, input))?;
    }
    Ok(patch)
}

fn add_at(patch: &mut Patch, type_name: &str, x: f32, y: f32) -> PatchResult<ModuleKey> {
    let key = patch.add_module(type_name)?;
    if let Some(module) = patch.module_mut(&key) {
        module.core_mut().set_position(Pos2::new(x, y));
    }
    Ok(key)
}
