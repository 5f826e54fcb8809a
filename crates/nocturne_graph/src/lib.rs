// SPDX-License-Identifier: MIT OR Apache-2.0
//! Patch graph engine for the Nocturne media-composition editor.
//!
//! A patch is a set of modules with typed ports joined by wires that carry
//! live references to producer-owned resources: frame buffers, light state,
//! slider values and MIDI chain links.
//!
//! ## Architecture
//!
//! - [`Patch`] owns the module mapping, the wire list and the frame loop
//! - [`PatchModule`] is implemented by concrete modules on top of [`ModuleCore`]
//! - [`Canvas`] is the draw hook; [`ui::EguiCanvas`] paints it with egui
//! - [`PatchSnapshot`] is the serializable form used for presets

pub mod browser;
pub mod canvas;
pub mod collection;
pub mod input;
pub mod midi;
pub mod module;
pub mod patch;
pub mod payload;
pub mod port;
pub mod registry;
pub mod snapshot;
pub mod ui;
pub mod wire;

#[cfg(test)]
mod testing;

pub use browser::ModuleBrowser;
pub use canvas::{draw_module_frame, Canvas, DrawCommand, DrawList, Viewport};
pub use collection::{Collection, CollectionItem};
pub use input::{InputEvent, Key, PointerButton};
pub use midi::{ControlChange, MidiEvent, MidiListener, MidiSink, MidiSinkError};
pub use module::{ModuleCore, ModuleId, ModuleKey, Parameter, PatchModule, ResolutionSource};
pub use patch::{Patch, PatchCommand, PatchConfig, PatchError, PROJECT_MODULE};
pub use payload::{
    shared_buffer, BufferRef, FrameBuffer, LightRef, LightState, Payload, Resolution, SharedBuffer,
    SharedLight, SharedSlider, SliderRef,
};
pub use port::{Port, PortDirection, PortKind};
pub use registry::ModuleRegistry;
pub use snapshot::{ModuleRecord, ParameterRecord, PatchSnapshot, WireRecord};
pub use wire::{Endpoint, PortAddress, Wire, WireError, WireId, WireOutcome};

pub use egui::{Pos2, Rect, Vec2};
