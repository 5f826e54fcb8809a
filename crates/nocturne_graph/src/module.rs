// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module definitions for the patch graph.
//!
//! A module is split in two: [`ModuleCore`] carries the state every module
//! shares (identity, ports, parameters, layout, outbox) and is driven by the
//! [`crate::Patch`]; the [`PatchModule`] trait is what each concrete module
//! implements on top of it.

use crate::canvas::{draw_module_frame, Canvas, Viewport};
use crate::collection::Collection;
use crate::midi::{ControlChange, MidiListener};
use crate::payload::{BufferRef, Payload, Resolution, SharedBuffer, SharedLight};
use crate::port::{Port, PortKind};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Module visual dimensions
pub const MODULE_WIDTH: f32 = 200.0;
/// Height of the title bar
pub const MODULE_HEADER_HEIGHT: f32 = 24.0;
/// Height of one port row
pub const PORT_ROW_HEIGHT: f32 = 22.0;
const MODULE_PADDING: f32 = 8.0;

/// Monotonic module identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite mapping key `"{type name}@{id}"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleKey(String);

impl ModuleKey {
    /// Build a key from a type name and id
    pub fn new(type_name: &str, id: ModuleId) -> Self {
        Self(format!("{type_name}@{id}"))
    }

    /// Key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Type name part of the key
    pub fn type_name(&self) -> &str {
        self.0.rsplit_once('@').map_or(self.0.as_str(), |(name, _)| name)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// A numeric module parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Current value
    pub value: f32,
    /// Lower bound
    pub min: f32,
    /// Upper bound
    pub max: f32,
}

impl Parameter {
    /// Create a parameter, clamping the value into range
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    /// Map a normalised `0.0..=1.0` value into the parameter range
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.min + normalized.clamp(0.0, 1.0) * (self.max - self.min)
    }

    /// Current value normalised to `0.0..=1.0`
    pub fn normalized(&self) -> f32 {
        if self.max > self.min {
            (self.value - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }
}

/// State shared by every module
#[derive(Debug, Clone)]
pub struct ModuleCore {
    type_name: String,
    id: ModuleId,
    key: ModuleKey,
    enabled: bool,
    is_child: bool,
    position: Pos2,
    resolution: Resolution,
    viewport: Viewport,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    parameters: IndexMap<String, Parameter>,
    chain: Option<ModuleKey>,
    outbox: Vec<ControlChange>,
    midi_map_mode: bool,
}

impl ModuleCore {
    /// Create the core for a module of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let id = ModuleId(0);
        Self {
            key: ModuleKey::new(&type_name, id),
            type_name,
            id,
            enabled: true,
            is_child: false,
            position: Pos2::ZERO,
            resolution: Resolution::default(),
            viewport: Viewport::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: IndexMap::new(),
            chain: None,
            outbox: Vec::new(),
            midi_map_mode: false,
        }
    }

    pub(crate) fn assign_id(&mut self, id: ModuleId) {
        self.id = id;
        self.key = ModuleKey::new(&self.type_name, id);
    }

    /// Registered type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Unique id
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Mapping key
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    /// Title shown in the header
    pub fn title(&self) -> &str {
        self.key.as_str()
    }

    /// Whether the module takes part in update, draw and hit testing
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the module
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the module belongs to a collection
    pub fn is_child(&self) -> bool {
        self.is_child
    }

    pub(crate) fn set_child(&mut self, is_child: bool) {
        self.is_child = is_child;
    }

    /// Top-left corner in canvas space
    pub fn position(&self) -> Pos2 {
        self.position
    }

    /// Move the module and its ports
    pub fn set_position(&mut self, position: Pos2) {
        self.position = position;
        self.layout();
    }

    /// Body rectangle in canvas space
    pub fn rect(&self) -> Rect {
        let rows = self.inputs.len().max(self.outputs.len()) as f32;
        let height = MODULE_HEADER_HEIGHT + rows * PORT_ROW_HEIGHT + MODULE_PADDING;
        Rect::from_min_size(self.position, Vec2::new(MODULE_WIDTH, height))
    }

    /// Target resolution for buffers this module allocates
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub(crate) fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    /// Canvas transform seen during the last update
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Store the canvas transform and recompute hit regions
    pub(crate) fn update_view(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.layout();
    }

    /// Recompute port hit regions from the current position
    pub(crate) fn layout(&mut self) {
        let rect = self.rect();
        for (row, port) in self.inputs.iter_mut().enumerate() {
            port.place(Pos2::new(rect.left(), row_center(rect, row)));
        }
        for (row, port) in self.outputs.iter_mut().enumerate() {
            port.place(Pos2::new(rect.right(), row_center(rect, row)));
        }
    }

    /// Declare an input port; re-declaring keeps the existing port
    pub fn declare_input(&mut self, name: &str, kind: PortKind) -> usize {
        declare(&mut self.inputs, Port::input(name, kind))
    }

    /// Declare a bank of `count` indexed multi-buffer inputs
    pub fn declare_input_bank(&mut self, name: &str, count: usize) -> Vec<usize> {
        (0..count)
            .map(|index| {
                declare(
                    &mut self.inputs,
                    Port::input(name, PortKind::MultiBuffer).with_index(index),
                )
            })
            .collect()
    }

    /// Declare an output port; re-declaring keeps the existing port
    pub fn declare_output(&mut self, name: &str, kind: PortKind) -> usize {
        declare(&mut self.outputs, Port::output(name, kind))
    }

    /// Declare a parameter together with the slider input that drives it.
    /// An existing parameter keeps its current value.
    pub fn declare_parameter(&mut self, name: &str, value: f32, min: f32, max: f32) {
        self.parameters
            .entry(name.to_string())
            .or_insert_with(|| Parameter::new(value, min, max));
        self.declare_input(name, PortKind::Slider);
    }

    /// Input ports
    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    /// Output ports
    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    pub(crate) fn input_mut(&mut self, index: usize) -> Option<&mut Port> {
        self.inputs.get_mut(index)
    }

    pub(crate) fn output_mut(&mut self, index: usize) -> Option<&mut Port> {
        self.outputs.get_mut(index)
    }

    /// Find an input by name and bank index
    pub fn input_index(&self, name: &str, index: usize) -> Option<usize> {
        self.inputs
            .iter()
            .position(|p| p.name == name && p.index == index)
    }

    /// Find an output by name
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Input whose hit region contains `pos`
    pub fn input_at(&self, pos: Pos2) -> Option<usize> {
        self.inputs.iter().position(|p| p.contains(pos))
    }

    /// Output whose hit region contains `pos`
    pub fn output_at(&self, pos: Pos2) -> Option<usize> {
        self.outputs.iter().position(|p| p.contains(pos))
    }

    /// Payload bound to a named input
    pub fn input_payload(&self, name: &str) -> Option<&Payload> {
        self.inputs.iter().find(|p| p.name == name).map(Port::payload)
    }

    /// Frame bound to a named input, if its producer is alive
    pub fn input_buffer(&self, name: &str) -> Option<SharedBuffer> {
        self.input_payload(name).and_then(Payload::buffer)
    }

    /// Light bound to a named input, if its producer is alive
    pub fn input_light(&self, name: &str) -> Option<SharedLight> {
        self.input_payload(name).and_then(Payload::light)
    }

    /// Frames bound to a bank, in index order; empty slots are skipped
    pub fn bank_buffers(&self, name: &str) -> Vec<SharedBuffer> {
        let mut slots: Vec<&Port> = self
            .inputs
            .iter()
            .filter(|p| p.name == name && p.kind == PortKind::MultiBuffer)
            .collect();
        slots.sort_by_key(|p| p.index);
        slots.iter().filter_map(|p| p.payload().buffer()).collect()
    }

    /// Current value of a parameter
    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.get(name).map(|p| p.value)
    }

    /// Full parameter record
    pub fn parameter_info(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Set a parameter, clamped into its range. Returns false if unknown.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> bool {
        match self.parameters.get_mut(name) {
            Some(parameter) => {
                parameter.value = value.clamp(parameter.min, parameter.max);
                true
            }
            None => false,
        }
    }

    /// All parameters in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(name, p)| (name.as_str(), p))
    }

    /// Copy bound slider values into their parameters
    pub(crate) fn pull_sliders(&mut self) {
        for port in self.inputs.iter().filter(|p| p.kind == PortKind::Slider) {
            let Some(normalized) = port.payload().slider() else {
                continue;
            };
            if let Some(parameter) = self.parameters.get_mut(&port.name) {
                parameter.value = parameter.denormalize(normalized);
            }
        }
    }

    /// Module this one cascades control into
    pub fn chain(&self) -> Option<&ModuleKey> {
        self.chain.as_ref()
    }

    pub(crate) fn set_chain(&mut self, chain: Option<ModuleKey>) {
        self.chain = chain;
    }

    /// Queue an outbound control change for this frame
    pub fn send_midi(&mut self, message: ControlChange) {
        self.outbox.push(message);
    }

    /// Messages queued and not yet drained
    pub fn pending_midi(&self) -> &[ControlChange] {
        &self.outbox
    }

    pub(crate) fn drain_outbox(&mut self) -> Vec<ControlChange> {
        std::mem::take(&mut self.outbox)
    }

    /// Whether MIDI mapping mode is active
    pub fn midi_map_mode(&self) -> bool {
        self.midi_map_mode
    }

    /// Set mapping mode; the patch keeps every module in step with its own flag
    pub fn set_midi_map_mode(&mut self, enabled: bool) {
        self.midi_map_mode = enabled;
    }
}

fn row_center(rect: Rect, row: usize) -> f32 {
    rect.top() + MODULE_HEADER_HEIGHT + row as f32 * PORT_ROW_HEIGHT + PORT_ROW_HEIGHT / 2.0
}

fn declare(ports: &mut Vec<Port>, port: Port) -> usize {
    if let Some(existing) = ports
        .iter()
        .position(|p| p.name == port.name && p.index == port.index)
    {
        if ports[existing].kind != port.kind {
            tracing::warn!(
                port = %port.name,
                "port re-declared with a different kind; keeping {:?}",
                ports[existing].kind
            );
        }
        return existing;
    }
    ports.push(port);
    ports.len() - 1
}

/// Role implemented by modules that publish a new global resolution
pub trait ResolutionSource {
    /// Take a pending resolution change, if any
    fn take_resolution_change(&mut self) -> Option<Resolution>;
}

/// A processing node with typed ports and per-frame behaviour
pub trait PatchModule {
    /// Shared state
    fn core(&self) -> &ModuleCore;

    /// Mutable shared state
    fn core_mut(&mut self) -> &mut ModuleCore;

    /// (Re)initialise internal state and declare ports.
    ///
    /// Called on insertion and again on every resolution change; ports
    /// declared by an earlier call keep their identity and payload.
    fn setup(&mut self);

    /// Advance internal state and publish results on the outputs
    fn update(&mut self) {}

    /// Render the module body using only current payloads
    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
    }

    /// Payload currently published on an output port
    fn output_payload(&self, _port: usize) -> Payload {
        Payload::Empty
    }

    /// Called after an input port gained or lost its payload
    fn input_changed(&mut self, _port: usize) {}

    /// Frame to present on a screen, for output modules
    fn presented(&self) -> Option<BufferRef> {
        None
    }

    /// Release resources before the module is dropped
    fn unmount(&mut self) {}

    /// Resolution-change role
    fn as_resolution_source(&mut self) -> Option<&mut dyn ResolutionSource> {
        None
    }

    /// Inbound MIDI role
    fn as_midi_listener(&mut self) -> Option<&mut dyn MidiListener> {
        None
    }

    /// Collection-owner role
    fn as_collection(&self) -> Option<&Collection> {
        None
    }

    /// Mutable collection-owner role
    fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        None
    }
}
