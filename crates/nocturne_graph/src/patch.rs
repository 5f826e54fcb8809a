// SPDX-License-Identifier: MIT OR Apache-2.0
//! The patch: module mapping, wire list and the per-frame driver.
//!
//! Modules live in an order-preserving map keyed by `"{type}@{id}"`, so hit
//! testing and update/draw order follow insertion order. Wires reference
//! modules by key; every path that removes a module first removes the wires
//! touching it and clears the payload slots they fed.

use crate::browser::ModuleBrowser;
use crate::canvas::{Canvas, Viewport};
use crate::collection::Collection;
use crate::input::{Gesture, InputEvent, InputState};
use crate::midi::{MidiEvent, MidiSink};
use crate::module::{ModuleId, ModuleKey, PatchModule, ResolutionSource};
use crate::payload::{BufferRef, Payload, Resolution};
use crate::port::{PortDirection, PortKind};
use crate::registry::ModuleRegistry;
use crate::wire::{Endpoint, PendingWire, PortAddress, Wire, WireError, WireId, WireOutcome};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, info, trace, warn};

/// Type name of the project/config module added to every new patch
pub const PROJECT_MODULE: &str = "PROJECT";

/// Patch errors
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// No constructor registered under that name
    #[error("Module type not found: {0}")]
    ModuleTypeNotFound(String),

    /// No module under that key
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleKey),

    /// Module does not own a collection
    #[error("Module is not a collection: {0}")]
    NotACollection(ModuleKey),

    /// Collection index out of range or its child was deleted
    #[error("Collection item out of range: {0}")]
    ItemOutOfRange(usize),

    /// Module has no such parameter
    #[error("Parameter not found: {module}.{name}")]
    ParameterNotFound {
        /// Module searched
        module: ModuleKey,
        /// Parameter name
        name: String,
    },

    /// Wire could not be committed
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Result type for patch operations
pub type Result<T> = std::result::Result<T, PatchError>;

/// Patch settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchConfig {
    /// Initial target resolution
    pub resolution: Resolution,
    /// Smallest allowed zoom
    pub min_zoom: f32,
    /// Zoom change per scroll unit
    pub zoom_step: f32,
    /// Offset from the pointer to a new module's corner, screen space
    pub spawn_offset: Vec2,
    /// Gap between a collection owner and its children
    pub child_gap: f32,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            min_zoom: 0.15,
            zoom_step: 0.05,
            spawn_offset: Vec2::new(100.0, 15.0),
            child_gap: 8.0,
        }
    }
}

/// Requests the patch hands back to its host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchCommand {
    /// Persist the current patch
    SavePreset,
}

/// Pointer interaction state
#[derive(Debug, Clone, Default)]
pub(crate) enum DragState {
    /// Nothing held
    #[default]
    Idle,
    /// Dragging a wire from an output
    Wire(PendingWire),
    /// Moving a module
    Module {
        /// Module being moved
        key: ModuleKey,
        /// Pointer offset from the module corner
        grab: Vec2,
    },
}

/// The graph manager
pub struct Patch {
    pub(crate) config: PatchConfig,
    pub(crate) registry: ModuleRegistry,
    pub(crate) resolution: Resolution,
    pub(crate) modules: IndexMap<ModuleKey, Box<dyn PatchModule>>,
    pub(crate) wires: Vec<Wire>,
    pub(crate) next_id: u64,
    pub(crate) viewport: Viewport,
    drag: DragState,
    focused: Option<ModuleKey>,
    resolution_sources: Vec<ModuleKey>,
    midi_map_mode: bool,
    midi_sink: Option<Box<dyn MidiSink>>,
    browser: ModuleBrowser,
    input: InputState,
}

impl Patch {
    /// Create a patch; adds the project module when the registry has one
    pub fn new(registry: ModuleRegistry, config: PatchConfig) -> Self {
        let mut patch = Self::empty(registry, config);
        if patch.registry.contains(PROJECT_MODULE) {
            if let Err(err) = patch.add_module(PROJECT_MODULE) {
                warn!(%err, "failed to add project module");
            }
        }
        patch
    }

    /// Create a patch without any module
    pub(crate) fn empty(registry: ModuleRegistry, config: PatchConfig) -> Self {
        let browser = ModuleBrowser::new(registry.names());
        Self {
            resolution: config.resolution,
            config,
            registry,
            modules: IndexMap::new(),
            wires: Vec::new(),
            next_id: 1,
            viewport: Viewport::default(),
            drag: DragState::Idle,
            focused: None,
            resolution_sources: Vec::new(),
            midi_map_mode: false,
            midi_sink: None,
            browser,
            input: InputState::new(),
        }
    }

    /// Allocate the next free id
    pub(crate) fn next_module_id(&mut self) -> ModuleId {
        loop {
            let id = ModuleId(self.next_id);
            self.next_id += 1;
            if !self.id_in_use(id) {
                return id;
            }
        }
    }

    pub(crate) fn id_in_use(&self, id: ModuleId) -> bool {
        self.modules.values().any(|module| module.core().id() == id)
    }

    // ------------------------------------------------------------------
    // Module lifecycle
    // ------------------------------------------------------------------

    /// Instantiate a registered module type near the last pointer position
    pub fn add_module(&mut self, type_name: &str) -> Result<ModuleKey> {
        let module = self
            .registry
            .create(type_name)
            .inspect_err(|err| warn!(%err, "cannot add module"))?;
        let id = self.next_module_id();
        let position =
            self.viewport.to_canvas(self.input.pointer()) - self.config.spawn_offset / self.viewport.zoom;
        Ok(self.insert_module(module, id, position, false))
    }

    /// Insert a constructed module, then any children it owns
    pub(crate) fn insert_module(
        &mut self,
        mut module: Box<dyn PatchModule>,
        id: ModuleId,
        position: Pos2,
        is_child: bool,
    ) -> ModuleKey {
        let core = module.core_mut();
        core.assign_id(id);
        core.set_child(is_child);
        core.set_resolution(self.resolution);
        core.set_midi_map_mode(self.midi_map_mode);
        module.setup();
        module.core_mut().set_position(position);

        let key = module.core().key().clone();
        if module.as_resolution_source().is_some() {
            self.resolution_sources.push(key.clone());
        }
        let children = module
            .as_collection_mut()
            .map(Collection::take_pending)
            .unwrap_or_default();
        self.modules.insert(key.clone(), module);
        debug!(module = %key, "module added");

        let anchor = self.child_anchor(&key);
        let has_children = !children.is_empty();
        for (index, mut child) in children.into_iter().enumerate() {
            if index > 0 {
                child.core_mut().set_enabled(false);
            }
            let child_id = self.next_module_id();
            let child_key = self.insert_module(child, child_id, anchor, true);
            if let Some(collection) = self.collection_mut(&key) {
                collection.bind_child(index, child_key);
            }
        }
        if has_children {
            if let Some(collection) = self.collection_mut(&key) {
                collection.set_active(Some(0));
            }
        }
        key
    }

    /// Delete a module after removing every wire that touches it.
    /// Children of a collection owner are deleted first.
    /// Returns the number of wires removed.
    pub fn delete_module(&mut self, key: &ModuleKey) -> Result<usize> {
        let children: Vec<ModuleKey> = match self.modules.get(key) {
            Some(module) => module
                .as_collection()
                .map(|c| c.child_keys().cloned().collect())
                .unwrap_or_default(),
            None => return Err(PatchError::ModuleNotFound(key.clone())),
        };

        let mut removed = 0;
        for child in &children {
            if self.modules.contains_key(child) {
                removed += self.delete_module(child)?;
            }
        }

        removed += self.remove_wires_of(key);
        if let Some(mut module) = self.modules.shift_remove(key) {
            module.unmount();
        }
        for module in self.modules.values_mut() {
            if let Some(collection) = module.as_collection_mut() {
                collection.release_child(key);
            }
        }

        self.resolution_sources.retain(|k| k != key);
        if self.focused.as_ref() == Some(key) {
            self.focused = None;
        }
        let drag_dangles = match &self.drag {
            DragState::Wire(pending) => pending.output.module == *key,
            DragState::Module { key: held, .. } => held == key,
            DragState::Idle => false,
        };
        if drag_dangles {
            self.drag = DragState::Idle;
        }

        debug!(module = %key, wires = removed, "module deleted");
        Ok(removed)
    }

    /// Delete the focused module, if any. Returns the number of wires removed.
    pub fn delete_focused_module(&mut self) -> Option<usize> {
        let key = self.focused.clone()?;
        self.delete_module(&key).ok()
    }

    /// Unmount and drop every module and wire
    pub fn delete_all_modules(&mut self) {
        for module in self.modules.values_mut() {
            module.unmount();
        }
        self.modules.clear();
        self.wires.clear();
        self.resolution_sources.clear();
        self.focused = None;
        self.drag = DragState::Idle;
        info!("all modules deleted");
    }

    fn remove_wires_of(&mut self, key: &ModuleKey) -> usize {
        let (doomed, kept): (Vec<Wire>, Vec<Wire>) = std::mem::take(&mut self.wires)
            .into_iter()
            .partition(|wire| wire.involves_module(key));
        self.wires = kept;
        for wire in &doomed {
            self.release_wire(wire);
        }
        doomed.len()
    }

    /// Clear the input slot a wire fed, and the chain reference it set
    fn release_wire(&mut self, wire: &Wire) {
        if let Some(module) = self.modules.get_mut(&wire.input.module) {
            if let Some(port) = module.core_mut().input_mut(wire.input.port) {
                port.clear_payload();
            }
            module.input_changed(wire.input.port);
        }
        if wire.kind == PortKind::Chain {
            if let Some(module) = self.modules.get_mut(&wire.output.module) {
                if module.core().chain() == Some(&wire.input.module) {
                    module.core_mut().set_chain(None);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    pub(crate) fn collection_mut(&mut self, key: &ModuleKey) -> Option<&mut Collection> {
        self.modules
            .get_mut(key)
            .and_then(|module| module.as_collection_mut())
    }

    fn child_anchor(&self, owner: &ModuleKey) -> Pos2 {
        self.modules
            .get(owner)
            .map_or(Pos2::ZERO, |module| below(module.core().rect(), self.config.child_gap))
    }

    /// Enable exactly one child of a collection and disable the rest
    pub fn activate_child(&mut self, owner: &ModuleKey, index: usize) -> Result<()> {
        let keys: Vec<Option<ModuleKey>> = {
            let module = self
                .modules
                .get(owner)
                .ok_or_else(|| PatchError::ModuleNotFound(owner.clone()))?;
            let collection = module
                .as_collection()
                .ok_or_else(|| PatchError::NotACollection(owner.clone()))?;
            if !collection.items().get(index).is_some_and(|item| item.key.is_some()) {
                return Err(PatchError::ItemOutOfRange(index));
            }
            collection.items().iter().map(|item| item.key.clone()).collect()
        };

        for (i, key) in keys.iter().enumerate() {
            if let Some(child) = key.as_ref().and_then(|k| self.modules.get_mut(k)) {
                child.core_mut().set_enabled(i == index);
            }
        }
        if let Some(collection) = self.collection_mut(owner) {
            collection.set_active(Some(index));
        }
        debug!(collection = %owner, index, "collection item activated");
        Ok(())
    }

    fn layout_collections(&mut self) {
        let mut placements = Vec::new();
        for module in self.modules.values() {
            if let Some(collection) = module.as_collection() {
                let anchor = below(module.core().rect(), self.config.child_gap);
                placements.extend(collection.child_keys().map(|key| (key.clone(), anchor)));
            }
        }
        for (key, anchor) in placements {
            if let Some(child) = self.modules.get_mut(&key) {
                child.core_mut().set_position(anchor);
            }
        }
    }

    // ------------------------------------------------------------------
    // Hit testing
    // ------------------------------------------------------------------

    fn enabled_modules(&self) -> impl Iterator<Item = (&ModuleKey, &Box<dyn PatchModule>)> {
        self.modules.iter().filter(|(_, module)| module.core().enabled())
    }

    /// First output, in mapping order, whose hit region contains `pos`
    pub fn output_port_at(&self, pos: Pos2) -> Option<Endpoint> {
        self.enabled_modules().find_map(|(key, module)| {
            module
                .core()
                .output_at(pos)
                .map(|port| Endpoint::new(key.clone(), port))
        })
    }

    /// First input, in mapping order, whose hit region contains `pos`
    pub fn input_port_at(&self, pos: Pos2) -> Option<Endpoint> {
        self.enabled_modules().find_map(|(key, module)| {
            module
                .core()
                .input_at(pos)
                .map(|port| Endpoint::new(key.clone(), port))
        })
    }

    /// First module whose body contains `pos`
    pub fn module_at(&self, pos: Pos2) -> Option<ModuleKey> {
        self.enabled_modules()
            .find(|(_, module)| module.core().rect().contains(pos))
            .map(|(key, _)| key.clone())
    }

    /// Centre of a port dot
    pub fn port_center(&self, endpoint: &Endpoint, direction: PortDirection) -> Option<Pos2> {
        let core = self.modules.get(&endpoint.module)?.core();
        let port = match direction {
            PortDirection::Input => core.input(endpoint.port),
            PortDirection::Output => core.output(endpoint.port),
        }?;
        Some(port.center())
    }

    /// Stable name-based address of a port
    pub fn port_address(&self, endpoint: &Endpoint, direction: PortDirection) -> Option<PortAddress> {
        let core = self.modules.get(&endpoint.module)?.core();
        let port = match direction {
            PortDirection::Input => core.input(endpoint.port),
            PortDirection::Output => core.output(endpoint.port),
        }?;
        Some(PortAddress::new(&endpoint.module, port.name.clone()).at(port.index))
    }

    fn resolve(
        &self,
        address: &PortAddress,
        direction: PortDirection,
    ) -> std::result::Result<Endpoint, WireError> {
        let module = self
            .modules
            .get(&address.module)
            .ok_or_else(|| WireError::EndpointMissing(address.module.clone()))?;
        let port = match direction {
            PortDirection::Input => module.core().input_index(&address.name, address.index),
            PortDirection::Output => module.core().output_index(&address.name),
        };
        port.map(|port| Endpoint::new(address.module.clone(), port))
            .ok_or_else(|| WireError::PortNotFound {
                module: address.module.clone(),
                name: address.name.clone(),
            })
    }

    // ------------------------------------------------------------------
    // Wires
    // ------------------------------------------------------------------

    /// Press at a canvas position: start a wire from an output, or detach
    /// the wire ending at a connected input. Returns true if a drag began.
    pub fn begin_wire_at(&mut self, pos: Pos2) -> bool {
        let mut start = None;
        let mut detach = None;
        for (key, module) in self.enabled_modules() {
            let core = module.core();
            if let Some(port) = core.output_at(pos) {
                start = Some(Endpoint::new(key.clone(), port));
                break;
            }
            if let Some(port) = core.input_at(pos) {
                let input = Endpoint::new(key.clone(), port);
                if self.wires.iter().any(|wire| wire.terminates_at(&input)) {
                    detach = Some(input);
                    break;
                }
            }
        }

        if let Some(output) = start {
            let Some(pending) = self.pending_from(output, pos) else {
                return false;
            };
            debug!(from = %pending.output.module, kind = ?pending.kind, "wire drag started");
            self.drag = DragState::Wire(pending);
            return true;
        }
        match detach {
            Some(input) => self.detach_input(&input, pos),
            None => false,
        }
    }

    /// Build a pending wire carrying the output's current payload
    fn pending_from(&mut self, output: Endpoint, pointer: Pos2) -> Option<PendingWire> {
        let module = self.modules.get_mut(&output.module)?;
        let payload = module.output_payload(output.port);
        let port = module.core_mut().output_mut(output.port)?;
        port.set_payload(payload.clone());
        Some(PendingWire::new(port.kind, output, payload, pointer))
    }

    /// Remove the wire ending at `input` and pick it back up from its output
    fn detach_input(&mut self, input: &Endpoint, pointer: Pos2) -> bool {
        let Some(index) = self.wires.iter().position(|wire| wire.terminates_at(input)) else {
            return false;
        };
        let wire = self.wires.remove(index);
        self.release_wire(&wire);
        debug!(wire = ?wire.id, input = %input.module, "wire detached");

        match self.pending_from(wire.output, pointer) {
            Some(pending) => {
                self.drag = DragState::Wire(pending);
                true
            }
            None => false,
        }
    }

    /// Move the loose end of the dragged wire
    pub fn move_wire_to(&mut self, pos: Pos2) {
        if let DragState::Wire(pending) = &mut self.drag {
            pending.pointer = pos;
        }
    }

    /// Release at a canvas position: commit onto a compatible input or
    /// discard the pending wire. Ends a module move as well.
    pub fn end_wire_at(&mut self, pos: Pos2) -> WireOutcome {
        let pending = match std::mem::take(&mut self.drag) {
            DragState::Wire(pending) => pending,
            DragState::Module { .. } | DragState::Idle => return WireOutcome::Idle,
        };
        let Some(input) = self.input_port_at(pos) else {
            debug!("wire dropped on empty canvas");
            return WireOutcome::Cancelled(WireError::NoTarget);
        };
        match self.commit(pending, input) {
            Ok(id) => WireOutcome::Committed(id),
            Err(err) => {
                debug!(%err, "wire cancelled");
                WireOutcome::Cancelled(err)
            }
        }
    }

    /// Validate a pending wire against an input, then bind it.
    /// Nothing is mutated unless every check passes.
    fn commit(&mut self, pending: PendingWire, input: Endpoint) -> std::result::Result<WireId, WireError> {
        if !self.modules.contains_key(&pending.output.module) {
            return Err(WireError::EndpointMissing(pending.output.module.clone()));
        }
        let input_kind = self
            .modules
            .get(&input.module)
            .ok_or_else(|| WireError::EndpointMissing(input.module.clone()))?
            .core()
            .input(input.port)
            .map(|port| port.kind)
            .ok_or_else(|| WireError::PortNotFound {
                module: input.module.clone(),
                name: format!("#{}", input.port),
            })?;

        if !input_kind.accepts(pending.kind) {
            return Err(WireError::TypeMismatch {
                output: pending.kind,
                input: input_kind,
            });
        }
        if pending.output.module == input.module && pending.kind != PortKind::Chain {
            return Err(WireError::SelfLoop);
        }
        if self.wires.iter().any(|wire| wire.terminates_at(&input)) {
            return Err(WireError::InputOccupied);
        }

        let payload = if pending.kind == PortKind::Chain {
            if let Some(output) = self.modules.get_mut(&pending.output.module) {
                output.core_mut().set_chain(Some(input.module.clone()));
            }
            Payload::Chain
        } else {
            pending.payload().clone()
        };
        if let Some(module) = self.modules.get_mut(&input.module) {
            if let Some(port) = module.core_mut().input_mut(input.port) {
                port.set_payload(payload);
            }
            module.input_changed(input.port);
        }

        let wire = pending.into_wire(input);
        let id = wire.id;
        debug!(
            from = %wire.output.module,
            to = %wire.input.module,
            kind = ?wire.kind,
            "wire committed"
        );
        self.wires.push(wire);
        Ok(id)
    }

    /// Connect two ports by name, with the same rules as the gesture
    pub fn connect(&mut self, output: &PortAddress, input: &PortAddress) -> Result<WireId> {
        let from = self.resolve(output, PortDirection::Output)?;
        let to = self.resolve(input, PortDirection::Input)?;
        let pointer = self
            .port_center(&to, PortDirection::Input)
            .unwrap_or(Pos2::ZERO);
        let pending = self
            .pending_from(from, pointer)
            .ok_or_else(|| WireError::EndpointMissing(output.module.clone()))?;
        Ok(self.commit(pending, to)?)
    }

    /// Remove one wire and clear the slot it fed
    pub fn disconnect(&mut self, id: WireId) -> Option<Wire> {
        let index = self.wires.iter().position(|wire| wire.id == id)?;
        let wire = self.wires.remove(index);
        self.release_wire(&wire);
        Some(wire)
    }

    /// Committed wires in creation order
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Get the number of wires
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// Wire being dragged, if any
    pub fn pending_wire(&self) -> Option<&PendingWire> {
        match &self.drag {
            DragState::Wire(pending) => Some(pending),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// Update every enabled module in mapping order, drain their outboxes
    /// and apply any resolution change they requested
    pub fn update(&mut self) {
        self.layout_collections();
        let viewport = self.viewport;
        let mut requested = None;

        for (key, module) in self.modules.iter_mut() {
            if !module.core().enabled() {
                continue;
            }
            let core = module.core_mut();
            core.update_view(viewport);
            core.pull_sliders();
            module.update();

            for message in module.core_mut().drain_outbox() {
                match self.midi_sink.as_mut() {
                    Some(sink) => match sink.send_control_change(message) {
                        Ok(()) => trace!(module = %key, ?message, "MIDI sent"),
                        Err(err) => warn!(module = %key, %err, "failed to send MIDI"),
                    },
                    None => trace!(module = %key, ?message, "no MIDI sink; message dropped"),
                }
            }

            if self.resolution_sources.contains(key) {
                if let Some(resolution) = module
                    .as_resolution_source()
                    .and_then(ResolutionSource::take_resolution_change)
                {
                    requested = Some(resolution);
                }
            }
        }

        if let Some(resolution) = requested {
            self.set_resolution(resolution);
        }
        if self.browser.is_visible() {
            self.browser.update();
        }
    }

    /// Draw wires, then top-level modules with their active children
    pub fn draw(&self, canvas: &mut dyn Canvas) {
        canvas.begin_view(self.viewport);

        if let DragState::Wire(pending) = &self.drag {
            if let Some(from) = self.port_center(&pending.output, PortDirection::Output) {
                canvas.wire(from, pending.pointer, pending.kind);
            }
        }

        for wire in &self.wires {
            if !(self.is_enabled(&wire.output.module) && self.is_enabled(&wire.input.module)) {
                continue;
            }
            let from = self.port_center(&wire.output, PortDirection::Output);
            let to = self.port_center(&wire.input, PortDirection::Input);
            if let (Some(from), Some(to)) = (from, to) {
                canvas.wire(from, to, wire.kind);
            }
        }

        for (key, module) in &self.modules {
            let core = module.core();
            if core.is_child() || !core.enabled() {
                continue;
            }
            module.draw(canvas);
            if self.focused.as_ref() == Some(key) {
                canvas.focus(core.rect());
            }
            if let Some(collection) = module.as_collection() {
                for child in collection.child_keys().filter_map(|k| self.modules.get(k)) {
                    if child.core().enabled() {
                        child.draw(canvas);
                    }
                }
            }
        }

        canvas.end_view();

        if self.browser.is_visible() {
            canvas.browser(self.browser.entries());
        }
    }

    /// Store a new resolution and re-run `setup()` on every module
    pub fn set_resolution(&mut self, resolution: Resolution) {
        info!(%resolution, "resolution changed");
        self.resolution = resolution;
        for module in self.modules.values_mut() {
            module.core_mut().set_resolution(resolution);
            module.setup();
            module.core_mut().layout();
        }
    }

    /// Current target resolution
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Frames exposed by output modules
    pub fn presented_frames(&self) -> Vec<(ModuleKey, BufferRef)> {
        self.enabled_modules()
            .filter_map(|(key, module)| module.presented().map(|frame| (key.clone(), frame)))
            .collect()
    }

    // ------------------------------------------------------------------
    // MIDI
    // ------------------------------------------------------------------

    /// Attach the outbound transport
    pub fn set_midi_sink(&mut self, sink: Box<dyn MidiSink>) {
        self.midi_sink = Some(sink);
    }

    /// Deliver an inbound event to every enabled listener, following chains,
    /// and let collections react to note mappings
    pub fn receive_midi(&mut self, event: &MidiEvent) {
        let listeners: Vec<ModuleKey> = self
            .modules
            .iter_mut()
            .filter(|(_, module)| module.core().enabled())
            .filter_map(|(key, module)| module.as_midi_listener().map(|_| key.clone()))
            .collect();

        let mut visited = HashSet::new();
        for key in listeners {
            self.deliver_midi(key, event, &mut visited);
        }

        let mapping_mode = self.midi_map_mode;
        let mut activations = Vec::new();
        for (key, module) in self.modules.iter_mut() {
            if let Some(index) = module
                .as_collection_mut()
                .and_then(|collection| collection.handle_midi(event, mapping_mode))
            {
                activations.push((key.clone(), index));
            }
        }
        for (owner, index) in activations {
            if let Err(err) = self.activate_child(&owner, index) {
                warn!(%err, "failed to activate collection item");
            }
        }
    }

    fn deliver_midi(&mut self, start: ModuleKey, event: &MidiEvent, visited: &mut HashSet<ModuleKey>) {
        let mut next = Some(start);
        while let Some(key) = next.take() {
            if !visited.insert(key.clone()) {
                break;
            }
            let Some(module) = self.modules.get_mut(&key) else {
                break;
            };
            if !module.core().enabled() {
                break;
            }
            if let Some(listener) = module.as_midi_listener() {
                listener.receive_midi(event);
            }
            next = module.core().chain().cloned();
        }
    }

    /// Whether MIDI mapping mode is on
    pub fn midi_map_mode(&self) -> bool {
        self.midi_map_mode
    }

    /// Toggle MIDI mapping mode on every module
    pub fn toggle_mapping_mode(&mut self) {
        self.midi_map_mode = !self.midi_map_mode;
        for module in self.modules.values_mut() {
            module.core_mut().set_midi_map_mode(self.midi_map_mode);
        }
        info!(enabled = self.midi_map_mode, "MIDI mapping mode");
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Feed one raw input event. Returns a request for the host, if any.
    pub fn handle_event(&mut self, event: &InputEvent) -> Option<PatchCommand> {
        let mut command = None;
        for gesture in self.input.handle(event) {
            match gesture {
                Gesture::Press(screen) => self.press_at(self.viewport.to_canvas(screen)),
                Gesture::Drag(screen) => self.drag_to(self.viewport.to_canvas(screen)),
                Gesture::Release(screen) => {
                    self.end_wire_at(self.viewport.to_canvas(screen));
                }
                Gesture::Pan(delta) => self.viewport.translation += delta,
                Gesture::Zoom(delta) => self.zoom_by(delta),
                Gesture::ResetView => self.reset_view(),
                Gesture::DeleteFocused => {
                    self.delete_focused_module();
                }
                Gesture::ToggleBrowser => self.toggle_browser(),
                Gesture::ToggleMapping => self.toggle_mapping_mode(),
                Gesture::SavePreset => command = Some(PatchCommand::SavePreset),
            }
        }
        command
    }

    /// Press at a canvas position: wire gesture first, then module focus
    pub fn press_at(&mut self, pos: Pos2) {
        if self.begin_wire_at(pos) {
            return;
        }
        match self.module_at(pos) {
            Some(key) => {
                let grab = self
                    .modules
                    .get(&key)
                    .map_or(Vec2::ZERO, |module| pos - module.core().position());
                self.focused = Some(key.clone());
                self.drag = DragState::Module { key, grab };
            }
            None => self.focused = None,
        }
    }

    /// Drag to a canvas position
    pub fn drag_to(&mut self, pos: Pos2) {
        match &mut self.drag {
            DragState::Wire(pending) => pending.pointer = pos,
            DragState::Module { key, grab } => {
                if let Some(module) = self.modules.get_mut(key) {
                    module.core_mut().set_position(pos - *grab);
                }
            }
            DragState::Idle => {}
        }
    }

    fn zoom_by(&mut self, delta: f32) {
        let zoom = self.viewport.zoom + delta * self.config.zoom_step;
        self.viewport.zoom = zoom.max(self.config.min_zoom);
    }

    // ------------------------------------------------------------------
    // View, focus, browser
    // ------------------------------------------------------------------

    /// Current pan/zoom
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Set the pan
    pub fn set_translation(&mut self, translation: Vec2) {
        self.viewport.translation = translation;
    }

    /// Set the zoom, clamped to the configured minimum
    pub fn set_zoom(&mut self, zoom: f32) {
        self.viewport.zoom = zoom.max(self.config.min_zoom);
    }

    /// Reset pan and zoom
    pub fn reset_view(&mut self) {
        self.viewport = Viewport::default();
    }

    /// Focused module
    pub fn focused(&self) -> Option<&ModuleKey> {
        self.focused.as_ref()
    }

    /// Focus a module. Returns false if it does not exist.
    pub fn focus(&mut self, key: &ModuleKey) -> bool {
        if self.modules.contains_key(key) {
            self.focused = Some(key.clone());
            true
        } else {
            false
        }
    }

    /// Module browser
    pub fn browser(&self) -> &ModuleBrowser {
        &self.browser
    }

    /// Mutable module browser
    pub fn browser_mut(&mut self) -> &mut ModuleBrowser {
        &mut self.browser
    }

    /// Show or hide the module browser
    pub fn toggle_browser(&mut self) {
        self.browser.toggle();
        if self.browser.is_visible() {
            self.browser.update();
        }
    }

    /// Add the module listed at `index` in the browser and hide it
    pub fn add_from_browser(&mut self, index: usize) -> Result<ModuleKey> {
        let type_name = self
            .browser
            .entry(index)
            .map(str::to_string)
            .ok_or_else(|| PatchError::ModuleTypeNotFound(format!("#{index}")))?;
        let key = self.add_module(&type_name)?;
        self.browser.hide();
        Ok(key)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Patch settings
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Module constructors
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Get a module by key
    pub fn module(&self, key: &ModuleKey) -> Option<&dyn PatchModule> {
        self.modules.get(key).map(|module| module.as_ref())
    }

    /// Get a mutable module by key
    pub fn module_mut(&mut self, key: &ModuleKey) -> Option<&mut (dyn PatchModule + 'static)> {
        self.modules.get_mut(key).map(|module| module.as_mut())
    }

    /// All modules in mapping order
    pub fn modules(&self) -> impl Iterator<Item = (&ModuleKey, &dyn PatchModule)> {
        self.modules.iter().map(|(key, module)| (key, module.as_ref()))
    }

    /// Whether a module exists
    pub fn contains_module(&self, key: &ModuleKey) -> bool {
        self.modules.contains_key(key)
    }

    /// Get the number of modules
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub(crate) fn is_enabled(&self, key: &ModuleKey) -> bool {
        self.modules
            .get(key)
            .is_some_and(|module| module.core().enabled())
    }

    /// Set a module parameter by name
    pub fn set_parameter(&mut self, key: &ModuleKey, name: &str, value: f32) -> Result<()> {
        let module = self
            .modules
            .get_mut(key)
            .ok_or_else(|| PatchError::ModuleNotFound(key.clone()))?;
        if module.core_mut().set_parameter(name, value) {
            Ok(())
        } else {
            Err(PatchError::ParameterNotFound {
                module: key.clone(),
                name: name.to_string(),
            })
        }
    }
}

fn below(rect: Rect, gap: f32) -> Pos2 {
    Pos2::new(rect.left(), rect.bottom() + gap)
}
