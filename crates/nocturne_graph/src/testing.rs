// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configurable module used by the unit tests.

use crate::collection::Collection;
use crate::midi::{ControlChange, MidiEvent, MidiListener};
use crate::module::{ModuleCore, PatchModule, ResolutionSource};
use crate::payload::{
    shared_buffer, FrameBuffer, LightState, Payload, Resolution, SharedBuffer, SharedLight, SharedSlider,
};
use crate::port::PortKind;
use crate::registry::ModuleRegistry;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Counters shared between probes and the test body
#[derive(Clone, Default)]
pub(crate) struct ProbeLog {
    pub setups: Rc<Cell<usize>>,
    pub midi: Rc<RefCell<Vec<(String, MidiEvent)>>>,
}

pub(crate) struct Probe {
    core: ModuleCore,
    inputs: Vec<(&'static str, PortKind)>,
    outputs: Vec<(&'static str, PortKind)>,
    bank: Option<(&'static str, usize)>,
    parameters: Vec<(&'static str, f32, f32, f32)>,
    buffer: SharedBuffer,
    light: SharedLight,
    slider: SharedSlider,
    tracks: Option<&'static str>,
    emits: Option<ControlChange>,
    listens: bool,
    config: bool,
    collection: Option<Collection>,
    log: ProbeLog,
}

impl Probe {
    pub fn new(type_name: &str) -> Self {
        Self {
            core: ModuleCore::new(type_name),
            inputs: Vec::new(),
            outputs: Vec::new(),
            bank: None,
            parameters: Vec::new(),
            buffer: shared_buffer(Resolution::new(1, 1)),
            light: Rc::new(RefCell::new(LightState::default())),
            slider: Rc::new(Cell::new(0.0)),
            tracks: None,
            emits: None,
            listens: false,
            config: false,
            collection: None,
            log: ProbeLog::default(),
        }
    }

    /// A module with one buffer output named `out`
    pub fn source(type_name: &str) -> Self {
        Self::new(type_name).output("out", PortKind::Buffer)
    }

    /// The shapes registered by [`probe_registry`]
    pub fn named(type_name: &str) -> Self {
        match type_name {
            "SOURCE" => Self::source(type_name),
            "LAMP" => Self::new(type_name).output("out", PortKind::Light),
            "KNOB" => {
                let mut knob = Self::new(type_name)
                    .parameter("level", 0.0, 0.0, 1.0)
                    .output("value", PortKind::Slider);
                knob.tracks = Some("level");
                knob
            }
            "SINK" => Self::new(type_name)
                .input("in1", PortKind::Buffer)
                .input("in2", PortKind::Buffer)
                .input("light", PortKind::Light)
                .output("out", PortKind::Buffer),
            "BANK" => {
                let mut bank = Self::new(type_name);
                bank.bank = Some(("layer", 2));
                bank
            }
            "DIAL" => Self::new(type_name).parameter("gain", 0.0, 0.0, 10.0),
            "LINK" => {
                let mut link = Self::new(type_name)
                    .input("chain in", PortKind::Chain)
                    .output("chain", PortKind::Chain);
                link.listens = true;
                link
            }
            "CONFIG" => {
                let mut config = Self::new(type_name);
                config.config = true;
                config
            }
            "POOL" => {
                let mut collection = Collection::new("POOL");
                for item in 0..2 {
                    collection.add_item(format!("item {item}"), Box::new(Self::source("SOURCE")));
                }
                let mut pool = Self::new(type_name);
                pool.collection = Some(collection);
                pool
            }
            "EMITTER" => {
                let mut emitter = Self::new(type_name);
                emitter.emits = Some(ControlChange::new(1, 7, 64));
                emitter
            }
            _ => Self::new(type_name),
        }
    }

    pub fn input(mut self, name: &'static str, kind: PortKind) -> Self {
        self.inputs.push((name, kind));
        self
    }

    pub fn output(mut self, name: &'static str, kind: PortKind) -> Self {
        self.outputs.push((name, kind));
        self
    }

    pub fn parameter(mut self, name: &'static str, value: f32, min: f32, max: f32) -> Self {
        self.parameters.push((name, value, min, max));
        self
    }

    pub fn logging(mut self, log: &ProbeLog) -> Self {
        self.log = log.clone();
        self
    }
}

impl PatchModule for Probe {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        self.log.setups.set(self.log.setups.get() + 1);
        *self.buffer.borrow_mut() = FrameBuffer::new(self.core.resolution());

        for (name, kind) in &self.inputs {
            self.core.declare_input(name, *kind);
        }
        if let Some((name, count)) = self.bank {
            self.core.declare_input_bank(name, count);
        }
        for (name, value, min, max) in &self.parameters {
            self.core.declare_parameter(name, *value, *min, *max);
        }
        if self.config {
            let resolution = self.core.resolution();
            self.core
                .declare_parameter("width", resolution.width as f32, 1.0, 8192.0);
            self.core
                .declare_parameter("height", resolution.height as f32, 1.0, 8192.0);
        }
        for (name, kind) in &self.outputs {
            self.core.declare_output(name, *kind);
        }
    }

    fn update(&mut self) {
        if let Some(name) = self.tracks {
            if let Some(parameter) = self.core.parameter_info(name) {
                self.slider.set(parameter.normalized());
            }
        }
        if let Some(message) = self.emits {
            self.core.send_midi(message);
        }
    }

    fn output_payload(&self, port: usize) -> Payload {
        match self.core.output(port).map(|p| p.kind) {
            Some(PortKind::Buffer | PortKind::MultiBuffer) => Payload::buffer_of(&self.buffer),
            Some(PortKind::Light) => Payload::light_of(&self.light),
            Some(PortKind::Slider) => Payload::slider_of(&self.slider),
            Some(PortKind::Chain) => Payload::Chain,
            None => Payload::Empty,
        }
    }

    fn as_resolution_source(&mut self) -> Option<&mut dyn ResolutionSource> {
        if self.config {
            Some(self)
        } else {
            None
        }
    }

    fn as_midi_listener(&mut self) -> Option<&mut dyn MidiListener> {
        if self.listens {
            Some(self)
        } else {
            None
        }
    }

    fn as_collection(&self) -> Option<&Collection> {
        self.collection.as_ref()
    }

    fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        self.collection.as_mut()
    }
}

impl ResolutionSource for Probe {
    fn take_resolution_change(&mut self) -> Option<Resolution> {
        let width = self.core.parameter("width")? as u32;
        let height = self.core.parameter("height")? as u32;
        let requested = Resolution::new(width, height);
        (requested != self.core.resolution()).then_some(requested)
    }
}

impl MidiListener for Probe {
    fn receive_midi(&mut self, event: &MidiEvent) {
        self.log
            .midi
            .borrow_mut()
            .push((self.core.key().to_string(), *event));
    }
}

/// Registry of every probe shape, all sharing one log
pub(crate) fn probe_registry() -> (ModuleRegistry, ProbeLog) {
    let log = ProbeLog::default();
    let mut registry = ModuleRegistry::new();
    for name in [
        "SOURCE", "LAMP", "KNOB", "SINK", "BANK", "DIAL", "LINK", "CONFIG", "POOL", "EMITTER",
    ] {
        let log = log.clone();
        registry.register(name, move || Box::new(Probe::named(name).logging(&log)));
    }
    (registry, log)
}
