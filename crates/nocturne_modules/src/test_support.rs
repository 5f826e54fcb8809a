// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for module tests.

use crate::default_registry;
use nocturne_graph::{
    ControlChange, MidiSink, MidiSinkError, ModuleKey, Patch, PatchConfig, PortAddress, Pos2, Resolution,
    SharedBuffer,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Patch over the full catalog at a tiny resolution
pub fn patch() -> Patch {
    let config = PatchConfig {
        resolution: Resolution::new(4, 4),
        ..PatchConfig::default()
    };
    Patch::new(default_registry(), config)
}

/// Add a shader with a fixed colour
pub fn colored_shader(patch: &mut Patch, color: [f32; 4]) -> ModuleKey {
    let key = patch.add_module(crate::Shader::TYPE_NAME).unwrap();
    for (name, value) in ["red", "green", "blue", "alpha"].into_iter().zip(color) {
        patch.set_parameter(&key, name, value).unwrap();
    }
    key
}

/// Wire two ports by name
pub fn connect(patch: &mut Patch, from: &ModuleKey, output: &str, to: &ModuleKey, input: &str) {
    patch
        .connect(&PortAddress::new(from, output), &PortAddress::new(to, input))
        .unwrap();
}

/// Frame published on a module's first output
pub fn frame_of(patch: &Patch, key: &ModuleKey) -> SharedBuffer {
    patch
        .module(key)
        .unwrap()
        .output_payload(0)
        .buffer()
        .unwrap()
}

/// Move a module so gestures can find its ports
pub fn place(patch: &mut Patch, key: &ModuleKey, x: f32, y: f32) {
    patch
        .module_mut(key)
        .unwrap()
        .core_mut()
        .set_position(Pos2::new(x, y));
}

/// Centre of a named output
pub fn output_center(patch: &Patch, key: &ModuleKey, name: &str) -> Pos2 {
    let core = patch.module(key).unwrap().core();
    let port = core.output_index(name).unwrap();
    core.output(port).unwrap().center()
}

/// Centre of a named input slot
pub fn input_center(patch: &Patch, key: &ModuleKey, name: &str, index: usize) -> Pos2 {
    let core = patch.module(key).unwrap().core();
    let port = core.input_index(name, index).unwrap();
    core.input(port).unwrap().center()
}

/// Sink recording every outbound message
#[derive(Clone, Default)]
pub struct RecordingSink(pub Rc<RefCell<Vec<ControlChange>>>);

impl MidiSink for RecordingSink {
    fn send_control_change(&mut self, message: ControlChange) -> Result<(), MidiSinkError> {
        self.0.borrow_mut().push(message);
        Ok(())
    }
}
