// SPDX-License-Identifier: MIT OR Apache-2.0
//! MIXER and LAYER MIXER: composite several frames into one.
//!
//! The first bound layer is copied into the output; every later layer is
//! blended onto it with the selected mode. Inputs that are already borrowed
//! (a feedback loop through this module) are skipped for the frame.

use crate::blend::{composite, BlendMode};
use nocturne_graph::{
    draw_module_frame, shared_buffer, Canvas, FrameBuffer, ModuleCore, Payload, PatchModule, PortKind,
    Pos2, Resolution, SharedBuffer,
};
use std::rc::Rc;
use tracing::trace;

/// Number of slots in a layer mixer's bank
pub const LAYER_SLOTS: usize = 4;

fn declare_blend(core: &mut ModuleCore) {
    let last = (BlendMode::ALL.len() - 1) as f32;
    core.declare_parameter("blend", BlendMode::Alpha.as_parameter(), 0.0, last);
}

fn blend_mode(core: &ModuleCore) -> BlendMode {
    core.parameter("blend")
        .map(BlendMode::from_parameter)
        .unwrap_or_default()
}

fn mix_into(output: &SharedBuffer, layers: &[SharedBuffer], mode: BlendMode) {
    let Ok(mut target) = output.try_borrow_mut() else {
        return;
    };
    target.clear();
    let mut first = true;
    for layer in layers {
        if Rc::ptr_eq(layer, output) {
            continue;
        }
        let Ok(layer) = layer.try_borrow() else {
            trace!("layer busy; skipped");
            continue;
        };
        composite(&mut target, &layer, if first { BlendMode::Disabled } else { mode });
        first = false;
    }
}

fn draw_mode(core: &ModuleCore, canvas: &mut dyn Canvas) {
    let rect = core.rect();
    canvas.label(
        Pos2::new(rect.left() + 8.0, rect.bottom() - 14.0),
        blend_mode(core).label(),
    );
}

/// Two-input mixer
pub struct Mixer {
    core: ModuleCore,
    output: SharedBuffer,
}

impl Mixer {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "MIXER";

    /// Create a mixer
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            output: shared_buffer(Resolution::new(1, 1)),
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for Mixer {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        *self.output.borrow_mut() = FrameBuffer::new(self.core.resolution());
        self.core.declare_input("fbo1", PortKind::Buffer);
        self.core.declare_input("fbo2", PortKind::Buffer);
        declare_blend(&mut self.core);
        self.core.declare_output("out", PortKind::Buffer);
    }

    fn update(&mut self) {
        let layers: Vec<SharedBuffer> = ["fbo1", "fbo2"]
            .into_iter()
            .filter_map(|name| self.core.input_buffer(name))
            .collect();
        mix_into(&self.output, &layers, blend_mode(&self.core));
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        draw_mode(&self.core, canvas);
    }

    fn output_payload(&self, port: usize) -> Payload {
        match port {
            0 => Payload::buffer_of(&self.output),
            _ => Payload::Empty,
        }
    }
}

/// Mixer over a bank of indexed layer inputs
pub struct LayerMixer {
    core: ModuleCore,
    output: SharedBuffer,
}

impl LayerMixer {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "LAYER MIXER";

    /// Create a layer mixer
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            output: shared_buffer(Resolution::new(1, 1)),
        }
    }
}

impl Default for LayerMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for LayerMixer {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        *self.output.borrow_mut() = FrameBuffer::new(self.core.resolution());
        self.core.declare_input_bank("layer", LAYER_SLOTS);
        declare_blend(&mut self.core);
        self.core.declare_output("out", PortKind::Buffer);
    }

    fn update(&mut self) {
        let layers = self.core.bank_buffers("layer");
        mix_into(&self.output, &layers, blend_mode(&self.core));
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        draw_mode(&self.core, canvas);
    }

    fn output_payload(&self, port: usize) -> Payload {
        match port {
            0 => Payload::buffer_of(&self.output),
            _ => Payload::Empty,
        }
    }
}
