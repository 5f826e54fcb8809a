// SPDX-License-Identifier: MIT OR Apache-2.0
//! MIDI CONTROL IN and MIDI CONTROL OUT.
//!
//! The input module learns one controller while mapping mode is on and
//! publishes its value as a slider. The output module turns a parameter
//! into control changes, sending only when the 7-bit value moves.

use nocturne_graph::{
    draw_module_frame, Canvas, ControlChange, MidiEvent, MidiListener, ModuleCore, Payload, PatchModule,
    PortKind, Pos2, SharedSlider,
};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, trace};

/// Slider driven by an inbound controller
pub struct MidiControlIn {
    core: ModuleCore,
    value: SharedSlider,
    mapping: Option<(u8, u8)>,
}

impl MidiControlIn {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "MIDI CONTROL IN";

    /// Create an unmapped control input
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            value: Rc::new(Cell::new(0.0)),
            mapping: None,
        }
    }

    /// Learned `(channel, control)` pair
    pub fn mapping(&self) -> Option<(u8, u8)> {
        self.mapping
    }

    /// Current value in `0.0..=1.0`
    pub fn value(&self) -> f32 {
        self.value.get()
    }
}

impl Default for MidiControlIn {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for MidiControlIn {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        self.core.declare_input("chain in", PortKind::Chain);
        self.core.declare_output("value", PortKind::Slider);
        self.core.declare_output("chain", PortKind::Chain);
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        let rect = self.core.rect();
        let text = match (self.core.midi_map_mode(), self.mapping) {
            (true, _) => "LEARN".to_string(),
            (false, Some((channel, control))) => format!("{channel}/{control} {:.2}", self.value()),
            (false, None) => "unmapped".to_string(),
        };
        canvas.label(Pos2::new(rect.left() + 8.0, rect.bottom() - 14.0), &text);
    }

    fn output_payload(&self, port: usize) -> Payload {
        match port {
            0 => Payload::slider_of(&self.value),
            1 => Payload::Chain,
            _ => Payload::Empty,
        }
    }

    fn as_midi_listener(&mut self) -> Option<&mut dyn MidiListener> {
        Some(self)
    }
}

impl MidiListener for MidiControlIn {
    fn receive_midi(&mut self, event: &MidiEvent) {
        let MidiEvent::ControlChange(cc) = event else {
            return;
        };
        if self.core.midi_map_mode() {
            self.mapping = Some((cc.channel, cc.control));
            debug!(module = %self.core.key(), channel = cc.channel, control = cc.control, "controller learned");
            return;
        }
        if self.mapping == Some((cc.channel, cc.control)) {
            self.value.set(cc.normalized());
            trace!(module = %self.core.key(), value = cc.value, "controller moved");
        }
    }
}

/// Parameter forwarded to an outbound controller
pub struct MidiControlOut {
    core: ModuleCore,
    last_sent: Option<u8>,
}

impl MidiControlOut {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "MIDI CONTROL OUT";

    /// Create a control output on channel 1, controller 0
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            last_sent: None,
        }
    }

    fn message(&self) -> Option<ControlChange> {
        let value = self.core.parameter("value")?;
        let channel = self.core.parameter("channel")?.round() as u8;
        let control = self.core.parameter("control")?.round() as u8;
        Some(ControlChange::new(channel, control, (value * 127.0).round() as u8))
    }
}

impl Default for MidiControlOut {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for MidiControlOut {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        self.core.declare_parameter("value", 0.0, 0.0, 1.0);
        self.core.declare_parameter("channel", 1.0, 1.0, 16.0);
        self.core.declare_parameter("control", 0.0, 0.0, 127.0);
    }

    fn update(&mut self) {
        let Some(message) = self.message() else {
            return;
        };
        if self.last_sent == Some(message.value) {
            return;
        }
        self.last_sent = Some(message.value);
        self.core.send_midi(message);
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        if let Some(message) = self.message() {
            let rect = self.core.rect();
            canvas.label(
                Pos2::new(rect.left() + 8.0, rect.bottom() - 14.0),
                &format!("{}/{} = {}", message.channel, message.control, message.value),
            );
        }
    }
}
