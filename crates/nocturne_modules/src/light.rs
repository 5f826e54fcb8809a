// SPDX-License-Identifier: MIT OR Apache-2.0
//! LIGHT: publishes a light state for shaders to consume.

use nocturne_graph::{
    draw_module_frame, Canvas, LightState, ModuleCore, Payload, PatchModule, PortKind, Pos2, SharedLight,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Point light with colour, intensity and position
pub struct Light {
    core: ModuleCore,
    state: SharedLight,
}

impl Light {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "LIGHT";

    /// Create a white light
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            state: Rc::new(RefCell::new(LightState::default())),
        }
    }

    /// Current published state
    pub fn state(&self) -> LightState {
        *self.state.borrow()
    }

    fn read(&self, name: &str, fallback: f32) -> f32 {
        self.core.parameter(name).unwrap_or(fallback)
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for Light {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        let initial = LightState::default();
        for (name, value) in ["red", "green", "blue"].into_iter().zip(initial.color) {
            self.core.declare_parameter(name, value, 0.0, 1.0);
        }
        self.core.declare_parameter("intensity", initial.intensity, 0.0, 4.0);
        for (name, value) in ["x", "y", "z"].into_iter().zip(initial.position) {
            self.core.declare_parameter(name, value, -10.0, 10.0);
        }
        self.core.declare_output("out", PortKind::Light);
    }

    fn update(&mut self) {
        let next = LightState {
            color: [
                self.read("red", 1.0),
                self.read("green", 1.0),
                self.read("blue", 1.0),
                1.0,
            ],
            position: [self.read("x", 0.0), self.read("y", 0.0), self.read("z", 1.0)],
            intensity: self.read("intensity", 1.0),
        };
        *self.state.borrow_mut() = next;
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        let rect = self.core.rect();
        let state = self.state();
        canvas.label(
            Pos2::new(rect.left() + 8.0, rect.bottom() - 14.0),
            &format!("x{:.2}", state.intensity),
        );
    }

    fn output_payload(&self, port: usize) -> Payload {
        match port {
            0 => Payload::light_of(&self.state),
            _ => Payload::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_publish_state() {
        let mut light = Light::new();
        light.setup();
        light.core_mut().set_parameter("intensity", 2.5);
        light.core_mut().set_parameter("x", 3.0);
        light.core_mut().set_parameter("red", 7.0);
        light.update();

        let state = light.state();
        assert_eq!(state.intensity, 2.5);
        assert_eq!(state.position, [3.0, 0.0, 1.0]);
        assert_eq!(state.color[0], 1.0);
    }

    #[test]
    fn test_output_references_state() {
        let mut light = Light::new();
        light.setup();
        let payload = light.output_payload(0);
        assert!(payload.refers_to_light(&light.state));
        assert!(light.output_payload(1).is_empty());
    }
}
