// SPDX-License-Identifier: MIT OR Apache-2.0
//! SHADER: a CPU fragment program filling a frame from its colour
//! parameters, modulated by an input texture and light when bound.

use nocturne_graph::{
    draw_module_frame, shared_buffer, Canvas, FrameBuffer, ModuleCore, Payload, PatchModule, PortKind,
    Pos2, Resolution, SharedBuffer,
};
use tracing::debug;

const COLOR_CHANNELS: [&str; 4] = ["red", "green", "blue", "alpha"];

/// Colour generator with optional texture and light inputs
pub struct Shader {
    core: ModuleCore,
    output: SharedBuffer,
    color: [f32; 4],
    custom: Vec<(String, f32, f32)>,
}

impl Shader {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "SHADER";

    /// Create a white shader
    pub fn new() -> Self {
        Self::with_color([1.0, 1.0, 1.0, 1.0])
    }

    /// Create a shader with an initial colour
    pub fn with_color(color: [f32; 4]) -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            output: shared_buffer(Resolution::new(1, 1)),
            color,
            custom: Vec::new(),
        }
    }

    /// Add a named parameter together with its slider input
    pub fn add_parameter(&mut self, name: &str, min: f32, max: f32) {
        if self.custom.iter().any(|(existing, _, _)| existing == name) {
            return;
        }
        self.custom.push((name.to_string(), min, max));
        self.core.declare_parameter(name, min, min, max);
        debug!(module = %self.core.key(), parameter = name, "shader parameter added");
    }

    fn tint(&self) -> [f32; 4] {
        let mut tint = self.color;
        for (channel, name) in tint.iter_mut().zip(COLOR_CHANNELS) {
            if let Some(value) = self.core.parameter(name) {
                *channel = value;
            }
        }
        if let Some(light) = self.core.input_light("light") {
            let light = light.borrow();
            for (channel, lit) in tint.iter_mut().zip(light.color).take(3) {
                *channel = (*channel * lit * light.intensity).clamp(0.0, 1.0);
            }
        }
        tint
    }
}

impl Default for Shader {
    fn default() -> Self {
        Self::new()
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn modulate(frame: &mut FrameBuffer, tint: [f32; 4]) {
    for pixel in frame.image_mut().pixels_mut() {
        for (channel, factor) in pixel.0.iter_mut().zip(tint) {
            *channel = (f32::from(*channel) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
}

impl PatchModule for Shader {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        *self.output.borrow_mut() = FrameBuffer::new(self.core.resolution());

        self.core.declare_input("texture", PortKind::Buffer);
        self.core.declare_input("light", PortKind::Light);
        for (name, value) in COLOR_CHANNELS.iter().zip(self.color) {
            self.core.declare_parameter(name, value, 0.0, 1.0);
        }
        for (name, min, max) in &self.custom {
            self.core.declare_parameter(name, *min, *min, *max);
        }
        self.core.declare_output("out", PortKind::Buffer);
    }

    fn update(&mut self) {
        let tint = self.tint();
        let texture = self.core.input_buffer("texture");
        let mut frame = self.output.borrow_mut();

        match texture.as_ref().and_then(|t| t.try_borrow().ok()) {
            Some(texture) => {
                frame.copy_from(&texture);
                modulate(&mut frame, tint);
            }
            None => frame.fill(to_rgba8(tint)),
        };
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        let rect = self.core.rect();
        let [r, g, b, a] = to_rgba8(self.tint());
        canvas.label(
            Pos2::new(rect.left() + 8.0, rect.bottom() - 14.0),
            &format!("#{r:02x}{g:02x}{b:02x}{a:02x}"),
        );
    }

    fn output_payload(&self, port: usize) -> Payload {
        match port {
            0 => Payload::buffer_of(&self.output),
            _ => Payload::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Light;
    use crate::test_support::{connect, frame_of, patch};

    #[test]
    fn test_fills_with_colour() {
        let mut patch = patch();
        let shader = patch.add_module(Shader::TYPE_NAME).unwrap();
        patch.set_parameter(&shader, "green", 0.0).unwrap();
        patch.update();
        assert_eq!(frame_of(&patch, &shader).borrow().pixel(0, 0), [255, 0, 255, 255]);
    }

    #[test]
    fn test_texture_is_modulated() {
        let mut patch = patch();
        let source = patch.add_module(Shader::TYPE_NAME).unwrap();
        let filter = patch.add_module(Shader::TYPE_NAME).unwrap();
        connect(&mut patch, &source, "out", &filter, "texture");
        patch.set_parameter(&filter, "red", 0.5).unwrap();
        patch.update();
        assert_eq!(frame_of(&patch, &filter).borrow().pixel(1, 1), [128, 255, 255, 255]);
    }

    #[test]
    fn test_light_scales_colour() {
        let mut patch = patch();
        let light = patch.add_module(Light::TYPE_NAME).unwrap();
        let shader = patch.add_module(Shader::TYPE_NAME).unwrap();
        connect(&mut patch, &light, "out", &shader, "light");
        patch.set_parameter(&light, "blue", 0.0).unwrap();
        patch.update();
        assert_eq!(frame_of(&patch, &shader).borrow().pixel(0, 0), [255, 255, 0, 255]);
    }

    #[test]
    fn test_add_parameter_adds_slider_input() {
        let mut shader = Shader::new();
        shader.add_parameter("speed", 0.0, 4.0);
        shader.add_parameter("speed", 0.0, 4.0);
        shader.setup();
        let core = shader.core();
        assert_eq!(core.parameter("speed"), Some(0.0));
        assert_eq!(core.inputs().iter().filter(|p| p.name == "speed").count(), 1);
        assert_eq!(core.outputs().len(), 1);
    }
}
