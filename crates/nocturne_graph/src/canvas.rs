// SPDX-License-Identifier: MIT OR Apache-2.0
//! Draw hook between the engine and a rendering toolkit.
//!
//! The engine describes a frame as calls on a [`Canvas`]; [`DrawList`]
//! records them (headless hosts, tests) and [`crate::ui::EguiCanvas`] paints
//! them with egui.

use crate::module::ModuleCore;
use crate::port::{PortDirection, PortKind};
use egui::{Pos2, Rect, Vec2};

/// Canvas pan/zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Screen-space translation
    pub translation: Vec2,
    /// Scale factor
    pub zoom: f32,
}

impl Viewport {
    /// Convert a screen position to canvas space
    pub fn to_canvas(&self, screen: Pos2) -> Pos2 {
        ((screen - self.translation).to_vec2() / self.zoom).to_pos2()
    }

    /// Convert a canvas position to screen space
    pub fn to_screen(&self, canvas: Pos2) -> Pos2 {
        (canvas.to_vec2() * self.zoom + self.translation).to_pos2()
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

/// Drawing surface the patch renders onto.
///
/// Positions are in canvas space between `begin_view` and `end_view`, and in
/// screen space outside.
pub trait Canvas {
    /// Apply the canvas transform
    fn begin_view(&mut self, viewport: Viewport);
    /// Restore the screen transform
    fn end_view(&mut self);
    /// Wire between two points
    fn wire(&mut self, from: Pos2, to: Pos2, kind: PortKind);
    /// Module body with its title
    fn module(&mut self, rect: Rect, title: &str);
    /// Port dot with its label
    fn port(&mut self, center: Pos2, kind: PortKind, direction: PortDirection, label: &str, connected: bool);
    /// Focus outline around a module
    fn focus(&mut self, rect: Rect);
    /// Free-form text
    fn label(&mut self, pos: Pos2, text: &str);
    /// Module browser overlay
    fn browser(&mut self, entries: &[String]);
}

/// Draw a module body and its ports
pub fn draw_module_frame(core: &ModuleCore, canvas: &mut dyn Canvas) {
    canvas.module(core.rect(), core.title());
    for port in core.inputs().iter().chain(core.outputs()) {
        canvas.port(
            port.center(),
            port.kind,
            port.direction,
            &port.label(),
            port.is_connected(),
        );
    }
}

/// One recorded canvas call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// `begin_view`
    BeginView(Viewport),
    /// `end_view`
    EndView,
    /// `wire`
    Wire {
        /// Start point
        from: Pos2,
        /// End point
        to: Pos2,
        /// Wire kind
        kind: PortKind,
    },
    /// `module`
    Module {
        /// Body rectangle
        rect: Rect,
        /// Title
        title: String,
    },
    /// `port`
    Port {
        /// Dot centre
        center: Pos2,
        /// Port kind
        kind: PortKind,
        /// Port direction
        direction: PortDirection,
        /// Whether a payload is bound
        connected: bool,
    },
    /// `focus`
    Focus(Rect),
    /// `label`
    Label(String),
    /// `browser`
    Browser(Vec<String>),
}

/// Canvas that records every call
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands in call order
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Forget every recorded command
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Titles of the modules drawn, in draw order
    pub fn module_titles(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Module { title, .. } => Some(title.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of wires drawn
    pub fn wire_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Wire { .. }))
            .count()
    }
}

impl Canvas for DrawList {
    fn begin_view(&mut self, viewport: Viewport) {
        self.commands.push(DrawCommand::BeginView(viewport));
    }

    fn end_view(&mut self) {
        self.commands.push(DrawCommand::EndView);
    }

    fn wire(&mut self, from: Pos2, to: Pos2, kind: PortKind) {
        self.commands.push(DrawCommand::Wire { from, to, kind });
    }

    fn module(&mut self, rect: Rect, title: &str) {
        self.commands.push(DrawCommand::Module {
            rect,
            title: title.to_string(),
        });
    }

    fn port(&mut self, center: Pos2, kind: PortKind, direction: PortDirection, _label: &str, connected: bool) {
        self.commands.push(DrawCommand::Port {
            center,
            kind,
            direction,
            connected,
        });
    }

    fn focus(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::Focus(rect));
    }

    fn label(&mut self, _pos: Pos2, text: &str) {
        self.commands.push(DrawCommand::Label(text.to_string()));
    }

    fn browser(&mut self, entries: &[String]) {
        self.commands.push(DrawCommand::Browser(entries.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_round_trip() {
        let viewport = Viewport {
            translation: Vec2::new(40.0, -10.0),
            zoom: 2.0,
        };
        let screen = Pos2::new(140.0, 90.0);
        let canvas = viewport.to_canvas(screen);
        assert_eq!(canvas, Pos2::new(50.0, 50.0));
        assert_eq!(viewport.to_screen(canvas), screen);
    }

    #[test]
    fn test_module_frame_draws_every_port() {
        let mut core = ModuleCore::new("TEST");
        core.declare_input("in", PortKind::Buffer);
        core.declare_output("out", PortKind::Buffer);
        let mut list = DrawList::new();
        draw_module_frame(&core, &mut list);
        assert_eq!(list.module_titles(), vec!["TEST@0"]);
        assert_eq!(list.commands().len(), 3);
    }
}
