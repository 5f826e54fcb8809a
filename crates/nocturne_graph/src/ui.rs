// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui rendering and input for the patch editor.
//!
//! [`EguiCanvas`] paints the calls a [`Patch`] makes on its [`Canvas`];
//! [`PatchEditor`] turns egui pointer and key state into [`InputEvent`]s.

use crate::canvas::{Canvas, Viewport};
use crate::input::{InputEvent, Key, PointerButton};
use crate::module::MODULE_HEADER_HEIGHT;
use crate::patch::{Patch, PatchCommand};
use crate::port::{PortDirection, PortKind};
use egui::{Color32, Pos2, Rect, Stroke, Vec2};

const PORT_RADIUS: f32 = 6.0;
const PORT_PADDING: f32 = 12.0;
const MODULE_ROUNDING: f32 = 6.0;
const MODULE_SHADOW_OFFSET: f32 = 3.0;

const BEZIER_CURVATURE: f32 = 50.0;
const WIRE_THICKNESS: f32 = 2.5;

const GRID_SPACING: f32 = 20.0;

const BROWSER_WIDTH: f32 = 220.0;
const BROWSER_ROW_HEIGHT: f32 = 18.0;

fn kind_color(kind: PortKind) -> Color32 {
    let [r, g, b] = kind.color();
    Color32::from_rgb(r, g, b)
}

/// Canvas backed by an egui painter
pub struct EguiCanvas<'a> {
    painter: &'a egui::Painter,
    origin: Vec2,
    viewport: Viewport,
    in_view: bool,
}

impl<'a> EguiCanvas<'a> {
    /// Paint with `painter`; `origin` is the widget's top-left corner
    pub fn new(painter: &'a egui::Painter, origin: Vec2) -> Self {
        Self {
            painter,
            origin,
            viewport: Viewport::default(),
            in_view: false,
        }
    }

    fn to_screen(&self, pos: Pos2) -> Pos2 {
        let pos = if self.in_view {
            self.viewport.to_screen(pos)
        } else {
            pos
        };
        pos + self.origin
    }

    fn scale(&self) -> f32 {
        if self.in_view {
            self.viewport.zoom
        } else {
            1.0
        }
    }

    fn screen_rect(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.to_screen(rect.min), self.to_screen(rect.max))
    }
}

impl Canvas for EguiCanvas<'_> {
    fn begin_view(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.in_view = true;
    }

    fn end_view(&mut self) {
        self.in_view = false;
    }

    fn wire(&mut self, from: Pos2, to: Pos2, kind: PortKind) {
        let scale = self.scale();
        let from = self.to_screen(from);
        let to = self.to_screen(to);
        let distance = (to.x - from.x).abs();
        let curvature = (BEZIER_CURVATURE * scale).min(distance * 0.5);

        let ctrl1 = Pos2::new(from.x + curvature, from.y);
        let ctrl2 = Pos2::new(to.x - curvature, to.y);

        let stroke = Stroke::new(WIRE_THICKNESS * scale, kind_color(kind));
        for segment in bezier_points(from, ctrl1, ctrl2, to, 32).windows(2) {
            self.painter.line_segment([segment[0], segment[1]], stroke);
        }
    }

    fn module(&mut self, rect: Rect, title: &str) {
        let scale = self.scale();
        let rect = self.screen_rect(rect);
        let rounding = MODULE_ROUNDING * scale;

        self.painter.rect_filled(
            rect.translate(Vec2::splat(MODULE_SHADOW_OFFSET)),
            rounding,
            Color32::from_rgba_unmultiplied(0, 0, 0, 60),
        );
        self.painter
            .rect_filled(rect, rounding, Color32::from_rgb(45, 45, 48));

        let header = Rect::from_min_size(rect.min, Vec2::new(rect.width(), MODULE_HEADER_HEIGHT * scale));
        self.painter.rect_filled(
            header,
            egui::Rounding {
                nw: rounding,
                ne: rounding,
                sw: 0.0,
                se: 0.0,
            },
            Color32::from_rgb(70, 100, 130),
        );
        self.painter.text(
            header.center(),
            egui::Align2::CENTER_CENTER,
            title,
            egui::FontId::proportional(12.0 * scale),
            Color32::WHITE,
        );
    }

    fn port(&mut self, center: Pos2, kind: PortKind, direction: PortDirection, label: &str, connected: bool) {
        let scale = self.scale();
        let center = self.to_screen(center);
        let radius = PORT_RADIUS * scale;
        let color = kind_color(kind);

        if connected {
            self.painter.circle_filled(center, radius, color);
        } else {
            self.painter
                .circle_filled(center, radius, Color32::from_gray(40));
        }
        self.painter
            .circle_stroke(center, radius, Stroke::new(1.0, color));

        let (offset, align) = match direction {
            PortDirection::Input => (PORT_PADDING, egui::Align2::LEFT_CENTER),
            PortDirection::Output => (-PORT_PADDING, egui::Align2::RIGHT_CENTER),
        };
        self.painter.text(
            Pos2::new(center.x + offset * scale, center.y),
            align,
            label,
            egui::FontId::proportional(10.0 * scale),
            Color32::from_gray(200),
        );
    }

    fn focus(&mut self, rect: Rect) {
        let rounding = MODULE_ROUNDING * self.scale();
        self.painter.rect_stroke(
            self.screen_rect(rect),
            rounding,
            Stroke::new(2.0, Color32::from_rgb(100, 150, 255)),
        );
    }

    fn label(&mut self, pos: Pos2, text: &str) {
        self.painter.text(
            self.to_screen(pos),
            egui::Align2::LEFT_TOP,
            text,
            egui::FontId::proportional(11.0 * self.scale()),
            Color32::from_gray(220),
        );
    }

    fn browser(&mut self, entries: &[String]) {
        let top_left = self.to_screen(Pos2::new(8.0, 8.0));
        let height = (entries.len().max(1) as f32) * BROWSER_ROW_HEIGHT + 8.0;
        let panel = Rect::from_min_size(top_left, Vec2::new(BROWSER_WIDTH, height));

        self.painter
            .rect_filled(panel, 4.0, Color32::from_rgba_unmultiplied(30, 30, 30, 220));
        self.painter
            .rect_stroke(panel, 4.0, Stroke::new(1.0, Color32::from_gray(60)));

        for (row, entry) in entries.iter().enumerate() {
            self.painter.text(
                Pos2::new(panel.left() + 8.0, panel.top() + 4.0 + row as f32 * BROWSER_ROW_HEIGHT),
                egui::Align2::LEFT_TOP,
                entry,
                egui::FontId::proportional(12.0),
                Color32::from_gray(220),
            );
        }
    }
}

/// Draw the background grid for a viewport
pub fn draw_grid(painter: &egui::Painter, rect: Rect, viewport: Viewport) {
    let spacing = GRID_SPACING * viewport.zoom;
    if spacing < 4.0 {
        return;
    }
    let major = spacing * 5.0;
    let minor_color = Color32::from_rgba_unmultiplied(60, 60, 60, 100);
    let major_color = Color32::from_rgba_unmultiplied(80, 80, 80, 150);

    for (step, color) in [(spacing, minor_color), (major, major_color)] {
        let mut x = rect.left() + viewport.translation.x.rem_euclid(step);
        while x < rect.right() {
            painter.line_segment(
                [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
                Stroke::new(1.0, color),
            );
            x += step;
        }
        let mut y = rect.top() + viewport.translation.y.rem_euclid(step);
        while y < rect.bottom() {
            painter.line_segment(
                [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
                Stroke::new(1.0, color),
            );
            y += step;
        }
    }
}

/// Interactive patch editor widget
#[derive(Debug, Clone)]
pub struct PatchEditor {
    modifiers: egui::Modifiers,
    /// Draw the background grid
    pub show_grid: bool,
}

impl Default for PatchEditor {
    fn default() -> Self {
        Self {
            modifiers: egui::Modifiers::NONE,
            show_grid: true,
        }
    }
}

impl PatchEditor {
    /// Create a new editor widget
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed this frame's input to the patch, then draw it.
    /// Returns a request for the host, if any.
    pub fn show(&mut self, ui: &mut egui::Ui, patch: &mut Patch) -> Option<PatchCommand> {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let origin = rect.min.to_vec2();

        let mut command = None;
        for event in self.collect_events(ui, &response, origin) {
            if let Some(request) = patch.handle_event(&event) {
                command = Some(request);
            }
        }

        let painter = ui.painter_at(rect);
        if self.show_grid {
            draw_grid(&painter, rect, patch.viewport());
        }
        let mut canvas = EguiCanvas::new(&painter, origin);
        patch.draw(&mut canvas);
        command
    }

    fn collect_events(&mut self, ui: &egui::Ui, response: &egui::Response, origin: Vec2) -> Vec<InputEvent> {
        let mut events = Vec::new();
        ui.input(|input| {
            self.sync_modifiers(input.modifiers, &mut events);

            for (key, ours) in [
                (egui::Key::Enter, Key::Enter),
                (egui::Key::Backspace, Key::Backspace),
                (egui::Key::R, Key::Character('r')),
                (egui::Key::S, Key::Character('s')),
                (egui::Key::M, Key::Character('m')),
            ] {
                if input.key_pressed(key) {
                    events.push(InputEvent::KeyPressed {
                        key: ours,
                        repeat: false,
                    });
                }
            }

            let Some(pointer) = input.pointer.interact_pos() else {
                return;
            };
            let position = pointer - origin;

            if response.hovered() {
                for (button, ours) in [
                    (egui::PointerButton::Primary, PointerButton::Primary),
                    (egui::PointerButton::Secondary, PointerButton::Secondary),
                    (egui::PointerButton::Middle, PointerButton::Middle),
                ] {
                    if input.pointer.button_pressed(button) {
                        events.push(InputEvent::PointerPressed { position, button: ours });
                    }
                }
                let scroll = input.raw_scroll_delta.y;
                if scroll != 0.0 {
                    events.push(InputEvent::Scrolled { delta: scroll.signum() });
                }
            }
            if input.pointer.primary_down() && input.pointer.delta() != Vec2::ZERO {
                events.push(InputEvent::PointerDragged { position });
            }
            if input.pointer.primary_released() {
                events.push(InputEvent::PointerReleased { position });
            }
        });
        events
    }

    fn sync_modifiers(&mut self, modifiers: egui::Modifiers, events: &mut Vec<InputEvent>) {
        let pairs = [
            (self.modifiers.command || self.modifiers.ctrl, modifiers.command || modifiers.ctrl, Key::Control),
            (self.modifiers.shift, modifiers.shift, Key::Shift),
            (self.modifiers.alt, modifiers.alt, Key::Alt),
        ];
        for (was, is, key) in pairs {
            match (was, is) {
                (false, true) => events.push(InputEvent::KeyPressed { key, repeat: false }),
                (true, false) => events.push(InputEvent::KeyReleased { key }),
                _ => {}
            }
        }
        self.modifiers = modifiers;
    }
}

/// Generate points along a cubic bezier curve
fn bezier_points(p0: Pos2, p1: Pos2, p2: Pos2, p3: Pos2, segments: usize) -> Vec<Pos2> {
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Pos2::new(x, y));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchConfig;
    use crate::payload::Resolution;
    use crate::testing::probe_registry;
    use crate::wire::PortAddress;

    #[test]
    fn test_bezier_endpoints() {
        let points = bezier_points(
            Pos2::new(0.0, 0.0),
            Pos2::new(10.0, 0.0),
            Pos2::new(20.0, 10.0),
            Pos2::new(30.0, 10.0),
            8,
        );
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], Pos2::new(0.0, 0.0));
        assert_eq!(points[8], Pos2::new(30.0, 10.0));
    }

    #[test]
    fn test_editor_paints_patch() {
        let (registry, _) = probe_registry();
        let mut patch = Patch::new(
            registry,
            PatchConfig {
                resolution: Resolution::new(8, 8),
                ..PatchConfig::default()
            },
        );
        let source = patch.add_module("SOURCE").unwrap();
        let sink = patch.add_module("SINK").unwrap();
        patch
            .connect(&PortAddress::new(&source, "out"), &PortAddress::new(&sink, "in1"))
            .unwrap();
        patch.toggle_browser();

        let mut editor = PatchEditor::new();
        let ctx = egui::Context::default();
        let output = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                assert_eq!(editor.show(ui, &mut patch), None);
            });
        });
        assert!(!output.shapes.is_empty());
    }

    #[test]
    fn test_modifier_sync_emits_key_events() {
        let mut editor = PatchEditor::new();
        let mut events = Vec::new();
        editor.sync_modifiers(egui::Modifiers::SHIFT, &mut events);
        editor.sync_modifiers(egui::Modifiers::NONE, &mut events);
        assert_eq!(
            events,
            vec![
                InputEvent::KeyPressed {
                    key: Key::Shift,
                    repeat: false,
                },
                InputEvent::KeyReleased { key: Key::Shift },
            ]
        );
    }
}
