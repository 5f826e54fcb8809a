// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for module inputs/outputs.

use crate::payload::Payload;
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Side length of the square hit region around a port dot
pub const PORT_HIT_SIZE: f32 = 16.0;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Kind of payload a port carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Single frame buffer
    Buffer,
    /// One indexed slot of a frame buffer bank
    MultiBuffer,
    /// Lighting state
    Light,
    /// Control value bound to a parameter
    Slider,
    /// Module-to-module control cascade
    Chain,
}

impl PortKind {
    /// Get the color for this port kind (for UI)
    pub fn color(self) -> [u8; 3] {
        match self {
            Self::Buffer => [100, 150, 200],
            Self::MultiBuffer => [80, 200, 200],
            Self::Light => [255, 200, 100],
            Self::Slider => [80, 200, 80],
            Self::Chain => [200, 100, 200],
        }
    }

    /// Short label
    pub fn label(self) -> &'static str {
        match self {
            Self::Buffer => "BUFFER",
            Self::MultiBuffer => "MULTI BUFFER",
            Self::Light => "LIGHT",
            Self::Slider => "SLIDER",
            Self::Chain => "CHAIN",
        }
    }

    /// Check whether an input of this kind accepts an output of `output` kind
    pub fn accepts(self, output: PortKind) -> bool {
        // Buffer banks take plain buffer outputs
        self == output || (self == Self::MultiBuffer && output == Self::Buffer)
    }
}

/// A port on a module
#[derive(Debug, Clone)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Payload kind, fixed at creation
    pub kind: PortKind,
    /// Slot index inside a buffer bank, 0 otherwise
    pub index: usize,
    region: Rect,
    payload: Payload,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, kind: PortKind) -> Self {
        Self::new(name, kind, PortDirection::Input)
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, kind: PortKind) -> Self {
        Self::new(name, kind, PortDirection::Output)
    }

    fn new(name: impl Into<String>, kind: PortKind, direction: PortDirection) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction,
            kind,
            index: 0,
            region: Rect::NOTHING,
            payload: Payload::Empty,
        }
    }

    /// Set the bank index
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Label shown next to the port dot
    pub fn label(&self) -> String {
        if self.kind == PortKind::MultiBuffer {
            format!("{} {}", self.name, self.index + 1)
        } else {
            self.name.clone()
        }
    }

    /// Canvas-space hit region
    pub fn region(&self) -> Rect {
        self.region
    }

    /// Centre of the port dot
    pub fn center(&self) -> Pos2 {
        self.region.center()
    }

    /// Place the port dot at `center`
    pub(crate) fn place(&mut self, center: Pos2) {
        self.region = Rect::from_center_size(center, Vec2::splat(PORT_HIT_SIZE));
    }

    /// Check whether a canvas-space point hits this port
    pub fn contains(&self, pos: Pos2) -> bool {
        self.region.contains(pos)
    }

    /// Payload currently held by the port
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Whether a payload is bound
    pub fn is_connected(&self) -> bool {
        !self.payload.is_empty()
    }

    pub(crate) fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    pub(crate) fn clear_payload(&mut self) {
        self.payload = Payload::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_compatibility() {
        assert!(PortKind::Buffer.accepts(PortKind::Buffer));
        assert!(PortKind::MultiBuffer.accepts(PortKind::Buffer));
        assert!(!PortKind::Buffer.accepts(PortKind::MultiBuffer));
        assert!(!PortKind::Buffer.accepts(PortKind::Light));
        assert!(!PortKind::Slider.accepts(PortKind::Chain));
    }

    #[test]
    fn test_unplaced_port_hits_nothing() {
        let port = Port::input("in", PortKind::Buffer);
        assert!(!port.contains(Pos2::ZERO));
    }

    #[test]
    fn test_placed_port_region() {
        let mut port = Port::output("out", PortKind::Light);
        port.place(Pos2::new(100.0, 50.0));
        assert!(port.contains(Pos2::new(104.0, 46.0)));
        assert!(!port.contains(Pos2::new(120.0, 50.0)));
        assert_eq!(port.center(), Pos2::new(100.0, 50.0));
    }

    #[test]
    fn test_bank_label() {
        let port = Port::input("layer", PortKind::MultiBuffer).with_index(2);
        assert_eq!(port.label(), "layer 3");
    }
}
