// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime values that flow through wires.
//!
//! Producers own their resources behind an `Rc`; ports and wires only ever
//! hold the matching `Weak`, so a consumer never keeps a deleted producer's
//! frame alive.

use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Target render resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a new resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An RGBA frame owned by a producing module
#[derive(Clone)]
pub struct FrameBuffer {
    image: RgbaImage,
}

impl FrameBuffer {
    /// Allocate a transparent frame at the given resolution
    pub fn new(resolution: Resolution) -> Self {
        Self {
            image: RgbaImage::new(resolution.width, resolution.height),
        }
    }

    /// Current size of the frame
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    /// Clear every pixel to transparent black
    pub fn clear(&mut self) {
        self.fill([0, 0, 0, 0]);
    }

    /// Fill every pixel with one colour
    pub fn fill(&mut self, color: [u8; 4]) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba(color);
        }
    }

    /// Read one pixel
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Copy another frame into this one, rescaling when sizes differ
    pub fn copy_from(&mut self, other: &FrameBuffer) {
        if self.image.dimensions() == other.image.dimensions() {
            self.image.copy_from_slice(other.image.as_raw());
        } else {
            self.image = imageops::resize(
                &other.image,
                self.image.width(),
                self.image.height(),
                imageops::FilterType::Nearest,
            );
        }
    }

    /// Borrow the underlying image
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Mutably borrow the underlying image
    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("resolution", &self.resolution())
            .finish()
    }
}

/// Lighting state published by a light module
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    /// Linear RGBA colour
    pub color: [f32; 4],
    /// World position
    pub position: [f32; 3],
    /// Intensity multiplier
    pub intensity: f32,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            position: [0.0, 0.0, 1.0],
            intensity: 1.0,
        }
    }
}

/// Producer-owned frame
pub type SharedBuffer = Rc<RefCell<FrameBuffer>>;
/// Non-owning frame reference held by ports and wires
pub type BufferRef = Weak<RefCell<FrameBuffer>>;
/// Producer-owned light
pub type SharedLight = Rc<RefCell<LightState>>;
/// Non-owning light reference
pub type LightRef = Weak<RefCell<LightState>>;
/// Producer-owned control value in `0.0..=1.0`
pub type SharedSlider = Rc<Cell<f32>>;
/// Non-owning control value reference
pub type SliderRef = Weak<Cell<f32>>;

/// Allocate a shared frame
pub fn shared_buffer(resolution: Resolution) -> SharedBuffer {
    Rc::new(RefCell::new(FrameBuffer::new(resolution)))
}

/// Value carried by a port or wire
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// Nothing bound
    #[default]
    Empty,
    /// Frame buffer reference
    Buffer(BufferRef),
    /// Light state reference
    Light(LightRef),
    /// Slider value reference
    Slider(SliderRef),
    /// Chain marker; the chained module is recorded on the output module
    Chain,
}

impl Payload {
    /// Reference a shared frame
    pub fn buffer_of(buffer: &SharedBuffer) -> Self {
        Self::Buffer(Rc::downgrade(buffer))
    }

    /// Reference a shared light
    pub fn light_of(light: &SharedLight) -> Self {
        Self::Light(Rc::downgrade(light))
    }

    /// Reference a shared slider value
    pub fn slider_of(value: &SharedSlider) -> Self {
        Self::Slider(Rc::downgrade(value))
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Upgrade a frame reference, if the producer is still alive
    pub fn buffer(&self) -> Option<SharedBuffer> {
        match self {
            Self::Buffer(buffer) => buffer.upgrade(),
            _ => None,
        }
    }

    /// Upgrade a light reference, if the producer is still alive
    pub fn light(&self) -> Option<SharedLight> {
        match self {
            Self::Light(light) => light.upgrade(),
            _ => None,
        }
    }

    /// Read the current slider value, if the producer is still alive
    pub fn slider(&self) -> Option<f32> {
        match self {
            Self::Slider(value) => value.upgrade().map(|v| v.get()),
            _ => None,
        }
    }

    /// Whether this payload references the given frame
    pub fn refers_to_buffer(&self, buffer: &SharedBuffer) -> bool {
        self.buffer().is_some_and(|b| Rc::ptr_eq(&b, buffer))
    }

    /// Whether this payload references the given light
    pub fn refers_to_light(&self, light: &SharedLight) -> bool {
        self.light().is_some_and(|l| Rc::ptr_eq(&l, light))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_does_not_own_producer() {
        let buffer = shared_buffer(Resolution::new(4, 4));
        let payload = Payload::buffer_of(&buffer);
        assert!(payload.refers_to_buffer(&buffer));
        drop(buffer);
        assert!(payload.buffer().is_none());
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_reallocation_keeps_references_live() {
        let buffer = shared_buffer(Resolution::new(4, 4));
        let payload = Payload::buffer_of(&buffer);
        *buffer.borrow_mut() = FrameBuffer::new(Resolution::new(8, 2));
        let seen = payload.buffer().unwrap();
        assert_eq!(seen.borrow().resolution(), Resolution::new(8, 2));
    }

    #[test]
    fn test_copy_from_rescales() {
        let mut source = FrameBuffer::new(Resolution::new(2, 2));
        source.fill([10, 20, 30, 255]);
        let mut target = FrameBuffer::new(Resolution::new(4, 4));
        target.copy_from(&source);
        assert_eq!(target.resolution(), Resolution::new(4, 4));
        assert_eq!(target.pixel(3, 3), [10, 20, 30, 255]);
    }

    #[test]
    fn test_slider_reads_current_value() {
        let value: SharedSlider = Rc::new(Cell::new(0.25));
        let payload = Payload::slider_of(&value);
        value.set(0.75);
        assert_eq!(payload.slider(), Some(0.75));
    }
}
