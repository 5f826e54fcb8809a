// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-pixel blend modes used by the mixers.

use image::Rgba;
use nocturne_graph::FrameBuffer;

/// How a layer is combined with what is already in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Layer replaces the target
    #[default]
    Disabled,
    /// Layer is composited over the target by its alpha
    Alpha,
    /// Colours are added
    Add,
    /// Layer is subtracted from the target
    Subtract,
    /// Colours are multiplied
    Multiply,
    /// Inverse of multiplying the inverses
    Screen,
}

impl BlendMode {
    /// All modes in parameter order
    pub const ALL: [BlendMode; 6] = [
        BlendMode::Disabled,
        BlendMode::Alpha,
        BlendMode::Add,
        BlendMode::Subtract,
        BlendMode::Multiply,
        BlendMode::Screen,
    ];

    /// Mode for a parameter value, rounded and clamped into range
    pub fn from_parameter(value: f32) -> Self {
        let index = value.round().clamp(0.0, (Self::ALL.len() - 1) as f32) as usize;
        Self::ALL[index]
    }

    /// Parameter value selecting this mode
    pub fn as_parameter(self) -> f32 {
        Self::ALL.iter().position(|mode| *mode == self).unwrap_or(0) as f32
    }

    /// Display name
    pub fn label(self) -> &'static str {
        match self {
            BlendMode::Disabled => "DISABLED",
            BlendMode::Alpha => "ALPHA",
            BlendMode::Add => "ADD",
            BlendMode::Subtract => "SUBTRACT",
            BlendMode::Multiply => "MULTIPLY",
            BlendMode::Screen => "SCREEN",
        }
    }

    /// Blend one source pixel onto one destination pixel
    pub fn blend(self, dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
        let alpha = u16::from(src[3]);
        let mut out = dst;
        for c in 0..3 {
            let d = u16::from(dst[c]);
            let s = u16::from(src[c]);
            out[c] = match self {
                BlendMode::Disabled => src[c],
                BlendMode::Alpha => ((s * alpha + d * (255 - alpha) + 127) / 255) as u8,
                BlendMode::Add => (d + s * alpha / 255).min(255) as u8,
                BlendMode::Subtract => d.saturating_sub(s * alpha / 255) as u8,
                BlendMode::Multiply => ((d * s + 127) / 255) as u8,
                BlendMode::Screen => (255 - ((255 - d) * (255 - s) + 127) / 255) as u8,
            };
        }
        out[3] = match self {
            BlendMode::Disabled => src[3],
            BlendMode::Alpha => (alpha + u16::from(dst[3]) * (255 - alpha) / 255) as u8,
            _ => dst[3].max(src[3]),
        };
        out
    }
}

/// Blend `layer` onto `target`, rescaling the layer if sizes differ
pub fn composite(target: &mut FrameBuffer, layer: &FrameBuffer, mode: BlendMode) {
    if layer.resolution() != target.resolution() {
        let mut scaled = FrameBuffer::new(target.resolution());
        scaled.copy_from(layer);
        composite(target, &scaled, mode);
        return;
    }
    if mode == BlendMode::Disabled {
        target.copy_from(layer);
        return;
    }
    for (dst, src) in target.image_mut().pixels_mut().zip(layer.image().pixels()) {
        *dst = Rgba(mode.blend(dst.0, src.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nocturne_graph::Resolution;

    #[test]
    fn test_parameter_mapping() {
        assert_eq!(BlendMode::from_parameter(2.4), BlendMode::Add);
        assert_eq!(BlendMode::from_parameter(-3.0), BlendMode::Disabled);
        assert_eq!(BlendMode::from_parameter(99.0), BlendMode::Screen);
        assert_eq!(BlendMode::Multiply.as_parameter(), 4.0);
    }

    #[test]
    fn test_blend_modes() {
        let dst = [200, 100, 0, 255];
        let src = [100, 200, 255, 255];
        assert_eq!(BlendMode::Disabled.blend(dst, src), src);
        assert_eq!(BlendMode::Alpha.blend(dst, src), src);
        assert_eq!(BlendMode::Add.blend(dst, src), [255, 255, 255, 255]);
        assert_eq!(BlendMode::Subtract.blend(dst, src), [100, 0, 0, 255]);
        assert_eq!(BlendMode::Multiply.blend(dst, [255, 0, 128, 255]), [200, 0, 0, 255]);
        assert_eq!(BlendMode::Screen.blend([0, 255, 0, 255], [0, 0, 255, 255]), [0, 255, 255, 255]);
    }

    #[test]
    fn test_transparent_layer_keeps_target() {
        let dst = [10, 20, 30, 255];
        let clear = [250, 250, 250, 0];
        assert_eq!(BlendMode::Alpha.blend(dst, clear), dst);
        assert_eq!(BlendMode::Add.blend(dst, clear), dst);
    }

    #[test]
    fn test_composite_rescales() {
        let mut target = FrameBuffer::new(Resolution::new(4, 4));
        target.fill([0, 0, 255, 255]);
        let mut layer = FrameBuffer::new(Resolution::new(2, 2));
        layer.fill([255, 0, 0, 255]);
        composite(&mut target, &layer, BlendMode::Add);
        assert_eq!(target.pixel(3, 3), [255, 0, 255, 255]);
    }
}
