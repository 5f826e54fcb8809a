// SPDX-License-Identifier: MIT OR Apache-2.0
//! SCREEN OUTPUT: the frame a host presents on its display.

use nocturne_graph::{
    draw_module_frame, shared_buffer, BufferRef, Canvas, FrameBuffer, ModuleCore, PatchModule, PortKind,
    Pos2, Resolution, SharedBuffer,
};
use std::rc::Rc;

/// Terminal module exposing its input for presentation
pub struct ScreenOutput {
    core: ModuleCore,
    frame: SharedBuffer,
}

impl ScreenOutput {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "SCREEN OUTPUT";

    /// Create a screen output
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            frame: shared_buffer(Resolution::new(1, 1)),
        }
    }
}

impl Default for ScreenOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for ScreenOutput {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        *self.frame.borrow_mut() = FrameBuffer::new(self.core.resolution());
        self.core.declare_input("in", PortKind::Buffer);
    }

    fn update(&mut self) {
        let mut frame = self.frame.borrow_mut();
        match self.core.input_buffer("in") {
            Some(source) => {
                if let Ok(source) = source.try_borrow() {
                    frame.copy_from(&source);
                }
            }
            None => frame.clear(),
        };
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        let rect = self.core.rect();
        canvas.label(
            Pos2::new(rect.left() + 8.0, rect.bottom() - 14.0),
            &self.frame.borrow().resolution().to_string(),
        );
    }

    fn presented(&self) -> Option<BufferRef> {
        Some(Rc::downgrade(&self.frame))
    }
}
