// SPDX-License-Identifier: MIT OR Apache-2.0
//! SKETCH POOL: a collection of shader sketches, one playing at a time.

use crate::shader::Shader;
use nocturne_graph::{draw_module_frame, Canvas, Collection, ModuleCore, PatchModule, Pos2};

const SKETCHES: [(&str, [f32; 4]); 3] = [
    ("ember", [1.0, 0.35, 0.1, 1.0]),
    ("tide", [0.1, 0.4, 1.0, 1.0]),
    ("moss", [0.3, 0.8, 0.25, 1.0]),
];

/// Collection owner switching between shader sketches
pub struct SketchPool {
    core: ModuleCore,
    collection: Collection,
}

impl SketchPool {
    /// Registered type name
    pub const TYPE_NAME: &'static str = "SKETCH POOL";

    /// Create the pool with its sketches
    pub fn new() -> Self {
        let mut collection = Collection::new("sketches");
        for (label, color) in SKETCHES {
            collection.add_item(label, Box::new(Shader::with_color(color)));
        }
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
            collection,
        }
    }
}

impl Default for SketchPool {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for SketchPool {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {}

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        let rect = self.core.rect();
        for (row, item) in self.collection.items().iter().enumerate() {
            let marker = if self.collection.active() == Some(row) { ">" } else { " " };
            let trigger = item.trigger.as_deref().unwrap_or("-");
            canvas.label(
                Pos2::new(rect.left() + 8.0, rect.top() + 28.0 + row as f32 * 14.0),
                &format!("{marker} {} [{trigger}]", item.label),
            );
        }
    }

    fn as_collection(&self) -> Option<&Collection> {
        Some(&self.collection)
    }

    fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        Some(&mut self.collection)
    }
}
