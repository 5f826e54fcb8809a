// SPDX-License-Identifier: MIT OR Apache-2.0
//! PROJECT: holds patch-wide settings and publishes resolution changes.

use nocturne_graph::{draw_module_frame, Canvas, ModuleCore, PatchModule, Pos2, Resolution, ResolutionSource};
use tracing::debug;

const MAX_DIMENSION: f32 = 16384.0;

/// Patch configuration module
pub struct Project {
    core: ModuleCore,
}

impl Project {
    /// Registered type name
    pub const TYPE_NAME: &'static str = nocturne_graph::PROJECT_MODULE;

    /// Create the project module
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(Self::TYPE_NAME),
        }
    }

    /// Ask for a new resolution; applied by the patch on its next update
    pub fn request_resolution(&mut self, width: u32, height: u32) {
        self.core.set_parameter("width", width as f32);
        self.core.set_parameter("height", height as f32);
    }

    fn requested(&self) -> Option<Resolution> {
        let width = self.core.parameter("width")?.round().max(1.0) as u32;
        let height = self.core.parameter("height")?.round().max(1.0) as u32;
        Some(Resolution::new(width, height))
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchModule for Project {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn setup(&mut self) {
        let resolution = self.core.resolution();
        let (width, height) = (resolution.width as f32, resolution.height as f32);
        self.core.declare_parameter("width", width, 1.0, MAX_DIMENSION);
        self.core.declare_parameter("height", height, 1.0, MAX_DIMENSION);
        // follow changes made elsewhere so they are not requested back
        self.core.set_parameter("width", width);
        self.core.set_parameter("height", height);
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        draw_module_frame(self.core(), canvas);
        let rect = self.core.rect();
        canvas.label(
            Pos2::new(rect.left() + 8.0, rect.bottom() - 14.0),
            &self.core.resolution().to_string(),
        );
    }

    fn as_resolution_source(&mut self) -> Option<&mut dyn ResolutionSource> {
        Some(self)
    }
}

impl ResolutionSource for Project {
    fn take_resolution_change(&mut self) -> Option<Resolution> {
        let requested = self.requested()?;
        if requested == self.core.resolution() {
            return None;
        }
        debug!(%requested, "resolution requested");
        Some(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_is_reported_once_applied() {
        let mut project = Project::new();
        project.setup();
        assert_eq!(project.take_resolution_change(), None);

        project.request_resolution(640, 360);
        assert_eq!(project.take_resolution_change(), Some(Resolution::new(640, 360)));
    }

    #[test]
    fn test_dimensions_are_clamped() {
        let mut project = Project::new();
        project.setup();
        project.request_resolution(0, 100_000);
        assert_eq!(
            project.take_resolution_change(),
            Some(Resolution::new(1, 16384))
        );
    }
}
