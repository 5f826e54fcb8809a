// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module catalog for the Nocturne patch editor.
//!
//! Every module here implements [`nocturne_graph::PatchModule`] and renders
//! on the CPU into producer-owned frames. [`default_registry`] registers
//! the whole catalog under the type names shown in the module browser.

pub mod blend;
pub mod light;
pub mod midi_control;
pub mod mixer;
pub mod project;
pub mod screen;
pub mod shader;
pub mod sketch_pool;

#[cfg(test)]
mod test_support;

pub use blend::{composite, BlendMode};
pub use light::Light;
pub use midi_control::{MidiControlIn, MidiControlOut};
pub use mixer::{LayerMixer, Mixer, LAYER_SLOTS};
pub use project::Project;
pub use screen::ScreenOutput;
pub use shader::Shader;
pub use sketch_pool::SketchPool;

use nocturne_graph::ModuleRegistry;

/// Registry holding every module in the catalog
pub fn default_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(Project::TYPE_NAME, || Box::new(Project::new()));
    registry.register(Shader::TYPE_NAME, || Box::new(Shader::new()));
    registry.register(Mixer::TYPE_NAME, || Box::new(Mixer::new()));
    registry.register(LayerMixer::TYPE_NAME, || Box::new(LayerMixer::new()));
    registry.register(Light::TYPE_NAME, || Box::new(Light::new()));
    registry.register(MidiControlIn::TYPE_NAME, || Box::new(MidiControlIn::new()));
    registry.register(MidiControlOut::TYPE_NAME, || Box::new(MidiControlOut::new()));
    registry.register(ScreenOutput::TYPE_NAME, || Box::new(ScreenOutput::new()));
    registry.register(SketchPool::TYPE_NAME, || Box::new(SketchPool::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        colored_shader, connect, frame_of, input_center, output_center, patch, place, RecordingSink,
    };
    use nocturne_graph::{
        ControlChange, DrawList, MidiEvent, ModuleKey, Patch, PatchConfig, PortKind, Pos2, Resolution,
        WireError, WireOutcome,
    };

    fn cc(channel: u8, control: u8, value: u8) -> MidiEvent {
        MidiEvent::ControlChange(ControlChange::new(channel, control, value))
    }

    fn drag_wire(patch: &mut Patch, from: Pos2, to: Pos2) -> WireOutcome {
        assert!(patch.begin_wire_at(from));
        patch.move_wire_to(to);
        patch.end_wire_at(to)
    }

    #[test]
    fn test_catalog_is_registered() {
        let registry = default_registry();
        assert_eq!(registry.len(), 9);
        for name in ["PROJECT", "SHADER", "MIXER", "LAYER MIXER", "SCREEN OUTPUT", "SKETCH POOL"] {
            assert!(registry.contains(name), "{name} missing");
        }

        let patch = patch();
        assert!(patch.contains_module(&ModuleKey::from("PROJECT@1")));
    }

    #[test]
    fn test_deleting_producer_clears_mixer_input() {
        let mut patch = patch();
        let shader = patch.add_module(Shader::TYPE_NAME).unwrap();
        let mixer = patch.add_module(Mixer::TYPE_NAME).unwrap();
        assert_eq!(shader.as_str(), "SHADER@2");
        assert_eq!(mixer.as_str(), "MIXER@3");

        connect(&mut patch, &shader, "out", &mixer, "fbo1");
        patch.update();
        assert_eq!(patch.wire_count(), 1);
        {
            let core = patch.module(&mixer).unwrap().core();
            let fbo1 = core.input_index("fbo1", 0).unwrap();
            let bound = core.input(fbo1).unwrap().payload();
            assert!(bound.refers_to_buffer(&frame_of(&patch, &shader)));
        }

        assert_eq!(patch.delete_module(&shader).unwrap(), 1);
        assert_eq!(patch.wire_count(), 0);
        let core = patch.module(&mixer).unwrap().core();
        let fbo1 = core.input_index("fbo1", 0).unwrap();
        assert!(!core.input(fbo1).unwrap().is_connected());

        patch.update();
        assert_eq!(frame_of(&patch, &mixer).borrow().pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_light_into_texture_is_cancelled() {
        let mut patch = patch();
        let light = patch.add_module(Light::TYPE_NAME).unwrap();
        let shader = patch.add_module(Shader::TYPE_NAME).unwrap();
        place(&mut patch, &light, 400.0, 0.0);
        place(&mut patch, &shader, 800.0, 0.0);

        let from = output_center(&patch, &light, "out");
        let to = input_center(&patch, &shader, "texture", 0);
        let outcome = drag_wire(&mut patch, from, to);
        assert_eq!(
            outcome,
            WireOutcome::Cancelled(WireError::TypeMismatch {
                output: PortKind::Light,
                input: PortKind::Buffer,
            })
        );
        assert_eq!(patch.wire_count(), 0);
        assert!(patch.pending_wire().is_none());

        let to = input_center(&patch, &shader, "light", 0);
        let outcome = drag_wire(&mut patch, from, to);
        assert!(matches!(outcome, WireOutcome::Committed(_)));
    }

    #[test]
    fn test_layer_bank_slots_and_detach() {
        let mut patch = patch();
        let red = colored_shader(&mut patch, [1.0, 0.0, 0.0, 1.0]);
        let blue = colored_shader(&mut patch, [0.0, 0.0, 1.0, 1.0]);
        let layers = patch.add_module(LayerMixer::TYPE_NAME).unwrap();
        place(&mut patch, &red, 400.0, 0.0);
        place(&mut patch, &blue, 400.0, 300.0);
        place(&mut patch, &layers, 800.0, 0.0);

        for (source, slot) in [(&red, 0), (&blue, 1)] {
            let from = output_center(&patch, source, "out");
            let to = input_center(&patch, &layers, "layer", slot);
            assert!(matches!(drag_wire(&mut patch, from, to), WireOutcome::Committed(_)));
        }
        assert_eq!(patch.wire_count(), 2);

        // grabbing a connected slot lifts its wire off
        assert!(patch.begin_wire_at(input_center(&patch, &layers, "layer", 0)));
        assert_eq!(patch.pending_wire().unwrap().output.module, red);
        assert_eq!(
            patch.end_wire_at(Pos2::new(2000.0, 2000.0)),
            WireOutcome::Cancelled(WireError::NoTarget)
        );

        assert_eq!(patch.wire_count(), 1);
        let core = patch.module(&layers).unwrap().core();
        let slot0 = core.input_index("layer", 0).unwrap();
        let slot1 = core.input_index("layer", 1).unwrap();
        assert!(!core.input(slot0).unwrap().is_connected());
        assert!(core.input(slot1).unwrap().is_connected());

        patch.update();
        assert_eq!(frame_of(&patch, &layers).borrow().pixel(0, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn test_project_width_broadcasts_resolution() {
        let mut patch = patch();
        let shader = colored_shader(&mut patch, [0.0, 1.0, 0.0, 1.0]);
        let screen = patch.add_module(ScreenOutput::TYPE_NAME).unwrap();
        connect(&mut patch, &shader, "out", &screen, "in");
        patch.update();

        let project = ModuleKey::from("PROJECT@1");
        patch.set_parameter(&project, "width", 8.0).unwrap();
        patch.update();
        assert_eq!(patch.resolution(), Resolution::new(8, 4));
        assert_eq!(frame_of(&patch, &shader).borrow().resolution(), Resolution::new(8, 4));

        patch.update();
        let frame = patch.presented_frames()[0].1.upgrade().unwrap();
        assert_eq!(frame.borrow().resolution(), Resolution::new(8, 4));
        assert_eq!(frame.borrow().pixel(7, 3), [0, 255, 0, 255]);
    }

    #[test]
    fn test_red_and_blue_add_to_screen() {
        let mut patch = patch();
        let red = colored_shader(&mut patch, [1.0, 0.0, 0.0, 1.0]);
        let blue = colored_shader(&mut patch, [0.0, 0.0, 1.0, 1.0]);
        let mixer = patch.add_module(Mixer::TYPE_NAME).unwrap();
        let screen = patch.add_module(ScreenOutput::TYPE_NAME).unwrap();
        connect(&mut patch, &red, "out", &mixer, "fbo1");
        connect(&mut patch, &blue, "out", &mixer, "fbo2");
        connect(&mut patch, &mixer, "out", &screen, "in");
        patch
            .set_parameter(&mixer, "blend", BlendMode::Add.as_parameter())
            .unwrap();

        patch.update();
        let (key, frame) = patch.presented_frames().remove(0);
        assert_eq!(key, screen);
        assert_eq!(frame.upgrade().unwrap().borrow().pixel(2, 2), [255, 0, 255, 255]);

        let mut list = DrawList::new();
        patch.draw(&mut list);
        assert_eq!(list.wire_count(), 3);
    }

    #[test]
    fn test_midi_in_drives_midi_out() {
        let mut patch = patch();
        let input = patch.add_module(MidiControlIn::TYPE_NAME).unwrap();
        let output = patch.add_module(MidiControlOut::TYPE_NAME).unwrap();
        connect(&mut patch, &input, "value", &output, "value");
        patch.set_parameter(&output, "channel", 2.0).unwrap();
        patch.set_parameter(&output, "control", 20.0).unwrap();
        let sink = RecordingSink::default();
        patch.set_midi_sink(Box::new(sink.clone()));

        patch.toggle_mapping_mode();
        patch.receive_midi(&cc(1, 7, 10));
        patch.toggle_mapping_mode();
        patch.update();

        patch.receive_midi(&cc(1, 8, 127));
        patch.update();
        patch.receive_midi(&cc(1, 7, 127));
        patch.update();

        assert_eq!(
            *sink.0.borrow(),
            vec![ControlChange::new(2, 20, 0), ControlChange::new(2, 20, 127)]
        );
    }

    #[test]
    fn test_chained_inputs_share_events() {
        let mut patch = patch();
        let first = patch.add_module(MidiControlIn::TYPE_NAME).unwrap();
        let second = patch.add_module(MidiControlIn::TYPE_NAME).unwrap();
        connect(&mut patch, &first, "chain", &second, "chain in");

        patch.toggle_mapping_mode();
        patch.receive_midi(&cc(5, 1, 0));
        patch.toggle_mapping_mode();
        patch.receive_midi(&cc(5, 1, 127));

        for key in [&first, &second] {
            let value = patch.module(key).unwrap().output_payload(0).slider();
            assert_eq!(value, Some(1.0));
        }
    }

    #[test]
    fn test_sketch_pool_note_triggers() {
        let mut patch = patch();
        let pool = patch.add_module(SketchPool::TYPE_NAME).unwrap();
        assert_eq!(patch.module_count(), 5);
        let children: Vec<ModuleKey> = (3..=5)
            .map(|id| ModuleKey::from(format!("SHADER@{id}").as_str()))
            .collect();
        assert!(patch.module(&children[0]).unwrap().core().enabled());
        assert!(!patch.module(&children[2]).unwrap().core().enabled());

        let armed = patch
            .module_mut(&pool)
            .and_then(|module| module.as_collection_mut())
            .map(|collection| collection.arm(2));
        assert_eq!(armed, Some(true));

        let note = MidiEvent::NoteOn {
            channel: 1,
            pitch: 60,
            velocity: 100,
        };
        patch.toggle_mapping_mode();
        patch.receive_midi(&note);
        patch.toggle_mapping_mode();
        patch.receive_midi(&note);

        let collection = patch.module(&pool).unwrap().as_collection().unwrap();
        assert_eq!(collection.active(), Some(2));
        assert_eq!(collection.items()[2].trigger.as_deref(), Some("1/60"));
        assert!(!patch.module(&children[0]).unwrap().core().enabled());
        assert!(patch.module(&children[2]).unwrap().core().enabled());

        patch.delete_module(&pool).unwrap();
        assert_eq!(patch.module_count(), 1);
    }

    #[test]
    fn test_sketch_pool_restore_keeps_deleted_child_gone() {
        let mut patch = patch();
        let pool = patch.add_module(SketchPool::TYPE_NAME).unwrap();
        let ember = ModuleKey::from("SHADER@3");
        let tide = ModuleKey::from("SHADER@4");
        let moss = ModuleKey::from("SHADER@5");
        patch.set_parameter(&moss, "green", 0.0).unwrap();
        patch.delete_module(&tide).unwrap();
        assert_eq!(patch.module_count(), 4);

        let snapshot = patch.snapshot();
        let config = PatchConfig {
            resolution: Resolution::new(4, 4),
            ..PatchConfig::default()
        };
        let restored = Patch::restore(default_registry(), config, &snapshot);

        assert_eq!(restored.module_count(), 4);
        assert!(!restored.contains_module(&tide));
        let green = |key: &ModuleKey| restored.module(key).unwrap().core().parameter("green");
        assert_eq!(green(&ember), Some(0.35));
        assert_eq!(green(&moss), Some(0.0));

        let items = restored.module(&pool).unwrap().as_collection().unwrap().items();
        assert_eq!(items[0].key.as_ref(), Some(&ember));
        assert_eq!(items[1].key, None);
        assert_eq!(items[2].key.as_ref(), Some(&moss));
    }
}
