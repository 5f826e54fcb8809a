// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collections: a parent module owning mutually exclusive child modules.
//!
//! The owner builds its children up front; when the owner is added to a
//! patch, the patch takes the pending children, inserts each one under its
//! own key and binds that key back into the collection. At most one child
//! is active at a time.

use crate::midi::MidiEvent;
use crate::module::{ModuleKey, PatchModule};

/// One slot of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionItem {
    /// Label shown in the owner's list
    pub label: String,
    /// Key of the child once inserted into a patch
    pub key: Option<ModuleKey>,
    /// Learned MIDI note mapping `"channel/pitch"`
    pub trigger: Option<String>,
}

/// Child bookkeeping for a collection-owner module
pub struct Collection {
    name: String,
    items: Vec<CollectionItem>,
    pending: Vec<Box<dyn PatchModule>>,
    active: Option<usize>,
    armed: Option<usize>,
}

impl Collection {
    /// Create an empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            pending: Vec::new(),
            active: None,
            armed: None,
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a child that will be inserted with the owner
    pub fn add_item(&mut self, label: impl Into<String>, module: Box<dyn PatchModule>) {
        self.items.push(CollectionItem {
            label: label.into(),
            key: None,
            trigger: None,
        });
        self.pending.push(module);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Box<dyn PatchModule>> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn bind_child(&mut self, index: usize, key: ModuleKey) {
        if let Some(item) = self.items.get_mut(index) {
            item.key = Some(key);
        }
    }

    pub(crate) fn set_trigger(&mut self, index: usize, trigger: Option<String>) {
        if let Some(item) = self.items.get_mut(index) {
            item.trigger = trigger;
        }
    }

    /// Forget a child that was deleted from the patch
    pub(crate) fn release_child(&mut self, key: &ModuleKey) {
        for (index, item) in self.items.iter_mut().enumerate() {
            if item.key.as_ref() == Some(key) {
                item.key = None;
                if self.active == Some(index) {
                    self.active = None;
                }
            }
        }
    }

    /// All items in order
    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keys of the inserted children, in item order
    pub fn child_keys(&self) -> impl Iterator<Item = &ModuleKey> {
        self.items.iter().filter_map(|item| item.key.as_ref())
    }

    /// Index of the active child
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub(crate) fn set_active(&mut self, index: Option<usize>) {
        self.active = index;
    }

    /// Arm an item to learn the next note-on while mapping mode is on
    pub fn arm(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.armed = Some(index);
            true
        } else {
            false
        }
    }

    /// Currently armed item
    pub fn armed(&self) -> Option<usize> {
        self.armed
    }

    /// React to a note-on. In mapping mode the armed item learns the note;
    /// otherwise returns the item whose trigger matches, to be activated.
    pub fn handle_midi(&mut self, event: &MidiEvent, mapping_mode: bool) -> Option<usize> {
        if !matches!(event, MidiEvent::NoteOn { .. }) {
            return None;
        }
        let mapping = event.mapping();

        if mapping_mode {
            if let Some(index) = self.armed.take() {
                for item in &mut self.items {
                    if item.trigger.as_deref() == Some(mapping.as_str()) {
                        item.trigger = None;
                    }
                }
                self.items[index].trigger = Some(mapping);
            }
            return None;
        }

        self.items
            .iter()
            .position(|item| item.trigger.as_deref() == Some(mapping.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection_with(labels: &[&str]) -> Collection {
        let mut collection = Collection::new("POOL");
        for label in labels {
            collection.items.push(CollectionItem {
                label: label.to_string(),
                key: None,
                trigger: None,
            });
        }
        collection
    }

    fn note(pitch: u8) -> MidiEvent {
        MidiEvent::NoteOn {
            channel: 1,
            pitch,
            velocity: 100,
        }
    }

    #[test]
    fn test_learn_then_trigger() {
        let mut collection = collection_with(&["a", "b"]);
        assert!(collection.arm(1));
        assert_eq!(collection.handle_midi(&note(60), true), None);
        assert_eq!(collection.items()[1].trigger.as_deref(), Some("1/60"));
        assert_eq!(collection.armed(), None);

        assert_eq!(collection.handle_midi(&note(60), false), Some(1));
        assert_eq!(collection.handle_midi(&note(61), false), None);
    }

    #[test]
    fn test_relearn_moves_mapping() {
        let mut collection = collection_with(&["a", "b"]);
        collection.arm(0);
        collection.handle_midi(&note(60), true);
        collection.arm(1);
        collection.handle_midi(&note(60), true);
        assert_eq!(collection.items()[0].trigger, None);
        assert_eq!(collection.handle_midi(&note(60), false), Some(1));
    }

    #[test]
    fn test_arm_out_of_range() {
        let mut collection = collection_with(&["a"]);
        assert!(!collection.arm(3));
    }
}
