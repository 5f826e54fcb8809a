// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serializable patch state.
//!
//! A snapshot records modules by type, id and parameters and wires by port
//! name, so it survives port reordering between builds. Collection children
//! are recorded with their owner and item index and re-bound by that index
//! on restore.

use crate::canvas::Viewport;
use crate::module::{ModuleId, ModuleKey};
use crate::patch::{Patch, PatchConfig};
use crate::payload::Resolution;
use crate::port::{PortDirection, PortKind};
use crate::registry::ModuleRegistry;
use crate::wire::PortAddress;
use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Recorded parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    /// Parameter name
    pub name: String,
    /// Value at save time
    pub value: f32,
    /// Lower bound
    pub min: f32,
    /// Upper bound
    pub max: f32,
}

/// Recorded module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Key at save time
    pub key: ModuleKey,
    /// Registered type name
    pub type_name: String,
    /// Id at save time
    pub id: ModuleId,
    /// Canvas position
    pub position: [f32; 2],
    /// Enabled flag
    pub enabled: bool,
    /// Owning collection, for children
    #[serde(default)]
    pub parent: Option<ModuleKey>,
    /// Item index within the owning collection, for children
    #[serde(default)]
    pub item: Option<usize>,
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
    /// Learned note triggers, for collection owners
    #[serde(default)]
    pub triggers: Vec<Option<String>>,
}

/// Recorded wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Kind of the output end
    pub kind: PortKind,
    /// Output port
    pub output: PortAddress,
    /// Input port
    pub input: PortAddress,
}

/// Everything needed to rebuild a patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSnapshot {
    /// Target resolution
    pub resolution: Resolution,
    /// Canvas pan
    pub translation: [f32; 2],
    /// Canvas zoom
    pub zoom: f32,
    /// Modules in mapping order
    pub modules: Vec<ModuleRecord>,
    /// Wires in creation order
    pub wires: Vec<WireRecord>,
}

impl Patch {
    /// Record the current modules, wires and view
    pub fn snapshot(&self) -> PatchSnapshot {
        let mut parents = HashMap::new();
        for (key, module) in &self.modules {
            if let Some(collection) = module.as_collection() {
                for (index, item) in collection.items().iter().enumerate() {
                    if let Some(child) = &item.key {
                        parents.insert(child.clone(), (key.clone(), index));
                    }
                }
            }
        }

        let modules = self
            .modules
            .iter()
            .map(|(key, module)| {
                let core = module.core();
                let parent = parents.get(key);
                ModuleRecord {
                    key: key.clone(),
                    type_name: core.type_name().to_string(),
                    id: core.id(),
                    position: [core.position().x, core.position().y],
                    enabled: core.enabled(),
                    parent: parent.map(|(owner, _)| owner.clone()),
                    item: parent.map(|(_, index)| *index),
                    parameters: core
                        .parameters()
                        .map(|(name, p)| ParameterRecord {
                            name: name.to_string(),
                            value: p.value,
                            min: p.min,
                            max: p.max,
                        })
                        .collect(),
                    triggers: module
                        .as_collection()
                        .map(|c| c.items().iter().map(|item| item.trigger.clone()).collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        let wires = self
            .wires
            .iter()
            .filter_map(|wire| {
                Some(WireRecord {
                    kind: wire.kind,
                    output: self.port_address(&wire.output, PortDirection::Output)?,
                    input: self.port_address(&wire.input, PortDirection::Input)?,
                })
            })
            .collect();

        PatchSnapshot {
            resolution: self.resolution,
            translation: [self.viewport.translation.x, self.viewport.translation.y],
            zoom: self.viewport.zoom,
            modules,
            wires,
        }
    }

    /// Rebuild a patch from a snapshot.
    ///
    /// Unknown module types and wires that no longer validate are skipped
    /// with a warning. New ids continue above every recorded id.
    pub fn restore(registry: ModuleRegistry, config: PatchConfig, snapshot: &PatchSnapshot) -> Self {
        let config = PatchConfig {
            resolution: snapshot.resolution,
            ..config
        };
        let mut patch = Self::empty(registry, config);
        patch.viewport = Viewport {
            translation: Vec2::from(snapshot.translation),
            zoom: snapshot.zoom.max(config.min_zoom),
        };
        patch.next_id = snapshot
            .modules
            .iter()
            .map(|record| record.id.0 + 1)
            .max()
            .unwrap_or(1);

        let mut remap: HashMap<ModuleKey, ModuleKey> = HashMap::new();
        for record in snapshot.modules.iter().filter(|r| r.parent.is_none()) {
            let module = match patch.registry.create(&record.type_name) {
                Ok(module) => module,
                Err(err) => {
                    warn!(module = %record.key, %err, "recorded module skipped");
                    continue;
                }
            };
            let id = if patch.id_in_use(record.id) {
                patch.next_module_id()
            } else {
                record.id
            };
            let recorded: Vec<(usize, &ModuleRecord)> = snapshot
                .modules
                .iter()
                .filter(|r| r.parent.as_ref() == Some(&record.key))
                .enumerate()
                .map(|(position, r)| (r.item.unwrap_or(position), r))
                .collect();

            // children were allocated right after their owner; reuse that run
            let resume = patch.next_id;
            if let Some(first) = child_id_run(&recorded) {
                patch.next_id = first;
            }
            let key = patch.insert_module(module, id, Pos2::from(record.position), false);
            patch.next_id = patch.next_id.max(resume);
            remap.insert(record.key.clone(), key.clone());

            let children: Vec<(usize, ModuleKey)> = patch
                .modules
                .get(&key)
                .and_then(|module| module.as_collection())
                .map(|c| {
                    c.items()
                        .iter()
                        .enumerate()
                        .filter_map(|(index, item)| Some((index, item.key.clone()?)))
                        .collect()
                })
                .unwrap_or_default();
            for (index, child) in children {
                match recorded.iter().find(|(item, _)| *item == index) {
                    Some((_, child_record)) => {
                        remap.insert(child_record.key.clone(), child);
                    }
                    None => {
                        // item was deleted before the snapshot was taken
                        if let Err(err) = patch.delete_module(&child) {
                            warn!(module = %child, %err, "unrecorded child not removed");
                        }
                    }
                }
            }
        }

        for record in &snapshot.modules {
            match remap.get(&record.key) {
                Some(key) => patch.apply_record(key, record),
                None => warn!(module = %record.key, "recorded module has no counterpart"),
            }
        }
        patch.sync_active_children();

        for wire in &snapshot.wires {
            let (Some(from), Some(to)) = (remap.get(&wire.output.module), remap.get(&wire.input.module)) else {
                warn!(from = %wire.output.module, to = %wire.input.module, "recorded wire skipped");
                continue;
            };
            let output = PortAddress {
                module: from.clone(),
                ..wire.output.clone()
            };
            let input = PortAddress {
                module: to.clone(),
                ..wire.input.clone()
            };
            if let Err(err) = patch.connect(&output, &input) {
                warn!(%err, "recorded wire skipped");
            }
        }

        info!(
            modules = patch.module_count(),
            wires = patch.wire_count(),
            "patch restored"
        );
        patch
    }

    fn apply_record(&mut self, key: &ModuleKey, record: &ModuleRecord) {
        let Some(module) = self.modules.get_mut(key) else {
            return;
        };
        let core = module.core_mut();
        core.set_position(Pos2::from(record.position));
        core.set_enabled(record.enabled);
        for parameter in &record.parameters {
            if !core.set_parameter(&parameter.name, parameter.value) {
                core.declare_parameter(&parameter.name, parameter.value, parameter.min, parameter.max);
            }
        }
        if let Some(collection) = module.as_collection_mut() {
            for (index, trigger) in record.triggers.iter().enumerate() {
                collection.set_trigger(index, trigger.clone());
            }
        }
    }

    /// Point every collection at its enabled child
    fn sync_active_children(&mut self) {
        let owners: Vec<(ModuleKey, Option<usize>)> = self
            .modules
            .iter()
            .filter_map(|(key, module)| {
                let collection = module.as_collection()?;
                let active = collection
                    .items()
                    .iter()
                    .position(|item| item.key.as_ref().is_some_and(|k| self.is_enabled(k)));
                Some((key.clone(), active))
            })
            .collect();
        for (key, active) in owners {
            if let Some(collection) = self.collection_mut(&key) {
                collection.set_active(active);
            }
        }
    }
}

/// Id of item 0 when every recorded child sits at `first + item`
fn child_id_run(records: &[(usize, &ModuleRecord)]) -> Option<u64> {
    let (item, record) = records.first()?;
    let first = record.id.0.checked_sub(*item as u64).filter(|first| *first > 0)?;
    records
        .iter()
        .all(|(item, record)| record.id.0 == first + *item as u64)
        .then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::probe_registry;

    fn config() -> PatchConfig {
        PatchConfig {
            resolution: Resolution::new(8, 8),
            ..PatchConfig::default()
        }
    }

    fn build() -> Patch {
        let (registry, _) = probe_registry();
        let mut patch = Patch::new(registry, config());
        let source = patch.add_module("SOURCE").unwrap();
        let sink = patch.add_module("SINK").unwrap();
        let bank = patch.add_module("BANK").unwrap();
        let dial = patch.add_module("DIAL").unwrap();
        patch.add_module("POOL").unwrap();
        patch
            .connect(&PortAddress::new(&source, "out"), &PortAddress::new(&sink, "in2"))
            .unwrap();
        patch
            .connect(&PortAddress::new(&sink, "out"), &PortAddress::new(&bank, "layer").at(1))
            .unwrap();
        patch.set_parameter(&dial, "gain", 7.5).unwrap();
        patch.set_translation(Vec2::new(12.0, -4.0));
        patch
    }

    #[test]
    fn test_snapshot_records_wires_by_name() {
        let snapshot = build().snapshot();
        assert_eq!(snapshot.modules.len(), 7);
        assert_eq!(snapshot.wires.len(), 2);
        assert_eq!(snapshot.wires[0].input.name, "in2");
        assert_eq!(snapshot.wires[1].input.index, 1);
        let children: Vec<&ModuleRecord> = snapshot
            .modules
            .iter()
            .filter(|r| r.parent.is_some())
            .collect();
        assert_eq!(children.len(), 2);
        assert!(children[0].enabled);
        assert!(!children[1].enabled);
    }

    #[test]
    fn test_restore_rebuilds_patch() {
        let original = build();
        let snapshot = original.snapshot();
        let (registry, _) = probe_registry();
        let mut restored = Patch::restore(registry, config(), &snapshot);

        assert_eq!(restored.module_count(), 7);
        assert_eq!(restored.wire_count(), 2);
        assert_eq!(restored.viewport().translation, Vec2::new(12.0, -4.0));
        let dial = ModuleKey::from("DIAL@4");
        assert_eq!(restored.module(&dial).unwrap().core().parameter("gain"), Some(7.5));

        let bank = restored.module(&ModuleKey::from("BANK@3")).unwrap().core();
        assert!(bank.input(1).unwrap().is_connected());
        assert!(!bank.input(0).unwrap().is_connected());

        let pool = restored
            .module(&ModuleKey::from("POOL@5"))
            .unwrap()
            .as_collection()
            .unwrap();
        assert_eq!(pool.active(), Some(0));

        let next = restored.add_module("SOURCE").unwrap();
        assert_eq!(next.as_str(), "SOURCE@8");
        assert_eq!(restored.snapshot().wires, snapshot.wires);
    }

    #[test]
    fn test_restore_binds_children_by_item() {
        let mut original = build();
        let first = ModuleKey::from("SOURCE@6");
        let second = ModuleKey::from("SOURCE@7");
        original.delete_module(&first).unwrap();
        let snapshot = original.snapshot();
        let record = snapshot.modules.iter().find(|r| r.key == second).unwrap();
        assert_eq!(record.item, Some(1));

        let (registry, _) = probe_registry();
        let restored = Patch::restore(registry, config(), &snapshot);
        assert_eq!(restored.module_count(), 6);
        assert!(!restored.contains_module(&first));
        assert!(!restored.is_enabled(&second));

        let pool = restored
            .module(&ModuleKey::from("POOL@5"))
            .unwrap()
            .as_collection()
            .unwrap();
        assert_eq!(pool.items()[0].key, None);
        assert_eq!(pool.items()[1].key.as_ref(), Some(&second));
        assert_eq!(pool.active(), None);
    }

    #[test]
    fn test_restore_skips_unknown_types() {
        let mut snapshot = build().snapshot();
        snapshot.modules[0].type_name = "VANISHED".to_string();
        let (registry, _) = probe_registry();
        let restored = Patch::restore(registry, config(), &snapshot);
        assert_eq!(restored.module_count(), 6);
        assert_eq!(restored.wire_count(), 1);
    }

    #[test]
    fn test_snapshot_ron_format() {
        let snapshot = build().snapshot();
        let text = ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::default()).unwrap();
        assert!(text.contains("\"SINK@2\""));
        let parsed: PatchSnapshot = ron::from_str(&text).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
