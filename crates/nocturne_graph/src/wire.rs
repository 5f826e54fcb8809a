// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire (edge) definitions for the patch.

use crate::module::ModuleKey;
use crate::payload::Payload;
use crate::port::PortKind;
use egui::Pos2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireId(pub Uuid);

impl WireId {
    /// Create a new random wire ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WireId {
    fn default() -> Self {
        Self::new()
    }
}

/// A port on a specific module, by index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Owning module
    pub module: ModuleKey,
    /// Port index inside the module's inputs or outputs
    pub port: usize,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(module: ModuleKey, port: usize) -> Self {
        Self { module, port }
    }
}

/// A port on a specific module, by name (stable across sessions)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAddress {
    /// Owning module
    pub module: ModuleKey,
    /// Port name
    pub name: String,
    /// Bank index for multi-buffer inputs
    #[serde(default)]
    pub index: usize,
}

impl PortAddress {
    /// Address a port by name
    pub fn new(module: &ModuleKey, name: impl Into<String>) -> Self {
        Self {
            module: module.clone(),
            name: name.into(),
            index: 0,
        }
    }

    /// Address one slot of a bank
    pub fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// A committed connection between an output and an input
#[derive(Debug, Clone)]
pub struct Wire {
    /// Unique wire ID
    pub id: WireId,
    /// Kind of the output end
    pub kind: PortKind,
    /// Output end
    pub output: Endpoint,
    /// Input end
    pub input: Endpoint,
    payload: Payload,
}

impl Wire {
    /// Check if this wire touches a specific module
    pub fn involves_module(&self, module: &ModuleKey) -> bool {
        self.output.module == *module || self.input.module == *module
    }

    /// Check if this wire ends at a specific input
    pub fn terminates_at(&self, input: &Endpoint) -> bool {
        self.input == *input
    }

    /// Snapshot of the output payload taken when the wire was started
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// A wire being dragged from an output
#[derive(Debug, Clone)]
pub struct PendingWire {
    /// Kind of the output end
    pub kind: PortKind,
    /// Output end
    pub output: Endpoint,
    /// Loose end, canvas space
    pub pointer: Pos2,
    payload: Payload,
}

impl PendingWire {
    /// Start a wire from an output
    pub fn new(kind: PortKind, output: Endpoint, payload: Payload, pointer: Pos2) -> Self {
        Self {
            kind,
            output,
            pointer,
            payload,
        }
    }

    /// Payload carried by the wire
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Bind the input end
    pub(crate) fn into_wire(self, input: Endpoint) -> Wire {
        Wire {
            id: WireId::new(),
            kind: self.kind,
            output: self.output,
            input,
            payload: self.payload,
        }
    }
}

/// Why a pending wire was not committed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Released away from any input
    #[error("No input under the pointer")]
    NoTarget,

    /// Input does not accept the output kind
    #[error("Incompatible port types: {output:?} -> {input:?}")]
    TypeMismatch {
        /// Output kind
        output: PortKind,
        /// Input kind
        input: PortKind,
    },

    /// Output and input on the same module
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Input already terminates a wire
    #[error("Input already connected")]
    InputOccupied,

    /// A module at either end is gone
    #[error("Module not found: {0}")]
    EndpointMissing(ModuleKey),

    /// No port with that name
    #[error("Port not found: {module}.{name}")]
    PortNotFound {
        /// Module searched
        module: ModuleKey,
        /// Port name
        name: String,
    },
}

/// Result of releasing the pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireOutcome {
    /// No wire was being dragged
    Idle,
    /// The wire was added to the patch
    Committed(WireId),
    /// The wire was discarded without touching any module
    Cancelled(WireError),
}
