// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hardware MIDI through midir.
//!
//! Outbound control changes go straight to an output connection. Inbound
//! bytes arrive on midir's callback thread, are parsed there and queued on
//! a channel the session drains once per frame.

use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use nocturne_graph::{ControlChange, MidiEvent, MidiSink, MidiSinkError};
use std::sync::mpsc::{self, Receiver};
use thiserror::Error;
use tracing::{debug, info};

const CLIENT_NAME: &str = "Nocturne";

/// MIDI device errors
#[derive(Debug, Error)]
pub enum MidiIoError {
    /// MIDI subsystem unavailable
    #[error("MIDI init error: {0}")]
    Init(String),

    /// No port name contains the requested text
    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    /// Port found but could not be opened
    #[error("MIDI connection error: {0}")]
    Connect(String),
}

/// Outbound transport backed by a midir output connection
pub struct MidirSink {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirSink {
    /// Open the first output port whose name contains `wanted`
    pub fn connect(wanted: &str) -> Result<Self, MidiIoError> {
        let output = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiIoError::Init(e.to_string()))?;
        let (port, port_name) = output
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = output.port_name(&port).ok()?;
                name.contains(wanted).then_some((port, name))
            })
            .ok_or_else(|| MidiIoError::PortNotFound(wanted.to_string()))?;

        let connection = output
            .connect(&port, "nocturne-out")
            .map_err(|e| MidiIoError::Connect(e.to_string()))?;
        info!(port = %port_name, "MIDI output connected");
        Ok(Self { connection, port_name })
    }

    /// Name of the connected port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiSink for MidirSink {
    fn send_control_change(&mut self, message: ControlChange) -> Result<(), MidiSinkError> {
        self.connection
            .send(&message.to_bytes())
            .map_err(|e| MidiSinkError(e.to_string()))
    }
}

/// Inbound events from a midir input connection
pub struct MidirSource {
    _connection: MidiInputConnection<()>,
    events: Receiver<MidiEvent>,
}

impl MidirSource {
    /// Open the first input port whose name contains `wanted`
    pub fn connect(wanted: &str) -> Result<Self, MidiIoError> {
        let input = MidiInput::new(CLIENT_NAME).map_err(|e| MidiIoError::Init(e.to_string()))?;
        let (port, port_name) = input
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = input.port_name(&port).ok()?;
                name.contains(wanted).then_some((port, name))
            })
            .ok_or_else(|| MidiIoError::PortNotFound(wanted.to_string()))?;

        let (sender, events) = mpsc::channel();
        let connection = input
            .connect(
                &port,
                "nocturne-in",
                move |_timestamp, data, _| {
                    if let Some(event) = MidiEvent::from_bytes(data) {
                        // receiver gone means the session is shutting down
                        let _ = sender.send(event);
                    }
                },
                (),
            )
            .map_err(|e| MidiIoError::Connect(e.to_string()))?;
        info!(port = %port_name, "MIDI input connected");
        Ok(Self {
            _connection: connection,
            events,
        })
    }

    /// Events received since the last call
    pub fn drain(&self) -> Vec<MidiEvent> {
        let events: Vec<MidiEvent> = self.events.try_iter().collect();
        if !events.is_empty() {
            debug!(count = events.len(), "MIDI events received");
        }
        events
    }
}

/// Names of every MIDI output port
pub fn output_port_names() -> Result<Vec<String>, MidiIoError> {
    let output = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiIoError::Init(e.to_string()))?;
    Ok(output
        .ports()
        .iter()
        .filter_map(|port| output.port_name(port).ok())
        .collect())
}
