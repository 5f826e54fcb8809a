// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nocturne - headless patch session runner
//!
//! Loads session settings, builds or restores a patch from the module
//! catalog, runs its frame loop with optional hardware MIDI, then writes
//! the preset and the final presented frame.
//!
//! Usage: `nocturne [settings.ron]`

mod midi_io;
mod session;
mod settings;

use session::Session;
use settings::{SessionSettings, DEFAULT_SETTINGS_FILE};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["nocturne_app=debug", "nocturne_graph=info", "nocturne_modules=info"] {
        match directive.parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(err) => eprintln!("invalid log directive {directive}: {err}"),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run() -> session::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE), PathBuf::from);
    let settings = SessionSettings::load_or_default(&path)?;
    if !path.exists() {
        match settings.save(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "default settings written"),
            Err(err) => tracing::warn!(%err, "could not write default settings"),
        }
    }
    tracing::debug!(?settings, "settings loaded");

    match midi_io::output_port_names() {
        Ok(names) => tracing::debug!(?names, "MIDI output ports"),
        Err(err) => tracing::debug!(%err, "MIDI output ports unavailable"),
    }

    let mut session = Session::new(settings)?;
    let list = session.run();
    tracing::info!(
        frames = session.frames_run(),
        wires = session.patch().wire_count(),
        modules = ?list.module_titles(),
        "session finished"
    );
    session.finish()
}

fn main() {
    init_logging();
    tracing::info!("Starting Nocturne v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Session failed: {e}");
        std::process::exit(1);
    }
}
