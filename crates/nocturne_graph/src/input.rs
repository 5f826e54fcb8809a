// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer and keyboard decoding.
//!
//! Raw device events are folded into [`Gesture`]s: modifier state is tracked
//! here so the patch only ever sees intent (press, pan, zoom, shortcuts).
//! Positions stay in screen space; the patch applies its own transform.

use egui::{Pos2, Vec2};

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Left button
    Primary,
    /// Right button
    Secondary,
    /// Middle button
    Middle,
}

/// Keys the editor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Command (macOS)
    Command,
    /// Control
    Control,
    /// Shift
    Shift,
    /// Alt / Option
    Alt,
    /// Backspace
    Backspace,
    /// Enter / Return
    Enter,
    /// Printable character
    Character(char),
}

/// Raw input event in screen space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Button pressed
    PointerPressed {
        /// Screen position
        position: Pos2,
        /// Button
        button: PointerButton,
    },
    /// Pointer moved with a button held
    PointerDragged {
        /// Screen position
        position: Pos2,
    },
    /// Button released
    PointerReleased {
        /// Screen position
        position: Pos2,
    },
    /// Wheel scrolled
    Scrolled {
        /// Vertical scroll amount
        delta: f32,
    },
    /// Key pressed
    KeyPressed {
        /// Key
        key: Key,
        /// Whether this is an auto-repeat
        repeat: bool,
    },
    /// Key released
    KeyReleased {
        /// Key
        key: Key,
    },
}

/// Held modifier keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Command or Control
    pub command: bool,
    /// Shift
    pub shift: bool,
    /// Alt
    pub alt: bool,
}

/// Decoded editor intent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Primary press at a screen position
    Press(Pos2),
    /// Pointer dragged to a screen position
    Drag(Pos2),
    /// Primary release at a screen position
    Release(Pos2),
    /// Pan the canvas by a screen-space delta
    Pan(Vec2),
    /// Zoom by a scroll amount
    Zoom(f32),
    /// Reset pan and zoom
    ResetView,
    /// Delete the focused module
    DeleteFocused,
    /// Show or hide the module browser
    ToggleBrowser,
    /// Toggle MIDI mapping mode
    ToggleMapping,
    /// Ask the host to save a preset
    SavePreset,
}

/// Modifier and pan tracking
#[derive(Debug, Clone, Default)]
pub struct InputState {
    modifiers: Modifiers,
    pan_anchor: Option<Pos2>,
    pointer: Pos2,
}

impl InputState {
    /// Create a fresh state
    pub fn new() -> Self {
        Self::default()
    }

    /// Held modifiers
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Last known pointer position, screen space
    pub fn pointer(&self) -> Pos2 {
        self.pointer
    }

    /// Fold one event into zero or more gestures
    pub fn handle(&mut self, event: &InputEvent) -> Vec<Gesture> {
        match *event {
            InputEvent::KeyPressed { key, repeat } => {
                self.set_modifier(key, true);
                self.shortcut(key, repeat).into_iter().collect()
            }
            InputEvent::KeyReleased { key } => {
                self.set_modifier(key, false);
                Vec::new()
            }
            InputEvent::PointerPressed { position, button } => {
                self.pointer = position;
                match button {
                    PointerButton::Primary => {
                        if self.modifiers.shift {
                            self.pan_anchor = Some(position);
                        }
                        vec![Gesture::Press(position)]
                    }
                    PointerButton::Secondary => vec![Gesture::ToggleBrowser],
                    PointerButton::Middle => vec![Gesture::ToggleMapping],
                }
            }
            InputEvent::PointerDragged { position } => {
                self.pointer = position;
                match self.pan_anchor {
                    Some(anchor) if self.modifiers.shift => {
                        self.pan_anchor = Some(position);
                        vec![Gesture::Pan(position - anchor)]
                    }
                    _ => vec![Gesture::Drag(position)],
                }
            }
            InputEvent::PointerReleased { position } => {
                self.pointer = position;
                self.pan_anchor = None;
                vec![Gesture::Release(position)]
            }
            InputEvent::Scrolled { delta } if self.modifiers.shift => vec![Gesture::Zoom(delta)],
            InputEvent::Scrolled { .. } => Vec::new(),
        }
    }

    fn set_modifier(&mut self, key: Key, held: bool) {
        match key {
            Key::Command | Key::Control => self.modifiers.command = held,
            Key::Shift => self.modifiers.shift = held,
            Key::Alt => self.modifiers.alt = held,
            _ => {}
        }
    }

    fn shortcut(&self, key: Key, repeat: bool) -> Option<Gesture> {
        let Modifiers { command, shift, .. } = self.modifiers;
        if !command {
            return None;
        }
        match key {
            Key::Enter if !repeat => Some(Gesture::ToggleBrowser),
            Key::Character('s' | 'S') if shift => Some(Gesture::SavePreset),
            Key::Character('m' | 'M') if !repeat => Some(Gesture::ToggleMapping),
            Key::Character('r' | 'R') => Some(Gesture::ResetView),
            Key::Backspace => Some(Gesture::DeleteFocused),
            _ => None,
        }
    }
}
