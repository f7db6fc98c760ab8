/**
 * SELECTION / NAVIGATION BRIDGE - Focused entity <-> addressable path
 *
 * ROLE: Tracks which entity the operator is focused on (one machine, one
 * section, or nothing) and keeps that focus reconstructable from a shareable
 * path, so reloading or sharing a link reproduces the same filtered view.
 *
 * A focused machine that is missing from canonical state is a presentation
 * state (NotFound), never an error path.
 */

use crate::models::Machine;
use crate::store::StatusStore;

/// Focused entity of a view. Selecting replaces whatever was active; clear
/// returns to no selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Selection {
    #[default]
    None,
    Section(String),
    Machine(String),
}

impl Selection {
    pub fn select_section(&mut self, name: impl Into<String>) {
        *self = Selection::Section(name.into());
    }

    pub fn select_machine(&mut self, name: impl Into<String>) {
        *self = Selection::Machine(name.into());
    }

    pub fn clear(&mut self) {
        *self = Selection::None;
    }

    /// Section scope for the grouped view, when one is focused.
    pub fn section(&self) -> Option<&str> {
        match self {
            Selection::Section(name) => Some(name),
            _ => None,
        }
    }

    /// Shareable address of this focus state.
    pub fn to_path(&self) -> String {
        match self {
            Selection::None => "/".to_string(),
            Selection::Section(name) => format!("/sections/{}", encode_segment(name)),
            Selection::Machine(name) => format!("/machine/{}", encode_segment(name)),
        }
    }

    /// Rebuilds a focus state from an address. Anything unrecognized degrades
    /// to no selection, including the unfiltered roots `/` and `/sections`.
    pub fn from_path(path: &str) -> Selection {
        let trimmed = path.trim_end_matches('/');
        if let Some(rest) = trimmed.strip_prefix("/sections/") {
            if !rest.is_empty() && !rest.contains('/') {
                return Selection::Section(decode_segment(rest));
            }
        }
        if let Some(rest) = trimmed.strip_prefix("/machine/") {
            if !rest.is_empty() && !rest.contains('/') {
                return Selection::Machine(decode_segment(rest));
            }
        }
        Selection::None
    }
}

/// Resolution of a machine focus against canonical state.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineLookup {
    Found(Machine),
    NotFound(String),
}

/// Looks the focused machine up by name, case-insensitively. A stale deep
/// link to a machine that has since disappeared yields NotFound.
pub fn resolve_machine(store: &StatusStore, name: &str) -> MachineLookup {
    match store.find(name) {
        Some(machine) => MachineLookup::Found(machine),
        None => MachineLookup::NotFound(name.to_string()),
    }
}

fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn decode_segment(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(hex) = encoded.get(i + 1..i + 3) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
