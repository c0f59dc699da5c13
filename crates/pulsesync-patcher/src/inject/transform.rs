//! Text transforms applied to the located files. All of them are pure so they
//! can be checked without touching the filesystem.

use super::payload::{ENTRY_SENTINEL, LISTENER_SENTINEL, Payload};

/// Start of the function the track-info listener is inserted into.
pub const EVENTS_ANCHOR: &str = "const handleApplicationEvents = (window) => {";

/// Literal flag flips applied to the application config.
pub const CONFIG_FLAGS: [(&str, &str); 2] = [
    ("enableDevTools: false", "enableDevTools: true"),
    ("enableWebSecurity: true", "enableWebSecurity: false"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    Changed(String),
    AlreadyApplied,
    AnchorMissing,
}

/// Append the page instrumentation unless a previous run already did.
pub fn append_entry_script(content: &str, payload: &Payload) -> Transform {
    if content.contains(ENTRY_SENTINEL) {
        return Transform::AlreadyApplied;
    }
    let mut patched = String::with_capacity(content.len() + payload.entry_script.len());
    patched.push_str(content);
    patched.push_str(&payload.entry_script);
    Transform::Changed(patched)
}

/// Flip each config flag once. Returns the new text and how many flags were
/// found.
pub fn flip_config_flags(content: &str) -> (String, usize) {
    CONFIG_FLAGS
        .iter()
        .fold((content.to_string(), 0), |(text, applied), (from, to)| {
            if text.contains(from) {
                (text.replacen(from, to, 1), applied + 1)
            } else {
                (text, applied)
            }
        })
}

/// Open the events function body with the track-info listener. Only the first
/// anchor is touched.
pub fn insert_track_listener(content: &str, payload: &Payload) -> Transform {
    if content.contains(LISTENER_SENTINEL) {
        return Transform::AlreadyApplied;
    }
    if !content.contains(EVENTS_ANCHOR) {
        return Transform::AnchorMissing;
    }
    let replacement = format!("{EVENTS_ANCHOR}{}", payload.track_info_listener);
    Transform::Changed(content.replacen(EVENTS_ANCHOR, &replacement, 1))
}
