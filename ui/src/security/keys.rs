//! Keyboard shortcuts that are blocked during an attempt.

/// A keydown as seen by the monitor, independent of the DOM event type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStroke {
    /// `KeyboardEvent.key` value, e.g. `"c"`, `"Tab"`, `"F11"`.
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

impl KeyStroke {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Copy, cut, paste, select-all, print, save, and tab cycling.
const SHORTCUT_KEYS: [&str; 7] = ["c", "x", "v", "a", "p", "s", "tab"];

/// Blocked regardless of modifiers.
const STANDALONE_KEYS: [&str; 2] = ["F11", "PrintScreen"];

/// Label for a blocked stroke, or `None` when the stroke is allowed.
pub fn blocked_label(stroke: &KeyStroke) -> Option<String> {
    if let Some(key) = STANDALONE_KEYS.iter().find(|k| **k == stroke.key) {
        return Some((*key).to_string());
    }

    if !(stroke.ctrl || stroke.meta) {
        return None;
    }

    let normalized = stroke.key.to_lowercase();
    if !SHORTCUT_KEYS.contains(&normalized.as_str()) {
        return None;
    }

    let modifier = if stroke.ctrl { "Ctrl" } else { "Cmd" };
    let key = if normalized == "tab" {
        "Tab".to_string()
    } else {
        normalized.to_uppercase()
    };
    Some(format!("{modifier}+{key}"))
}
