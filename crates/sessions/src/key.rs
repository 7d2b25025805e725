use std::{borrow::Borrow, fmt};

/// Replacement for `@` in a normalized id.
pub const AT_MARKER: &str = "_at_";
/// Replacement for `.` in a normalized id.
pub const DOT_MARKER: &str = "_dot_";

/// Map an arbitrary caller-supplied session name onto `[A-Za-z0-9_-]`.
///
/// `@` and `.` become readable markers so e-mail style names stay
/// recognisable, every other disallowed character becomes `_`, runs of `_`
/// collapse and leading/trailing `_` are stripped. The result is safe as a
/// path component and the function is idempotent.
pub fn normalize(requested: &str) -> String {
    let mut out = String::with_capacity(requested.len());

    for ch in requested.chars() {
        match ch {
            '@' => AT_MARKER.chars().for_each(|c| push_collapsed(&mut out, c)),
            '.' => DOT_MARKER.chars().for_each(|c| push_collapsed(&mut out, c)),
            c if c.is_ascii_alphanumeric() || c == '-' => out.push(c),
            _ => push_collapsed(&mut out, '_'),
        }
    }

    out.trim_matches('_').to_string()
}

fn push_collapsed(out: &mut String, c: char) {
    if c == '_' && out.ends_with('_') {
        return;
    }
    out.push(c);
}

/// Normalized session identifier; the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Derive the id for a caller-supplied name.
    pub fn from_requested(requested: &str) -> Self {
        Self(normalize(requested))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
