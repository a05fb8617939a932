//! Identity newtypes for the DM engine.
//!
//! - `UserID` / `DeviceID`: opaque identity strings assigned outside this core
//! - `ThreadID` / `EntryID`: thick IDs, UUIDs minted by the origin device
//! - `MessageID`: a thick ID, optionally suffixed with a field name
//!   (`<uuid>/name`) for messages derived from a settings change

use serde::{Deserialize, Serialize};
use std::fmt;

/// Checks the canonical 8-4-4-4-12 hex UUID shape.
fn is_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit(),
    })
}

// ---------------------------------------------------------------------------
// UserID
// ---------------------------------------------------------------------------

/// Stable user identity, assigned by the identity layer (out of scope here).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserID(pub String);

impl UserID {
    pub fn new(id: impl Into<String>) -> Self {
        UserID(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Debug for UserID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserID({})", self.0)
    }
}

impl fmt::Display for UserID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DeviceID
// ---------------------------------------------------------------------------

/// Stable device identity; one user owns many devices. The transport layer
/// derives these from signing keys; the engine treats them as opaque.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceID(pub String);

impl DeviceID {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceID(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeviceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceID({})", self.0)
    }
}

impl fmt::Display for DeviceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ThreadID
// ---------------------------------------------------------------------------

/// Thick thread identifier, a UUID minted by the creating device.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadID(pub String);

impl ThreadID {
    pub fn new(id: impl Into<String>) -> Self {
        ThreadID(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        is_uuid(&self.0)
    }
}

impl fmt::Debug for ThreadID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadID({})", self.0)
    }
}

impl fmt::Display for ThreadID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageID
// ---------------------------------------------------------------------------

/// Thick message identifier.
///
/// Plain messages use a bare UUID. Messages derived from a settings change
/// reuse the operation's ID prefix plus the changed field, e.g.
/// `3f2b.../name`, so one operation yields stable per-field message IDs.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageID(pub String);

impl MessageID {
    pub fn new(id: impl Into<String>) -> Self {
        MessageID(id.into())
    }

    /// Build a per-field message ID from a settings-change prefix.
    pub fn from_prefix(prefix: &MessageID, field: &str) -> Self {
        MessageID(format!("{}/{}", prefix.0, field))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        match self.0.split_once('/') {
            None => is_uuid(&self.0),
            Some((base, suffix)) => {
                is_uuid(base)
                    && !suffix.is_empty()
                    && suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
        }
    }
}

impl fmt::Debug for MessageID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageID({})", self.0)
    }
}

impl fmt::Display for MessageID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntryID
// ---------------------------------------------------------------------------

/// Thick calendar-entry identifier, a UUID minted by the creating device.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryID(pub String);

impl EntryID {
    pub fn new(id: impl Into<String>) -> Self {
        EntryID(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        is_uuid(&self.0)
    }
}

impl fmt::Debug for EntryID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryID({})", self.0)
    }
}

impl fmt::Display for EntryID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
