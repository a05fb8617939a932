//! Calendar entry records.
//!
//! Entries use a single `last_updated_time` gate instead of per-field
//! timestamps: the displayed text only moves forward in time, while every
//! edit and delete still leaves an audit message in the thread regardless
//! of whether it won the gate.

use serde::{Deserialize, Serialize};

use crate::ids::{EntryID, ThreadID, UserID};
use crate::thread::supersedes;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub id: EntryID,
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    /// Calendar date in `YYYY-MM-DD` form.
    pub entry_date: String,
    pub text: String,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub creation_time: u64,
    pub last_updated_time: u64,
    pub deleted: bool,
}

impl EntryInfo {
    /// Replace the displayed text, gated by `last_updated_time`. Also
    /// resurrects a deleted entry when the edit is newer than the delete.
    pub fn edited(&self, text: &str, time: u64) -> Option<EntryInfo> {
        if !supersedes(time, self.last_updated_time) {
            return None;
        }
        let mut next = self.clone();
        next.text = text.to_string();
        next.last_updated_time = time;
        next.deleted = false;
        Some(next)
    }

    /// Mark the entry deleted, gated by `last_updated_time`.
    pub fn deleted_at(&self, time: u64) -> Option<EntryInfo> {
        if !supersedes(time, self.last_updated_time) {
            return None;
        }
        let mut next = self.clone();
        next.deleted = true;
        next.last_updated_time = time;
        Some(next)
    }
}
