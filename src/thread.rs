//! Thread state records.
//!
//! `ThreadInfo` is an immutable value type: every mutation goes through an
//! explicit update function that returns a new value (or `None` when the
//! write is superseded by a newer recorded timestamp). This keeps the
//! last-writer-wins comparisons auditable and testable in isolation.
//!
//! Timestamp tracking is per field and per member (`ThreadTimestamps`), so
//! concurrent operations touching different fields or different members of
//! the same thread resolve independently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::{MessageID, ThreadID, UserID};

/// Last-writer-wins gate: a write applies only when its logical timestamp is
/// strictly greater than the recorded one. Equal times lose, which is what
/// makes duplicate delivery a no-op.
pub fn supersedes(op_time: u64, recorded_time: u64) -> bool {
    op_time > recorded_time
}

// ---------------------------------------------------------------------------
// ThreadType, ThreadSubscription, Avatar
// ---------------------------------------------------------------------------

/// Kind of a thick (peer-replicated) thread.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThreadType {
    /// 1:1 thread between two users.
    Personal,
    /// Thread visible only to its creator's own devices.
    Private,
    /// Multi-member group thread.
    Local,
    /// Child thread rooted at a source message of its parent.
    ThickSidebar,
}

impl ThreadType {
    pub fn is_sidebar(&self) -> bool {
        matches!(self, ThreadType::ThickSidebar)
    }
}

/// Per-member notification subscription.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadSubscription {
    pub home: bool,
    #[serde(rename = "pushNotifs")]
    pub push_notifs: bool,
}

impl ThreadSubscription {
    /// The subscription every member starts with on join.
    pub fn joined() -> Self {
        ThreadSubscription {
            home: true,
            push_notifs: true,
        }
    }
}

/// Thread avatar. `Remove` clears a previously set avatar.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Avatar {
    Emoji { emoji: String, color: String },
    Image { uri: String },
    Remove,
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Per-member write times.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemberTimestamps {
    pub is_member: u64,
    pub subscription: u64,
}

/// Viewer-local write times.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserTimestamps {
    pub unread: u64,
}

/// Last-write times for every independently-writable piece of thread state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThreadTimestamps {
    pub name: u64,
    pub description: u64,
    pub color: u64,
    pub avatar: u64,
    pub members: BTreeMap<UserID, MemberTimestamps>,
    pub current_user: CurrentUserTimestamps,
}

impl ThreadTimestamps {
    /// Seed every field and every member at thread-creation time.
    pub fn seeded(time: u64, member_ids: &[UserID]) -> Self {
        let members = member_ids
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    MemberTimestamps {
                        is_member: time,
                        subscription: time,
                    },
                )
            })
            .collect();
        ThreadTimestamps {
            name: time,
            description: time,
            color: time,
            avatar: time,
            members,
            current_user: CurrentUserTimestamps { unread: time },
        }
    }

    /// Recorded `isMember` time for a user, zero if never written.
    pub fn member_time(&self, user_id: &UserID) -> u64 {
        self.members.get(user_id).map(|t| t.is_member).unwrap_or(0)
    }

    /// Recorded subscription time for a user, zero if never written.
    pub fn subscription_time(&self, user_id: &UserID) -> u64 {
        self.members
            .get(user_id)
            .map(|t| t.subscription)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Members and viewer state
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub is_sender: bool,
    pub subscription: ThreadSubscription,
}

/// The viewer's own state within a thread.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadCurrentUser {
    pub unread: bool,
    pub subscription: ThreadSubscription,
}

// ---------------------------------------------------------------------------
// Settings changes
// ---------------------------------------------------------------------------

/// A bundle of optional per-field settings writes. Absent fields are
/// untouched; each present field is gated independently by its timestamp.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSettingsChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
}

impl ThreadSettingsChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.color.is_none()
            && self.avatar.is_none()
    }
}

// ---------------------------------------------------------------------------
// ThreadInfo
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    pub id: ThreadID,
    #[serde(rename = "type")]
    pub thread_type: ThreadType,
    pub creation_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<ThreadID>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containing_thread_id: Option<ThreadID>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<MessageID>,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
    pub members: BTreeMap<UserID, MemberInfo>,
    pub current_user: ThreadCurrentUser,
    pub replies_count: u64,
    pub pinned_count: u64,
    pub timestamps: ThreadTimestamps,
}

impl ThreadInfo {
    pub fn is_member(&self, user_id: &UserID) -> bool {
        self.members.contains_key(user_id)
    }

    pub fn member_ids(&self) -> Vec<UserID> {
        self.members.keys().cloned().collect()
    }

    /// Add one member, gated by the member's recorded `isMember` time.
    /// Returns `None` when the write is superseded (including exact
    /// duplicates), which callers treat as a per-member no-op.
    pub fn with_member_added(
        &self,
        user_id: &UserID,
        time: u64,
        subscription: ThreadSubscription,
    ) -> Option<ThreadInfo> {
        if !supersedes(time, self.timestamps.member_time(user_id)) {
            return None;
        }
        let mut next = self.clone();
        next.members.insert(
            user_id.clone(),
            MemberInfo {
                is_sender: false,
                subscription,
            },
        );
        let entry = next.timestamps.members.entry(user_id.clone()).or_default();
        entry.is_member = time;
        if entry.subscription < time {
            entry.subscription = time;
        }
        Some(next)
    }

    /// Remove one member, gated like `with_member_added`. The timestamp
    /// entry is retained as a tombstone so a stale re-add keeps losing.
    pub fn with_member_removed(&self, user_id: &UserID, time: u64) -> Option<ThreadInfo> {
        if !supersedes(time, self.timestamps.member_time(user_id)) {
            return None;
        }
        let mut next = self.clone();
        next.members.remove(user_id);
        next.timestamps
            .members
            .entry(user_id.clone())
            .or_default()
            .is_member = time;
        Some(next)
    }

    /// Update one member's subscription, gated by the member's recorded
    /// subscription time.
    pub fn with_subscription(
        &self,
        user_id: &UserID,
        subscription: ThreadSubscription,
        time: u64,
    ) -> Option<ThreadInfo> {
        if !self.members.contains_key(user_id) {
            return None;
        }
        if !supersedes(time, self.timestamps.subscription_time(user_id)) {
            return None;
        }
        let mut next = self.clone();
        if let Some(member) = next.members.get_mut(user_id) {
            member.subscription = subscription;
        }
        next.timestamps
            .members
            .entry(user_id.clone())
            .or_default()
            .subscription = time;
        Some(next)
    }

    /// Update the viewer's unread flag, gated by the recorded unread time.
    pub fn with_unread(&self, unread: bool, time: u64) -> Option<ThreadInfo> {
        if !supersedes(time, self.timestamps.current_user.unread) {
            return None;
        }
        let mut next = self.clone();
        next.current_user.unread = unread;
        next.timestamps.current_user.unread = time;
        Some(next)
    }

    /// Apply a settings bundle field by field. Each field is gated by its
    /// own timestamp; the returned list names the fields that actually
    /// changed (empty list means the whole bundle was superseded).
    pub fn with_settings(
        &self,
        changes: &ThreadSettingsChanges,
        time: u64,
    ) -> (ThreadInfo, Vec<&'static str>) {
        let mut next = self.clone();
        let mut changed = Vec::new();
        if let Some(name) = &changes.name {
            if supersedes(time, next.timestamps.name) {
                next.name = Some(name.clone());
                next.timestamps.name = time;
                changed.push("name");
            }
        }
        if let Some(description) = &changes.description {
            if supersedes(time, next.timestamps.description) {
                next.description = Some(description.clone());
                next.timestamps.description = time;
                changed.push("description");
            }
        }
        if let Some(color) = &changes.color {
            if supersedes(time, next.timestamps.color) {
                next.color = color.clone();
                next.timestamps.color = time;
                changed.push("color");
            }
        }
        if let Some(avatar) = &changes.avatar {
            if supersedes(time, next.timestamps.avatar) {
                next.avatar = match avatar {
                    Avatar::Remove => None,
                    other => Some(other.clone()),
                };
                next.timestamps.avatar = time;
                changed.push("avatar");
            }
        }
        (next, changed)
    }
}

// ---------------------------------------------------------------------------
// Pending thread color
// ---------------------------------------------------------------------------

const THREAD_COLORS: [&str; 8] = [
    "4b87aa", "5c9f5f", "b8753d", "786ec9", "aa4b87", "c85000", "008f83", "648caa",
];

/// Deterministic default color for a thread, derived from its member set so
/// every device picks the same color before any explicit settings write.
pub fn generate_pending_color(member_ids: &[UserID]) -> String {
    let mut sorted: Vec<&str> = member_ids.iter().map(|id| id.as_str()).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let hash: u64 = sorted
        .iter()
        .flat_map(|id| id.bytes())
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    THREAD_COLORS[(hash % THREAD_COLORS.len() as u64) as usize].to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserID {
        UserID::new(id)
    }

    fn test_thread() -> ThreadInfo {
        let members = [user("alice"), user("bob")];
        let mut member_map = BTreeMap::new();
        for m in &members {
            member_map.insert(
                m.clone(),
                MemberInfo {
                    is_sender: false,
                    subscription: ThreadSubscription::joined(),
                },
            );
        }
        ThreadInfo {
            id: ThreadID::new("11111111-1111-4111-8111-111111111111"),
            thread_type: ThreadType::Local,
            creation_time: 100,
            parent_thread_id: None,
            containing_thread_id: None,
            source_message_id: None,
            color: "4b87aa".into(),
            name: None,
            description: None,
            avatar: None,
            members: member_map,
            current_user: ThreadCurrentUser {
                unread: false,
                subscription: ThreadSubscription::joined(),
            },
            replies_count: 0,
            pinned_count: 0,
            timestamps: ThreadTimestamps::seeded(100, &members),
        }
    }

    #[test]
    fn test_supersedes_strictly_greater() {
        assert!(supersedes(2, 1));
        assert!(!supersedes(1, 1));
        assert!(!supersedes(0, 1));
    }

    #[test]
    fn test_add_member_gated_per_member() {
        let thread = test_thread();
        // Stale add for an existing member is a no-op
        assert!(thread
            .with_member_added(&user("alice"), 50, ThreadSubscription::joined())
            .is_none());
        // New member at a later time goes through
        let next = thread
            .with_member_added(&user("carol"), 200, ThreadSubscription::joined())
            .unwrap();
        assert!(next.is_member(&user("carol")));
        assert_eq!(next.timestamps.member_time(&user("carol")), 200);
        // Original value untouched
        assert!(!thread.is_member(&user("carol")));
    }

    #[test]
    fn test_remove_then_stale_add_keeps_losing() {
        let thread = test_thread();
        let removed = thread.with_member_removed(&user("bob"), 300).unwrap();
        assert!(!removed.is_member(&user("bob")));
        // Tombstone timestamp blocks a stale re-add
        assert!(removed
            .with_member_added(&user("bob"), 250, ThreadSubscription::joined())
            .is_none());
        // A genuinely newer add wins
        let readded = removed
            .with_member_added(&user("bob"), 400, ThreadSubscription::joined())
            .unwrap();
        assert!(readded.is_member(&user("bob")));
    }

    #[test]
    fn test_unread_gate_rejects_equal_time() {
        let thread = test_thread();
        assert!(thread.with_unread(true, 100).is_none());
        let next = thread.with_unread(true, 101).unwrap();
        assert!(next.current_user.unread);
        assert_eq!(next.timestamps.current_user.unread, 101);
    }

    #[test]
    fn test_subscription_requires_membership() {
        let thread = test_thread();
        let sub = ThreadSubscription {
            home: false,
            push_notifs: false,
        };
        assert!(thread.with_subscription(&user("nobody"), sub, 500).is_none());
        let next = thread.with_subscription(&user("bob"), sub, 500).unwrap();
        assert_eq!(next.members[&user("bob")].subscription, sub);
        assert_eq!(next.timestamps.subscription_time(&user("bob")), 500);
    }

    #[test]
    fn test_settings_per_field_gating() {
        let mut thread = test_thread();
        thread.timestamps.name = 500;
        let changes = ThreadSettingsChanges {
            name: Some("stale".into()),
            color: Some("5c9f5f".into()),
            ..Default::default()
        };
        let (next, changed) = thread.with_settings(&changes, 300);
        // name write superseded, color write applies
        assert_eq!(changed, vec!["color"]);
        assert_eq!(next.name, None);
        assert_eq!(next.color, "5c9f5f");
        assert_eq!(next.timestamps.color, 300);
        assert_eq!(next.timestamps.name, 500);
    }

    #[test]
    fn test_settings_avatar_remove_clears() {
        let mut thread = test_thread();
        thread.avatar = Some(Avatar::Emoji {
            emoji: "🦀".into(),
            color: "4b87aa".into(),
        });
        let changes = ThreadSettingsChanges {
            avatar: Some(Avatar::Remove),
            ..Default::default()
        };
        let (next, changed) = thread.with_settings(&changes, 200);
        assert_eq!(changed, vec!["avatar"]);
        assert_eq!(next.avatar, None);
    }

    #[test]
    fn test_pending_color_order_independent() {
        let a = generate_pending_color(&[user("u1"), user("u2")]);
        let b = generate_pending_color(&[user("u2"), user("u1")]);
        assert_eq!(a, b);
        assert!(THREAD_COLORS.contains(&a.as_str()));
    }
}
