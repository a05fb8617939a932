//! External-collaborator boundaries.
//!
//! The engine reads thread/message/entry state and merges effect bundles
//! through `LocalStore`, resolves identities through `IdentityResolver`, and
//! discovers devices through `PeerDirectory`. Production backs these with
//! the client database and identity service; tests and the reference
//! `MemoryStore` keep everything in maps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::EntryInfo;
use crate::ids::{DeviceID, EntryID, MessageID, ThreadID, UserID};
use crate::message::MessageInfo;
use crate::result::UpdateInfo;
use crate::thread::ThreadInfo;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Local chat-state storage. Reads are point lookups; all writes go through
/// `merge`, which applies one operation's effects transactionally per
/// thread.
pub trait LocalStore {
    fn fetch_thread(&self, thread_id: &ThreadID) -> Option<ThreadInfo>;
    fn fetch_message(&self, message_id: &MessageID) -> Option<MessageInfo>;
    fn fetch_entry(&self, entry_id: &EntryID) -> Option<EntryInfo>;
    fn merge(&mut self, messages: &[MessageInfo], updates: &[UpdateInfo]);
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service unreachable: {0}")]
    Unreachable(String),
    #[error("identity response malformed: {0}")]
    Malformed(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub username: String,
    #[serde(rename = "farcasterID", skip_serializing_if = "Option::is_none")]
    pub farcaster_id: Option<String>,
}

/// Identity-service lookup. Users absent from the returned map have no
/// known identity; transport failures are an `Err`.
pub trait IdentityResolver {
    fn find_user_identities(
        &self,
        user_ids: &[UserID],
    ) -> Result<HashMap<UserID, UserIdentity>, IdentityError>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct PeerDevice {
    #[serde(rename = "userID")]
    pub user_id: UserID,
    #[serde(rename = "deviceID")]
    pub device_id: DeviceID,
}

/// Known devices for the viewer and all peers, plus this device's own ID
/// (excluded from fan-out).
pub trait PeerDirectory {
    fn peer_devices(&self) -> Vec<PeerDevice>;
    fn current_device_id(&self) -> DeviceID;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory `LocalStore`. Reference implementation of the merge semantics;
/// also the store every test runs against.
#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: HashMap<ThreadID, ThreadInfo>,
    messages: HashMap<MessageID, MessageInfo>,
    entries: HashMap<EntryID, EntryInfo>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn messages_for_thread(&self, thread_id: &ThreadID) -> Vec<MessageInfo> {
        let mut msgs: Vec<MessageInfo> = self
            .messages
            .values()
            .filter(|m| &m.thread_id == thread_id)
            .cloned()
            .collect();
        msgs.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        msgs
    }

    pub fn insert_thread(&mut self, thread: ThreadInfo) {
        self.threads.insert(thread.id.clone(), thread);
    }

    pub fn insert_message(&mut self, message: MessageInfo) {
        self.messages.insert(message.id.clone(), message);
    }

    pub fn insert_entry(&mut self, entry: EntryInfo) {
        self.entries.insert(entry.id.clone(), entry);
    }
}

impl LocalStore for MemoryStore {
    fn fetch_thread(&self, thread_id: &ThreadID) -> Option<ThreadInfo> {
        self.threads.get(thread_id).cloned()
    }

    fn fetch_message(&self, message_id: &MessageID) -> Option<MessageInfo> {
        self.messages.get(message_id).cloned()
    }

    fn fetch_entry(&self, entry_id: &EntryID) -> Option<EntryInfo> {
        self.entries.get(entry_id).cloned()
    }

    fn merge(&mut self, messages: &[MessageInfo], updates: &[UpdateInfo]) {
        for message in messages {
            // Dedup by ID: a replayed operation re-describing a known
            // message must not duplicate it.
            self.messages
                .entry(message.id.clone())
                .or_insert_with(|| message.clone());
        }
        for update in updates {
            match update {
                UpdateInfo::JoinThread {
                    thread, messages, ..
                } => {
                    self.threads.insert(thread.id.clone(), thread.clone());
                    for message in messages {
                        self.messages
                            .entry(message.id.clone())
                            .or_insert_with(|| message.clone());
                    }
                }
                UpdateInfo::UpdateThread { thread } => {
                    self.threads.insert(thread.id.clone(), thread.clone());
                }
                UpdateInfo::DeleteThread { thread_id } => {
                    self.threads.remove(thread_id);
                    self.messages.retain(|_, m| &m.thread_id != thread_id);
                    self.entries.retain(|_, e| &e.thread_id != thread_id);
                }
                UpdateInfo::UpdateThreadReadStatus {
                    thread_id,
                    unread,
                    time,
                } => {
                    if let Some(thread) = self.threads.get_mut(thread_id) {
                        thread.current_user.unread = *unread;
                        thread.timestamps.current_user.unread = *time;
                    }
                }
                UpdateInfo::ReplaceEntry { entry } => {
                    self.entries.insert(entry.id.clone(), entry.clone());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Static helpers for tests and simple deployments
// ---------------------------------------------------------------------------

/// Fixed device directory.
#[derive(Debug, Clone)]
pub struct StaticPeerDirectory {
    pub devices: Vec<PeerDevice>,
    pub current: DeviceID,
}

impl PeerDirectory for StaticPeerDirectory {
    fn peer_devices(&self) -> Vec<PeerDevice> {
        self.devices.clone()
    }

    fn current_device_id(&self) -> DeviceID {
        self.current.clone()
    }
}

/// Fixed identity map; users absent from the map resolve to nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    pub identities: HashMap<UserID, UserIdentity>,
}

impl IdentityResolver for StaticIdentityResolver {
    fn find_user_identities(
        &self,
        user_ids: &[UserID],
    ) -> Result<HashMap<UserID, UserIdentity>, IdentityError> {
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                self.identities
                    .get(id)
                    .map(|identity| (id.clone(), identity.clone()))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
