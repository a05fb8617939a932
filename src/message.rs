//! Message records produced by operation application.
//!
//! Messages are additive and immutable once created. Edits, deletes, and
//! reactions are new message records that reference a target, never in-place
//! rewrites, so history survives out-of-order delivery.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageID, ThreadID, UserID};
use crate::thread::ThreadInfo;

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Photo,
    Video,
}

/// One attachment in a multimedia message. The blob itself lives in the blob
/// service; this record only names it by hash.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub blob_hash: String,
}

// ---------------------------------------------------------------------------
// Reactions and relationship messages
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    AddReaction,
    RemoveReaction,
}

/// Relationship transition carried by an `update_relationship` message.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipAction {
    RequestSent,
    RequestAccepted,
    FarcasterMutual,
}

// ---------------------------------------------------------------------------
// MessageContent
// ---------------------------------------------------------------------------

/// The closed set of message kinds the engine can produce.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    CreateThread {
        #[serde(rename = "initialThreadState")]
        initial_thread_state: Box<ThreadInfo>,
    },
    CreateSidebar {
        #[serde(rename = "sourceMessageAuthor")]
        source_message_author: UserID,
        #[serde(rename = "initialThreadState")]
        initial_thread_state: Box<ThreadInfo>,
    },
    /// Mirror of the parent-thread message a sidebar was rooted at.
    SidebarSource {
        #[serde(rename = "sourceMessageID")]
        source_message_id: MessageID,
    },
    Text {
        text: String,
    },
    Multimedia {
        media: Vec<Media>,
    },
    Reaction {
        #[serde(rename = "targetMessageID")]
        target_message_id: MessageID,
        reaction: String,
        action: ReactionAction,
    },
    Edit {
        #[serde(rename = "targetMessageID")]
        target_message_id: MessageID,
        text: String,
    },
    Delete {
        #[serde(rename = "targetMessageID")]
        target_message_id: MessageID,
    },
    AddMembers {
        #[serde(rename = "addedUserIDs")]
        added_user_ids: Vec<UserID>,
    },
    RemoveMembers {
        #[serde(rename = "removedUserIDs")]
        removed_user_ids: Vec<UserID>,
    },
    LeaveThread,
    /// One settings-change message per changed field; `value` is the new
    /// field value in wire form.
    ChangeSettings {
        field: String,
        value: serde_json::Value,
    },
    CreateEntry {
        #[serde(rename = "entryID")]
        entry_id: crate::ids::EntryID,
        date: String,
        text: String,
    },
    EditEntry {
        #[serde(rename = "entryID")]
        entry_id: crate::ids::EntryID,
        date: String,
        text: String,
    },
    DeleteEntry {
        #[serde(rename = "entryID")]
        entry_id: crate::ids::EntryID,
        date: String,
        text: String,
    },
    UpdateRelationship {
        operation: RelationshipAction,
        #[serde(rename = "targetID")]
        target_id: UserID,
    },
}

impl MessageContent {
    /// Whether a message of this kind counts toward the thread's replies
    /// counter. Only substantive user content does; membership churn,
    /// settings writes, and audit records do not.
    pub fn included_in_replies_count(&self) -> bool {
        matches!(
            self,
            MessageContent::Text { .. } | MessageContent::Multimedia { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// MessageInfo
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub id: MessageID,
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(flatten)]
    pub content: MessageContent,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
