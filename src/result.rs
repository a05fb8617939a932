//! Applicability and effect descriptions.
//!
//! Operation specs never touch the stores directly. They return an
//! `OperationResult` describing intended effects; merging those effects is
//! the orchestrator's job. An idempotent re-apply returns an empty result.

use serde::{Deserialize, Serialize};

use crate::ids::{EntryID, MessageID, ThreadID, UserID};
use crate::entry::EntryInfo;
use crate::message::MessageInfo;
use crate::thread::ThreadInfo;

// ---------------------------------------------------------------------------
// Applicability
// ---------------------------------------------------------------------------

/// Why an operation cannot be applied right now. The four `Missing*`
/// reasons are retryable once the named dependency shows up; `Invalid` is a
/// permanent drop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InapplicabilityReason {
    MissingThread(ThreadID),
    MissingMessage(MessageID),
    MissingEntry(EntryID),
    MissingMembership { thread_id: ThreadID, user_id: UserID },
    Invalid,
}

impl InapplicabilityReason {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InapplicabilityReason::Invalid)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applicability {
    Possible,
    Impossible(InapplicabilityReason),
}

// ---------------------------------------------------------------------------
// State updates
// ---------------------------------------------------------------------------

/// How much message history accompanies a thread-join update.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStatus {
    /// The bundled messages are the thread's entire history.
    Exhaustive,
    Truncated,
}

/// One store mutation. The store-merge sink applies these transactionally
/// per thread.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateInfo {
    JoinThread {
        thread: ThreadInfo,
        messages: Vec<MessageInfo>,
        truncation: TruncationStatus,
    },
    UpdateThread {
        thread: ThreadInfo,
    },
    DeleteThread {
        thread_id: ThreadID,
    },
    UpdateThreadReadStatus {
        thread_id: ThreadID,
        unread: bool,
        time: u64,
    },
    ReplaceEntry {
        entry: EntryInfo,
    },
}

// ---------------------------------------------------------------------------
// Blob operations
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlobOpKind {
    EstablishHolder,
    RemoveHolder,
}

/// Which side of a transfer the blob op applies to. Inbound-only ops are
/// skipped on the originating device, which already holds the blob.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlobOpDirection {
    InboundOnly,
    Both,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlobOp {
    pub blob_hash: String,
    pub kind: BlobOpKind,
    pub direction: BlobOpDirection,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Data the notification layer needs, produced here but delivered out of
/// scope. Computed even when the local state write was superseded.
#[derive(Clone, Debug, PartialEq)]
pub enum NotificationsCreationData {
    /// Preview data for new messages in a thread.
    MessagePreviews {
        thread_id: ThreadID,
        messages: Vec<MessageInfo>,
    },
    /// Badge count changed without any new previewable message.
    BadgeUpdate { thread_id: ThreadID },
    /// Withdraw delivered notifications up to `time` (thread marked read).
    Rescind { thread_id: ThreadID, time: u64 },
}

// ---------------------------------------------------------------------------
// OperationResult
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationResult {
    pub new_messages: Vec<MessageInfo>,
    pub updates: Vec<UpdateInfo>,
    pub blob_ops: Vec<BlobOp>,
    pub notification_data: Option<NotificationsCreationData>,
}

impl OperationResult {
    pub fn empty() -> OperationResult {
        OperationResult::default()
    }

    /// True when the apply was a timestamp-gated no-op. Notification data
    /// alone does not make a result non-empty; it carries no state.
    pub fn is_empty(&self) -> bool {
        self.new_messages.is_empty() && self.updates.is_empty() && self.blob_ops.is_empty()
    }
}
