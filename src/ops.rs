//! The closed operation union and its wire validators.
//!
//! Every mutation that can cross the wire between peer devices is one of the
//! twenty variants here. The wire shape is internally tagged JSON
//! (`{"type": "create_thread", ...}`); `DmOperation::from_wire` checks the
//! tag, rejects unknown fields per variant, deserializes, and runs the
//! variant's semantic validator before anything downstream sees the value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{EntryID, MessageID, ThreadID, UserID};
use crate::message::{Media, ReactionAction, RelationshipAction};
use crate::thread::{Avatar, ThreadSettingsChanges, ThreadSubscription, ThreadType};

/// Millisecond wall clock, used for enqueue times and prune sweeps.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OpError {
    #[error("operation payload is not a JSON object")]
    NotAnObject,
    #[error("operation has no `type` tag")]
    MissingTag,
    #[error("unknown operation type `{0}`")]
    UnknownType(String),
    #[error("unexpected field `{field}` on `{tag}` operation")]
    UnexpectedField { tag: &'static str, field: String },
    #[error("malformed `{tag}` payload: {source}")]
    Malformed {
        tag: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid operation: {0}")]
    Invalid(&'static str),
}

// ---------------------------------------------------------------------------
// OpType
// ---------------------------------------------------------------------------

/// Type tag of an operation, detached from its payload. Used as the registry
/// key and in logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpType {
    CreateThread,
    CreateSidebar,
    SendTextMessage,
    SendMultimediaMessage,
    SendReactionMessage,
    SendEditMessage,
    SendDeleteMessage,
    AddMembers,
    AddViewerToThreadMembers,
    ChangeThreadSettingsAndAddViewer,
    RemoveMembers,
    LeaveThread,
    ChangeThreadSettings,
    ChangeThreadReadStatus,
    ChangeThreadSubscription,
    CreateEntry,
    EditEntry,
    DeleteEntry,
    UpdateRelationship,
    ChangeRelationship,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::CreateThread => "create_thread",
            OpType::CreateSidebar => "create_sidebar",
            OpType::SendTextMessage => "send_text_message",
            OpType::SendMultimediaMessage => "send_multimedia_message",
            OpType::SendReactionMessage => "send_reaction_message",
            OpType::SendEditMessage => "send_edit_message",
            OpType::SendDeleteMessage => "send_delete_message",
            OpType::AddMembers => "add_members",
            OpType::AddViewerToThreadMembers => "add_viewer_to_thread_members",
            OpType::ChangeThreadSettingsAndAddViewer => "change_thread_settings_and_add_viewer",
            OpType::RemoveMembers => "remove_members",
            OpType::LeaveThread => "leave_thread",
            OpType::ChangeThreadSettings => "change_thread_settings",
            OpType::ChangeThreadReadStatus => "change_thread_read_status",
            OpType::ChangeThreadSubscription => "change_thread_subscription",
            OpType::CreateEntry => "create_entry",
            OpType::EditEntry => "edit_entry",
            OpType::DeleteEntry => "delete_entry",
            OpType::UpdateRelationship => "update_relationship",
            OpType::ChangeRelationship => "change_relationship",
        }
    }

    pub fn from_tag(tag: &str) -> Option<OpType> {
        Some(match tag {
            "create_thread" => OpType::CreateThread,
            "create_sidebar" => OpType::CreateSidebar,
            "send_text_message" => OpType::SendTextMessage,
            "send_multimedia_message" => OpType::SendMultimediaMessage,
            "send_reaction_message" => OpType::SendReactionMessage,
            "send_edit_message" => OpType::SendEditMessage,
            "send_delete_message" => OpType::SendDeleteMessage,
            "add_members" => OpType::AddMembers,
            "add_viewer_to_thread_members" => OpType::AddViewerToThreadMembers,
            "change_thread_settings_and_add_viewer" => OpType::ChangeThreadSettingsAndAddViewer,
            "remove_members" => OpType::RemoveMembers,
            "leave_thread" => OpType::LeaveThread,
            "change_thread_settings" => OpType::ChangeThreadSettings,
            "change_thread_read_status" => OpType::ChangeThreadReadStatus,
            "change_thread_subscription" => OpType::ChangeThreadSubscription,
            "create_entry" => OpType::CreateEntry,
            "edit_entry" => OpType::EditEntry,
            "delete_entry" => OpType::DeleteEntry,
            "update_relationship" => OpType::UpdateRelationship,
            "change_relationship" => OpType::ChangeRelationship,
            _ => return None,
        })
    }

    /// Wire fields this variant may carry, beyond the `type` tag itself.
    /// Internally-tagged serde cannot reject unknown fields on its own
    /// (serde-rs/serde#1600), so `from_wire` checks against these lists.
    fn allowed_fields(&self) -> &'static [&'static str] {
        match self {
            OpType::CreateThread => &[
                "threadID",
                "creatorID",
                "time",
                "threadType",
                "memberIDs",
                "newMessageID",
            ],
            OpType::CreateSidebar => &[
                "threadID",
                "creatorID",
                "time",
                "parentThreadID",
                "memberIDs",
                "sourceMessageID",
                "newSidebarSourceMessageID",
                "newCreateSidebarMessageID",
            ],
            OpType::SendTextMessage => &["threadID", "creatorID", "time", "messageID", "text"],
            OpType::SendMultimediaMessage => {
                &["threadID", "creatorID", "time", "messageID", "media"]
            }
            OpType::SendReactionMessage => &[
                "threadID",
                "creatorID",
                "time",
                "messageID",
                "targetMessageID",
                "reaction",
                "action",
            ],
            OpType::SendEditMessage => &[
                "threadID",
                "creatorID",
                "time",
                "messageID",
                "targetMessageID",
                "text",
            ],
            OpType::SendDeleteMessage => &[
                "threadID",
                "creatorID",
                "time",
                "messageID",
                "targetMessageID",
            ],
            OpType::AddMembers => &["threadID", "editorID", "time", "messageID", "addedUserIDs"],
            OpType::AddViewerToThreadMembers => &[
                "threadID",
                "editorID",
                "time",
                "messageID",
                "existingThreadDetails",
                "addedUserIDs",
            ],
            OpType::ChangeThreadSettingsAndAddViewer => &[
                "threadID",
                "editorID",
                "time",
                "existingThreadDetails",
                "changes",
                "messageIDsPrefix",
                "addedUserIDs",
            ],
            OpType::RemoveMembers => {
                &["threadID", "editorID", "time", "messageID", "removedUserIDs"]
            }
            OpType::LeaveThread => &["threadID", "editorID", "time", "messageID"],
            OpType::ChangeThreadSettings => {
                &["threadID", "editorID", "time", "changes", "messageIDsPrefix"]
            }
            OpType::ChangeThreadReadStatus => &["threadID", "creatorID", "time", "unread"],
            OpType::ChangeThreadSubscription => &["threadID", "creatorID", "time", "subscription"],
            OpType::CreateEntry => &[
                "threadID",
                "creatorID",
                "time",
                "entryID",
                "entryDate",
                "text",
                "messageID",
            ],
            OpType::EditEntry => &[
                "threadID",
                "creatorID",
                "time",
                "entryID",
                "entryDate",
                "creationTime",
                "text",
                "messageID",
            ],
            OpType::DeleteEntry => &[
                "threadID",
                "creatorID",
                "time",
                "entryID",
                "entryDate",
                "creationTime",
                "prevText",
                "messageID",
            ],
            OpType::UpdateRelationship | OpType::ChangeRelationship => &[
                "threadID",
                "creatorID",
                "time",
                "operation",
                "targetUserID",
                "messageID",
            ],
        }
    }
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Snapshot of a thread carried inside viewer-adding operations, so the
/// recipient can materialize the thread without having seen its creation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExistingThreadDetails {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    pub thread_type: ThreadType,
    pub creation_time: u64,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    #[serde(rename = "allMemberIDs")]
    pub all_member_ids: Vec<UserID>,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
    #[serde(rename = "parentThreadID", skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<ThreadID>,
    #[serde(rename = "sourceMessageID", skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<MessageID>,
    #[serde(rename = "containingThreadID", skip_serializing_if = "Option::is_none")]
    pub containing_thread_id: Option<ThreadID>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    pub thread_type: ThreadType,
    #[serde(rename = "memberIDs")]
    pub member_ids: Vec<UserID>,
    #[serde(rename = "newMessageID")]
    pub new_message_id: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSidebarOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "parentThreadID")]
    pub parent_thread_id: ThreadID,
    #[serde(rename = "memberIDs")]
    pub member_ids: Vec<UserID>,
    #[serde(rename = "sourceMessageID")]
    pub source_message_id: MessageID,
    #[serde(rename = "newSidebarSourceMessageID")]
    pub new_sidebar_source_message_id: MessageID,
    #[serde(rename = "newCreateSidebarMessageID")]
    pub new_create_sidebar_message_id: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendTextMessageOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
    pub text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMultimediaMessageOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
    pub media: Vec<Media>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendReactionMessageOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
    #[serde(rename = "targetMessageID")]
    pub target_message_id: MessageID,
    pub reaction: String,
    pub action: ReactionAction,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendEditMessageOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
    #[serde(rename = "targetMessageID")]
    pub target_message_id: MessageID,
    pub text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendDeleteMessageOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
    #[serde(rename = "targetMessageID")]
    pub target_message_id: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "editorID")]
    pub editor_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
    #[serde(rename = "addedUserIDs")]
    pub added_user_ids: Vec<UserID>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddViewerToThreadMembersOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "editorID")]
    pub editor_id: UserID,
    pub time: u64,
    /// Absent on the re-broadcast a freshly-added viewer sends to its own
    /// devices, which must not produce a second membership message.
    #[serde(rename = "messageID", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageID>,
    pub existing_thread_details: ExistingThreadDetails,
    #[serde(rename = "addedUserIDs")]
    pub added_user_ids: Vec<UserID>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeThreadSettingsAndAddViewerOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "editorID")]
    pub editor_id: UserID,
    pub time: u64,
    pub existing_thread_details: ExistingThreadDetails,
    pub changes: ThreadSettingsChanges,
    #[serde(rename = "messageIDsPrefix")]
    pub message_ids_prefix: MessageID,
    #[serde(rename = "addedUserIDs")]
    pub added_user_ids: Vec<UserID>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMembersOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "editorID")]
    pub editor_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
    #[serde(rename = "removedUserIDs")]
    pub removed_user_ids: Vec<UserID>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveThreadOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "editorID")]
    pub editor_id: UserID,
    pub time: u64,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeThreadSettingsOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "editorID")]
    pub editor_id: UserID,
    pub time: u64,
    pub changes: ThreadSettingsChanges,
    #[serde(rename = "messageIDsPrefix")]
    pub message_ids_prefix: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeThreadReadStatusOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    pub unread: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeThreadSubscriptionOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    pub subscription: ThreadSubscription,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "entryID")]
    pub entry_id: EntryID,
    pub entry_date: String,
    pub text: String,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditEntryOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "entryID")]
    pub entry_id: EntryID,
    pub entry_date: String,
    pub creation_time: u64,
    pub text: String,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntryOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    #[serde(rename = "entryID")]
    pub entry_id: EntryID,
    pub entry_date: String,
    pub creation_time: u64,
    pub prev_text: String,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipOp {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadID,
    #[serde(rename = "creatorID")]
    pub creator_id: UserID,
    pub time: u64,
    pub operation: RelationshipAction,
    #[serde(rename = "targetUserID")]
    pub target_user_id: UserID,
    #[serde(rename = "messageID")]
    pub message_id: MessageID,
}

// ---------------------------------------------------------------------------
// DmOperation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DmOperation {
    CreateThread(CreateThreadOp),
    CreateSidebar(CreateSidebarOp),
    SendTextMessage(SendTextMessageOp),
    SendMultimediaMessage(SendMultimediaMessageOp),
    SendReactionMessage(SendReactionMessageOp),
    SendEditMessage(SendEditMessageOp),
    SendDeleteMessage(SendDeleteMessageOp),
    AddMembers(AddMembersOp),
    AddViewerToThreadMembers(AddViewerToThreadMembersOp),
    ChangeThreadSettingsAndAddViewer(ChangeThreadSettingsAndAddViewerOp),
    RemoveMembers(RemoveMembersOp),
    LeaveThread(LeaveThreadOp),
    ChangeThreadSettings(ChangeThreadSettingsOp),
    ChangeThreadReadStatus(ChangeThreadReadStatusOp),
    ChangeThreadSubscription(ChangeThreadSubscriptionOp),
    CreateEntry(CreateEntryOp),
    EditEntry(EditEntryOp),
    DeleteEntry(DeleteEntryOp),
    UpdateRelationship(RelationshipOp),
    ChangeRelationship(RelationshipOp),
}

impl DmOperation {
    pub fn op_type(&self) -> OpType {
        match self {
            DmOperation::CreateThread(_) => OpType::CreateThread,
            DmOperation::CreateSidebar(_) => OpType::CreateSidebar,
            DmOperation::SendTextMessage(_) => OpType::SendTextMessage,
            DmOperation::SendMultimediaMessage(_) => OpType::SendMultimediaMessage,
            DmOperation::SendReactionMessage(_) => OpType::SendReactionMessage,
            DmOperation::SendEditMessage(_) => OpType::SendEditMessage,
            DmOperation::SendDeleteMessage(_) => OpType::SendDeleteMessage,
            DmOperation::AddMembers(_) => OpType::AddMembers,
            DmOperation::AddViewerToThreadMembers(_) => OpType::AddViewerToThreadMembers,
            DmOperation::ChangeThreadSettingsAndAddViewer(_) => {
                OpType::ChangeThreadSettingsAndAddViewer
            }
            DmOperation::RemoveMembers(_) => OpType::RemoveMembers,
            DmOperation::LeaveThread(_) => OpType::LeaveThread,
            DmOperation::ChangeThreadSettings(_) => OpType::ChangeThreadSettings,
            DmOperation::ChangeThreadReadStatus(_) => OpType::ChangeThreadReadStatus,
            DmOperation::ChangeThreadSubscription(_) => OpType::ChangeThreadSubscription,
            DmOperation::CreateEntry(_) => OpType::CreateEntry,
            DmOperation::EditEntry(_) => OpType::EditEntry,
            DmOperation::DeleteEntry(_) => OpType::DeleteEntry,
            DmOperation::UpdateRelationship(_) => OpType::UpdateRelationship,
            DmOperation::ChangeRelationship(_) => OpType::ChangeRelationship,
        }
    }

    pub fn thread_id(&self) -> &ThreadID {
        match self {
            DmOperation::CreateThread(op) => &op.thread_id,
            DmOperation::CreateSidebar(op) => &op.thread_id,
            DmOperation::SendTextMessage(op) => &op.thread_id,
            DmOperation::SendMultimediaMessage(op) => &op.thread_id,
            DmOperation::SendReactionMessage(op) => &op.thread_id,
            DmOperation::SendEditMessage(op) => &op.thread_id,
            DmOperation::SendDeleteMessage(op) => &op.thread_id,
            DmOperation::AddMembers(op) => &op.thread_id,
            DmOperation::AddViewerToThreadMembers(op) => &op.thread_id,
            DmOperation::ChangeThreadSettingsAndAddViewer(op) => &op.thread_id,
            DmOperation::RemoveMembers(op) => &op.thread_id,
            DmOperation::LeaveThread(op) => &op.thread_id,
            DmOperation::ChangeThreadSettings(op) => &op.thread_id,
            DmOperation::ChangeThreadReadStatus(op) => &op.thread_id,
            DmOperation::ChangeThreadSubscription(op) => &op.thread_id,
            DmOperation::CreateEntry(op) => &op.thread_id,
            DmOperation::EditEntry(op) => &op.thread_id,
            DmOperation::DeleteEntry(op) => &op.thread_id,
            DmOperation::UpdateRelationship(op) => &op.thread_id,
            DmOperation::ChangeRelationship(op) => &op.thread_id,
        }
    }

    /// The user the operation is attributed to (`creatorID` or `editorID`,
    /// depending on variant).
    pub fn author(&self) -> &UserID {
        match self {
            DmOperation::CreateThread(op) => &op.creator_id,
            DmOperation::CreateSidebar(op) => &op.creator_id,
            DmOperation::SendTextMessage(op) => &op.creator_id,
            DmOperation::SendMultimediaMessage(op) => &op.creator_id,
            DmOperation::SendReactionMessage(op) => &op.creator_id,
            DmOperation::SendEditMessage(op) => &op.creator_id,
            DmOperation::SendDeleteMessage(op) => &op.creator_id,
            DmOperation::AddMembers(op) => &op.editor_id,
            DmOperation::AddViewerToThreadMembers(op) => &op.editor_id,
            DmOperation::ChangeThreadSettingsAndAddViewer(op) => &op.editor_id,
            DmOperation::RemoveMembers(op) => &op.editor_id,
            DmOperation::LeaveThread(op) => &op.editor_id,
            DmOperation::ChangeThreadSettings(op) => &op.editor_id,
            DmOperation::ChangeThreadReadStatus(op) => &op.creator_id,
            DmOperation::ChangeThreadSubscription(op) => &op.creator_id,
            DmOperation::CreateEntry(op) => &op.creator_id,
            DmOperation::EditEntry(op) => &op.creator_id,
            DmOperation::DeleteEntry(op) => &op.creator_id,
            DmOperation::UpdateRelationship(op) => &op.creator_id,
            DmOperation::ChangeRelationship(op) => &op.creator_id,
        }
    }

    pub fn time(&self) -> u64 {
        match self {
            DmOperation::CreateThread(op) => op.time,
            DmOperation::CreateSidebar(op) => op.time,
            DmOperation::SendTextMessage(op) => op.time,
            DmOperation::SendMultimediaMessage(op) => op.time,
            DmOperation::SendReactionMessage(op) => op.time,
            DmOperation::SendEditMessage(op) => op.time,
            DmOperation::SendDeleteMessage(op) => op.time,
            DmOperation::AddMembers(op) => op.time,
            DmOperation::AddViewerToThreadMembers(op) => op.time,
            DmOperation::ChangeThreadSettingsAndAddViewer(op) => op.time,
            DmOperation::RemoveMembers(op) => op.time,
            DmOperation::LeaveThread(op) => op.time,
            DmOperation::ChangeThreadSettings(op) => op.time,
            DmOperation::ChangeThreadReadStatus(op) => op.time,
            DmOperation::ChangeThreadSubscription(op) => op.time,
            DmOperation::CreateEntry(op) => op.time,
            DmOperation::EditEntry(op) => op.time,
            DmOperation::DeleteEntry(op) => op.time,
            DmOperation::UpdateRelationship(op) => op.time,
            DmOperation::ChangeRelationship(op) => op.time,
        }
    }

    // -----------------------------------------------------------------------
    // Wire decode/encode
    // -----------------------------------------------------------------------

    /// Decode a wire payload: tag check, unknown-field rejection, structural
    /// deserialization, then semantic validation. Anything that fails here
    /// is dropped by the orchestrator without an applicability check.
    pub fn from_wire(value: serde_json::Value) -> Result<DmOperation, OpError> {
        let obj = value.as_object().ok_or(OpError::NotAnObject)?;
        let tag = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(OpError::MissingTag)?;
        let op_type = OpType::from_tag(tag).ok_or_else(|| OpError::UnknownType(tag.to_string()))?;
        let allowed = op_type.allowed_fields();
        for field in obj.keys() {
            if field != "type" && !allowed.contains(&field.as_str()) {
                return Err(OpError::UnexpectedField {
                    tag: op_type.as_str(),
                    field: field.clone(),
                });
            }
        }
        let op: DmOperation = serde_json::from_value(value).map_err(|source| OpError::Malformed {
            tag: op_type.as_str(),
            source,
        })?;
        op.validate()?;
        Ok(op)
    }

    pub fn to_wire(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    // -----------------------------------------------------------------------
    // Semantic validation
    // -----------------------------------------------------------------------

    /// Variant-specific checks beyond wire shape. Locally-constructed
    /// operations go through this too, before fan-out.
    pub fn validate(&self) -> Result<(), OpError> {
        if self.time() == 0 {
            return Err(OpError::Invalid("time must be positive"));
        }
        if !self.author().is_well_formed() {
            return Err(OpError::Invalid("author ID is empty"));
        }
        if !self.thread_id().is_well_formed() {
            return Err(OpError::Invalid("thread ID is not a UUID"));
        }
        match self {
            DmOperation::CreateThread(op) => {
                require_message_id(&op.new_message_id)?;
            }
            DmOperation::CreateSidebar(op) => {
                if !op.parent_thread_id.is_well_formed() {
                    return Err(OpError::Invalid("parent thread ID is not a UUID"));
                }
                require_message_id(&op.source_message_id)?;
                require_message_id(&op.new_sidebar_source_message_id)?;
                require_message_id(&op.new_create_sidebar_message_id)?;
            }
            DmOperation::SendTextMessage(op) => {
                require_message_id(&op.message_id)?;
                if op.text.is_empty() {
                    return Err(OpError::Invalid("text message is empty"));
                }
            }
            DmOperation::SendMultimediaMessage(op) => {
                require_message_id(&op.message_id)?;
                if op.media.is_empty() {
                    return Err(OpError::Invalid("multimedia message has no media"));
                }
            }
            DmOperation::SendReactionMessage(op) => {
                require_message_id(&op.message_id)?;
                require_message_id(&op.target_message_id)?;
                if op.reaction.is_empty() {
                    return Err(OpError::Invalid("reaction is empty"));
                }
            }
            DmOperation::SendEditMessage(op) => {
                require_message_id(&op.message_id)?;
                require_message_id(&op.target_message_id)?;
            }
            DmOperation::SendDeleteMessage(op) => {
                require_message_id(&op.message_id)?;
                require_message_id(&op.target_message_id)?;
            }
            DmOperation::AddMembers(op) => {
                require_message_id(&op.message_id)?;
                if op.added_user_ids.is_empty() {
                    return Err(OpError::Invalid("add_members adds nobody"));
                }
            }
            DmOperation::AddViewerToThreadMembers(op) => {
                if let Some(id) = &op.message_id {
                    require_message_id(id)?;
                }
                if op.added_user_ids.is_empty() {
                    return Err(OpError::Invalid("add_viewer adds nobody"));
                }
            }
            DmOperation::ChangeThreadSettingsAndAddViewer(op) => {
                require_prefix(&op.message_ids_prefix)?;
                if op.added_user_ids.is_empty() {
                    return Err(OpError::Invalid("add_viewer adds nobody"));
                }
            }
            DmOperation::RemoveMembers(op) => {
                require_message_id(&op.message_id)?;
                if op.removed_user_ids.is_empty() {
                    return Err(OpError::Invalid("remove_members removes nobody"));
                }
            }
            DmOperation::LeaveThread(op) => {
                require_message_id(&op.message_id)?;
            }
            DmOperation::ChangeThreadSettings(op) => {
                require_prefix(&op.message_ids_prefix)?;
            }
            DmOperation::ChangeThreadReadStatus(_) | DmOperation::ChangeThreadSubscription(_) => {}
            DmOperation::CreateEntry(op) => {
                require_entry(&op.entry_id, &op.entry_date)?;
                require_message_id(&op.message_id)?;
            }
            DmOperation::EditEntry(op) => {
                require_entry(&op.entry_id, &op.entry_date)?;
                require_message_id(&op.message_id)?;
            }
            DmOperation::DeleteEntry(op) => {
                require_entry(&op.entry_id, &op.entry_date)?;
                require_message_id(&op.message_id)?;
            }
            DmOperation::UpdateRelationship(op) => {
                require_message_id(&op.message_id)?;
                if op.operation == RelationshipAction::FarcasterMutual {
                    return Err(OpError::Invalid(
                        "farcaster_mutual requires change_relationship",
                    ));
                }
            }
            DmOperation::ChangeRelationship(op) => {
                require_message_id(&op.message_id)?;
            }
        }
        Ok(())
    }
}

fn require_message_id(id: &MessageID) -> Result<(), OpError> {
    if id.is_well_formed() {
        Ok(())
    } else {
        Err(OpError::Invalid("message ID is malformed"))
    }
}

/// A settings-change prefix must be a bare UUID; field suffixes are appended
/// per changed field later.
fn require_prefix(id: &MessageID) -> Result<(), OpError> {
    if id.is_well_formed() && !id.as_str().contains('/') {
        Ok(())
    } else {
        Err(OpError::Invalid("message ID prefix is malformed"))
    }
}

fn require_entry(id: &EntryID, date: &str) -> Result<(), OpError> {
    if !id.is_well_formed() {
        return Err(OpError::Invalid("entry ID is not a UUID"));
    }
    let well_dated = date.len() == 10
        && date.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });
    if well_dated {
        Ok(())
    } else {
        Err(OpError::Invalid("entry date is not YYYY-MM-DD"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
