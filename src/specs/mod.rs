//! Per-variant operation specifications and the registry.
//!
//! Each variant has one `DmOpSpec` implementation: a pure applicability
//! check plus an apply function that returns effect descriptions. Specs
//! never write to the store; the orchestrator merges their results.
//!
//! `spec_for` is a total match over `OpType`; adding a variant without
//! registering a spec is a compile error, not a runtime gap.

use thiserror::Error;

use crate::ops::{DmOperation, OpType};
use crate::result::{Applicability, NotificationsCreationData, OperationResult};
use crate::store::{IdentityResolver, LocalStore};
use crate::ids::UserID;

mod create_sidebar;
mod create_thread;
mod entries;
mod membership;
mod messages;
mod relationship;
mod settings;

pub use create_thread::thread_info_from_details;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// A spec was handed an operation of the wrong variant. Dispatch bug,
    /// not a data problem.
    #[error("spec for `{expected}` received a different operation variant")]
    WrongVariant { expected: &'static str },
}

/// Read-only view of the world a spec may consult.
pub struct SpecContext<'a> {
    pub viewer_id: &'a UserID,
    pub store: &'a dyn LocalStore,
    pub identities: &'a dyn IdentityResolver,
}

/// Contract implemented once per operation variant.
pub trait DmOpSpec: Sync {
    /// Whether inapplicable instances should wait in the retry queue. False
    /// for media-referencing sends, where a stale retry could re-trigger
    /// redundant uploads.
    fn supports_auto_retry(&self) -> bool {
        true
    }

    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError>;

    /// Produce the operation's effects. Must be logically idempotent: when
    /// every write the operation describes is already superseded, the
    /// result is empty, not an error.
    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError>;

    /// Notification payload for this operation, independent of whether the
    /// local apply changed anything. Used directly for send-only
    /// submissions, which skip `apply`.
    fn notification_data(
        &self,
        _op: &DmOperation,
        _ctx: &SpecContext<'_>,
    ) -> Result<Option<NotificationsCreationData>, ProcessError> {
        Ok(None)
    }
}

/// The registry: a total function from type tag to spec.
pub fn spec_for(op_type: OpType) -> &'static dyn DmOpSpec {
    match op_type {
        OpType::CreateThread => &create_thread::CreateThreadSpec,
        OpType::CreateSidebar => &create_sidebar::CreateSidebarSpec,
        OpType::SendTextMessage => &messages::SendTextMessageSpec,
        OpType::SendMultimediaMessage => &messages::SendMultimediaMessageSpec,
        OpType::SendReactionMessage => &messages::SendReactionMessageSpec,
        OpType::SendEditMessage => &messages::SendEditMessageSpec,
        OpType::SendDeleteMessage => &messages::SendDeleteMessageSpec,
        OpType::AddMembers => &membership::AddMembersSpec,
        OpType::AddViewerToThreadMembers => &membership::AddViewerToThreadMembersSpec,
        OpType::ChangeThreadSettingsAndAddViewer => {
            &membership::ChangeThreadSettingsAndAddViewerSpec
        }
        OpType::RemoveMembers => &membership::RemoveMembersSpec,
        OpType::LeaveThread => &membership::LeaveThreadSpec,
        OpType::ChangeThreadSettings => &settings::ChangeThreadSettingsSpec,
        OpType::ChangeThreadReadStatus => &settings::ChangeThreadReadStatusSpec,
        OpType::ChangeThreadSubscription => &settings::ChangeThreadSubscriptionSpec,
        OpType::CreateEntry => &entries::CreateEntrySpec,
        OpType::EditEntry => &entries::EditEntrySpec,
        OpType::DeleteEntry => &entries::DeleteEntrySpec,
        OpType::UpdateRelationship => &relationship::UpdateRelationshipSpec,
        OpType::ChangeRelationship => &relationship::ChangeRelationshipSpec,
    }
}

/// Preview-notification data for a batch of freshly-created messages:
/// only messages authored by someone other than the viewer notify.
pub(crate) fn previews_for(
    thread_id: &crate::ids::ThreadID,
    messages: &[crate::message::MessageInfo],
    viewer_id: &UserID,
) -> Option<NotificationsCreationData> {
    let previewable: Vec<crate::message::MessageInfo> = messages
        .iter()
        .filter(|m| &m.creator_id != viewer_id)
        .cloned()
        .collect();
    if previewable.is_empty() {
        None
    } else {
        Some(NotificationsCreationData::MessagePreviews {
            thread_id: thread_id.clone(),
            messages: previewable,
        })
    }
}
