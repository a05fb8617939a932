//! `create_thread`: materialize a brand-new thick thread locally.

use std::collections::BTreeMap;

use crate::ids::ThreadID;
use crate::message::{MessageContent, MessageInfo};
use crate::ops::{DmOperation, ExistingThreadDetails};
use crate::result::{
    Applicability, InapplicabilityReason, OperationResult, TruncationStatus, UpdateInfo,
};
use crate::thread::{
    generate_pending_color, MemberInfo, ThreadCurrentUser, ThreadInfo, ThreadSubscription,
    ThreadTimestamps, ThreadType,
};
use crate::ids::UserID;

use super::{previews_for, DmOpSpec, ProcessError, SpecContext};

/// Build a fresh thread record as of `time`. Every member (creator
/// included) gets the joined subscription and a seeded timestamp; unread is
/// decided by whether the viewer authored the creation.
#[allow(clippy::too_many_arguments)]
pub(crate) fn new_thread_info(
    thread_id: &ThreadID,
    thread_type: ThreadType,
    creator_id: &UserID,
    member_ids: &[UserID],
    time: u64,
    viewer_id: &UserID,
    parent_thread_id: Option<ThreadID>,
    source_message_id: Option<crate::ids::MessageID>,
) -> ThreadInfo {
    let mut all_members: Vec<UserID> = member_ids.to_vec();
    if !all_members.contains(creator_id) {
        all_members.push(creator_id.clone());
    }
    all_members.sort_unstable();
    all_members.dedup();

    let members: BTreeMap<UserID, MemberInfo> = all_members
        .iter()
        .map(|id| {
            (
                id.clone(),
                MemberInfo {
                    is_sender: id == creator_id,
                    subscription: ThreadSubscription::joined(),
                },
            )
        })
        .collect();

    ThreadInfo {
        id: thread_id.clone(),
        thread_type,
        creation_time: time,
        containing_thread_id: parent_thread_id.clone(),
        parent_thread_id,
        source_message_id,
        color: generate_pending_color(&all_members),
        name: None,
        description: None,
        avatar: None,
        members,
        current_user: ThreadCurrentUser {
            unread: creator_id != viewer_id,
            subscription: ThreadSubscription::joined(),
        },
        replies_count: 0,
        pinned_count: 0,
        timestamps: ThreadTimestamps::seeded(time, &all_members),
    }
}

/// Materialize a thread from the snapshot carried by a viewer-adding
/// operation. Timestamps seed at the original creation time, so later
/// targeted writes still win their gates.
pub fn thread_info_from_details(details: &ExistingThreadDetails, viewer_id: &UserID) -> ThreadInfo {
    let mut thread = new_thread_info(
        &details.thread_id,
        details.thread_type,
        &details.creator_id,
        &details.all_member_ids,
        details.creation_time,
        viewer_id,
        details.parent_thread_id.clone(),
        details.source_message_id.clone(),
    );
    thread.containing_thread_id = details.containing_thread_id.clone();
    thread.color = details.color.clone();
    thread.name = details.name.clone();
    thread.description = details.description.clone();
    thread.avatar = details.avatar.clone();
    thread
}

pub(super) struct CreateThreadSpec;

impl DmOpSpec for CreateThreadSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::CreateThread(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "create_thread",
            });
        };
        // Duplicate-delivery guard: the thread ID is minted by the creating
        // device, so an existing record means this create already landed.
        if ctx.store.fetch_thread(&op.thread_id).is_some() {
            return Ok(Applicability::Impossible(InapplicabilityReason::Invalid));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::CreateThread(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "create_thread",
            });
        };
        let thread = new_thread_info(
            &op.thread_id,
            op.thread_type,
            &op.creator_id,
            &op.member_ids,
            op.time,
            ctx.viewer_id,
            None,
            None,
        );
        let message = MessageInfo {
            id: op.new_message_id.clone(),
            thread_id: op.thread_id.clone(),
            creator_id: op.creator_id.clone(),
            time: op.time,
            content: MessageContent::CreateThread {
                initial_thread_state: Box::new(thread.clone()),
            },
        };
        let notification_data = previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
        Ok(OperationResult {
            new_messages: Vec::new(),
            updates: vec![UpdateInfo::JoinThread {
                thread,
                messages: vec![message],
                truncation: TruncationStatus::Exhaustive,
            }],
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MessageID;
    use crate::ops::CreateThreadOp;
    use crate::store::{LocalStore, MemoryStore, StaticIdentityResolver};

    const T1: &str = "11111111-1111-4111-8111-111111111111";
    const M1: &str = "22222222-2222-4222-8222-222222222222";

    fn create_op() -> DmOperation {
        DmOperation::CreateThread(CreateThreadOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time: 100,
            thread_type: ThreadType::Local,
            member_ids: vec![UserID::new("U2")],
            new_message_id: MessageID::new(M1),
        })
    }

    fn ctx<'a>(
        viewer: &'a UserID,
        store: &'a MemoryStore,
        identities: &'a StaticIdentityResolver,
    ) -> SpecContext<'a> {
        SpecContext {
            viewer_id: viewer,
            store,
            identities,
        }
    }

    #[test]
    fn test_create_thread_as_non_creator_viewer() {
        let viewer = UserID::new("U2");
        let store = MemoryStore::new();
        let identities = StaticIdentityResolver::default();
        let ctx = ctx(&viewer, &store, &identities);
        let op = create_op();

        assert_eq!(
            CreateThreadSpec.check_applicability(&op, &ctx).unwrap(),
            Applicability::Possible
        );
        let result = CreateThreadSpec.apply(&op, &ctx).unwrap();
        let UpdateInfo::JoinThread {
            thread,
            messages,
            truncation,
        } = &result.updates[0]
        else {
            panic!("expected a thread-join update");
        };
        assert_eq!(thread.id, ThreadID::new(T1));
        assert!(thread.current_user.unread, "creator != viewer seeds unread");
        assert!(thread.is_member(&UserID::new("U1")));
        assert!(thread.is_member(&UserID::new("U2")));
        assert_eq!(*truncation, TruncationStatus::Exhaustive);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].time, 100);
        assert!(matches!(
            messages[0].content,
            MessageContent::CreateThread { .. }
        ));
        assert!(result.notification_data.is_some());
    }

    #[test]
    fn test_duplicate_create_is_invalid() {
        let viewer = UserID::new("U1");
        let mut store = MemoryStore::new();
        let identities = StaticIdentityResolver::default();
        let op = create_op();
        // Land the thread once
        {
            let ctx = ctx(&viewer, &store, &identities);
            let result = CreateThreadSpec.apply(&op, &ctx).unwrap();
            store.merge(&[], &result.updates);
        }
        let ctx = ctx(&viewer, &store, &identities);
        assert_eq!(
            CreateThreadSpec.check_applicability(&op, &ctx).unwrap(),
            Applicability::Impossible(InapplicabilityReason::Invalid)
        );
    }

    #[test]
    fn test_creator_viewer_gets_no_notification() {
        let viewer = UserID::new("U1");
        let store = MemoryStore::new();
        let identities = StaticIdentityResolver::default();
        let ctx = ctx(&viewer, &store, &identities);
        let result = CreateThreadSpec.apply(&create_op(), &ctx).unwrap();
        assert!(result.notification_data.is_none());
        let UpdateInfo::JoinThread { thread, .. } = &result.updates[0] else {
            panic!("expected a thread-join update");
        };
        assert!(!thread.current_user.unread);
    }
}
