//! `create_sidebar`: spin a child thread off one message of a parent
//! thread. Produces two messages: a mirror of the source message at the
//! operation's time and the creation record one tick later, so the mirror
//! always sorts first.

use crate::message::{MessageContent, MessageInfo};
use crate::ops::DmOperation;
use crate::result::{
    Applicability, InapplicabilityReason, OperationResult, TruncationStatus, UpdateInfo,
};
use crate::thread::ThreadType;

use super::create_thread::new_thread_info;
use super::{previews_for, DmOpSpec, ProcessError, SpecContext};

pub(super) struct CreateSidebarSpec;

impl DmOpSpec for CreateSidebarSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::CreateSidebar(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "create_sidebar",
            });
        };
        if ctx.store.fetch_thread(&op.thread_id).is_some() {
            return Ok(Applicability::Impossible(InapplicabilityReason::Invalid));
        }
        if ctx.store.fetch_thread(&op.parent_thread_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.parent_thread_id.clone()),
            ));
        }
        if ctx.store.fetch_message(&op.source_message_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingMessage(op.source_message_id.clone()),
            ));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::CreateSidebar(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "create_sidebar",
            });
        };
        // Applicability guaranteed the source message exists; a replay that
        // lost it again yields an empty result rather than a panic.
        let Some(source_message) = ctx.store.fetch_message(&op.source_message_id) else {
            return Ok(OperationResult::empty());
        };

        let mut thread = new_thread_info(
            &op.thread_id,
            ThreadType::ThickSidebar,
            &op.creator_id,
            &op.member_ids,
            op.time,
            ctx.viewer_id,
            Some(op.parent_thread_id.clone()),
            Some(op.source_message_id.clone()),
        );
        thread.containing_thread_id = Some(op.parent_thread_id.clone());

        let sidebar_source = MessageInfo {
            id: op.new_sidebar_source_message_id.clone(),
            thread_id: op.thread_id.clone(),
            creator_id: op.creator_id.clone(),
            time: op.time,
            content: MessageContent::SidebarSource {
                source_message_id: op.source_message_id.clone(),
            },
        };
        let create_sidebar = MessageInfo {
            id: op.new_create_sidebar_message_id.clone(),
            thread_id: op.thread_id.clone(),
            creator_id: op.creator_id.clone(),
            time: op.time + 1,
            content: MessageContent::CreateSidebar {
                source_message_author: source_message.creator_id.clone(),
                initial_thread_state: Box::new(thread.clone()),
            },
        };
        let messages = vec![sidebar_source, create_sidebar];
        let notification_data = previews_for(&op.thread_id, &messages, ctx.viewer_id);
        Ok(OperationResult {
            new_messages: Vec::new(),
            updates: vec![UpdateInfo::JoinThread {
                thread,
                messages,
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
    use crate::ids::{MessageID, ThreadID, UserID};
    use crate::ops::{CreateSidebarOp, CreateThreadOp};
    use crate::specs::{spec_for, SpecContext};
    use crate::ops::OpType;
    use crate::store::{LocalStore, MemoryStore, StaticIdentityResolver};

    const PARENT: &str = "11111111-1111-4111-8111-111111111111";
    const SIDEBAR: &str = "55555555-5555-4555-8555-555555555555";
    const SOURCE_MSG: &str = "22222222-2222-4222-8222-222222222222";

    fn sidebar_op() -> DmOperation {
        DmOperation::CreateSidebar(CreateSidebarOp {
            thread_id: ThreadID::new(SIDEBAR),
            creator_id: UserID::new("U2"),
            time: 300,
            parent_thread_id: ThreadID::new(PARENT),
            member_ids: vec![UserID::new("U1")],
            source_message_id: MessageID::new(SOURCE_MSG),
            new_sidebar_source_message_id: MessageID::new(
                "66666666-6666-4666-8666-666666666666",
            ),
            new_create_sidebar_message_id: MessageID::new(
                "77777777-7777-4777-8777-777777777777",
            ),
        })
    }

    fn seed_parent(store: &mut MemoryStore, viewer: &UserID) {
        let identities = StaticIdentityResolver::default();
        let op = DmOperation::CreateThread(CreateThreadOp {
            thread_id: ThreadID::new(PARENT),
            creator_id: UserID::new("U1"),
            time: 100,
            thread_type: crate::thread::ThreadType::Local,
            member_ids: vec![UserID::new("U2")],
            new_message_id: MessageID::new("44444444-4444-4444-8444-444444444444"),
        });
        let result = {
            let ctx = SpecContext {
                viewer_id: viewer,
                store: &*store,
                identities: &identities,
            };
            spec_for(OpType::CreateThread).apply(&op, &ctx).unwrap()
        };
        store.merge(&result.new_messages, &result.updates);
        store.insert_message(crate::message::MessageInfo {
            id: MessageID::new(SOURCE_MSG),
            thread_id: ThreadID::new(PARENT),
            creator_id: UserID::new("U1"),
            time: 200,
            content: MessageContent::Text { text: "root".into() },
        });
    }

    #[test]
    fn test_missing_parent_then_missing_source() {
        let viewer = UserID::new("U1");
        let mut store = MemoryStore::new();
        let identities = StaticIdentityResolver::default();
        let op = sidebar_op();
        {
            let ctx = SpecContext {
                viewer_id: &viewer,
                store: &store,
                identities: &identities,
            };
            assert_eq!(
                CreateSidebarSpec.check_applicability(&op, &ctx).unwrap(),
                Applicability::Impossible(InapplicabilityReason::MissingThread(ThreadID::new(
                    PARENT
                )))
            );
        }
        seed_parent(&mut store, &viewer);
        // Drop the source message to hit the second gate
        let store2 = {
            let mut s = MemoryStore::new();
            if let Some(t) = store.fetch_thread(&ThreadID::new(PARENT)) {
                s.insert_thread(t);
            }
            s
        };
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store2,
            identities: &identities,
        };
        assert_eq!(
            CreateSidebarSpec.check_applicability(&op, &ctx).unwrap(),
            Applicability::Impossible(InapplicabilityReason::MissingMessage(MessageID::new(
                SOURCE_MSG
            )))
        );
    }

    #[test]
    fn test_sidebar_messages_and_ordering() {
        let viewer = UserID::new("U1");
        let mut store = MemoryStore::new();
        seed_parent(&mut store, &viewer);
        let identities = StaticIdentityResolver::default();
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        let result = CreateSidebarSpec.apply(&sidebar_op(), &ctx).unwrap();
        let UpdateInfo::JoinThread {
            thread, messages, ..
        } = &result.updates[0]
        else {
            panic!("expected a thread-join update");
        };
        assert_eq!(thread.thread_type, ThreadType::ThickSidebar);
        assert_eq!(thread.parent_thread_id, Some(ThreadID::new(PARENT)));
        assert_eq!(thread.source_message_id, Some(MessageID::new(SOURCE_MSG)));
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            messages[0].content,
            MessageContent::SidebarSource { .. }
        ));
        assert_eq!(messages[0].time, 300);
        assert_eq!(messages[1].time, 301);
        match &messages[1].content {
            MessageContent::CreateSidebar {
                source_message_author,
                ..
            } => assert_eq!(source_message_author, &UserID::new("U1")),
            other => panic!("unexpected content: {other:?}"),
        }
        // Viewer U1 did not create the sidebar, so it notifies
        assert!(result.notification_data.is_some());
    }
}
