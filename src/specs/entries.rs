//! Calendar-entry specs: create, edit, delete.
//!
//! Edits and deletes always record their audit message; the entry's
//! displayed state only changes when the operation wins the
//! `lastUpdatedTime` gate.

use crate::entry::EntryInfo;
use crate::message::{MessageContent, MessageInfo};
use crate::ops::DmOperation;
use crate::result::{Applicability, InapplicabilityReason, OperationResult, UpdateInfo};

use super::{previews_for, DmOpSpec, ProcessError, SpecContext};

// ---------------------------------------------------------------------------
// create_entry
// ---------------------------------------------------------------------------

pub(super) struct CreateEntrySpec;

impl DmOpSpec for CreateEntrySpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::CreateEntry(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "create_entry",
            });
        };
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        };
        if !thread.is_member(&op.creator_id) {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingMembership {
                    thread_id: op.thread_id.clone(),
                    user_id: op.creator_id.clone(),
                },
            ));
        }
        // Entry IDs are minted once; an existing record means duplicate
        // delivery
        if ctx.store.fetch_entry(&op.entry_id).is_some() {
            return Ok(Applicability::Impossible(InapplicabilityReason::Invalid));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::CreateEntry(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "create_entry",
            });
        };
        if ctx.store.fetch_entry(&op.entry_id).is_some() {
            return Ok(OperationResult::empty());
        }
        let entry = EntryInfo {
            id: op.entry_id.clone(),
            thread_id: op.thread_id.clone(),
            entry_date: op.entry_date.clone(),
            text: op.text.clone(),
            creator_id: op.creator_id.clone(),
            creation_time: op.time,
            last_updated_time: op.time,
            deleted: false,
        };
        let message = MessageInfo {
            id: op.message_id.clone(),
            thread_id: op.thread_id.clone(),
            creator_id: op.creator_id.clone(),
            time: op.time,
            content: MessageContent::CreateEntry {
                entry_id: op.entry_id.clone(),
                date: op.entry_date.clone(),
                text: op.text.clone(),
            },
        };
        let notification_data =
            previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
        Ok(OperationResult {
            new_messages: vec![message],
            updates: vec![UpdateInfo::ReplaceEntry { entry }],
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

// ---------------------------------------------------------------------------
// edit_entry
// ---------------------------------------------------------------------------

pub(super) struct EditEntrySpec;

impl DmOpSpec for EditEntrySpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::EditEntry(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "edit_entry",
            });
        };
        if ctx.store.fetch_thread(&op.thread_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        }
        if ctx.store.fetch_entry(&op.entry_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingEntry(op.entry_id.clone()),
            ));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::EditEntry(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "edit_entry",
            });
        };
        if ctx.store.fetch_message(&op.message_id).is_some() {
            return Ok(OperationResult::empty());
        }
        let updates = ctx
            .store
            .fetch_entry(&op.entry_id)
            .and_then(|entry| entry.edited(&op.text, op.time))
            .map(|entry| vec![UpdateInfo::ReplaceEntry { entry }])
            .unwrap_or_default();
        let message = MessageInfo {
            id: op.message_id.clone(),
            thread_id: op.thread_id.clone(),
            creator_id: op.creator_id.clone(),
            time: op.time,
            content: MessageContent::EditEntry {
                entry_id: op.entry_id.clone(),
                date: op.entry_date.clone(),
                text: op.text.clone(),
            },
        };
        let notification_data =
            previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
        Ok(OperationResult {
            new_messages: vec![message],
            updates,
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

// ---------------------------------------------------------------------------
// delete_entry
// ---------------------------------------------------------------------------

pub(super) struct DeleteEntrySpec;

impl DmOpSpec for DeleteEntrySpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::DeleteEntry(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "delete_entry",
            });
        };
        if ctx.store.fetch_thread(&op.thread_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        }
        if ctx.store.fetch_entry(&op.entry_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingEntry(op.entry_id.clone()),
            ));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::DeleteEntry(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "delete_entry",
            });
        };
        if ctx.store.fetch_message(&op.message_id).is_some() {
            return Ok(OperationResult::empty());
        }
        let updates = ctx
            .store
            .fetch_entry(&op.entry_id)
            .and_then(|entry| entry.deleted_at(op.time))
            .map(|entry| vec![UpdateInfo::ReplaceEntry { entry }])
            .unwrap_or_default();
        let message = MessageInfo {
            id: op.message_id.clone(),
            thread_id: op.thread_id.clone(),
            creator_id: op.creator_id.clone(),
            time: op.time,
            content: MessageContent::DeleteEntry {
                entry_id: op.entry_id.clone(),
                date: op.entry_date.clone(),
                text: op.prev_text.clone(),
            },
        };
        let notification_data =
            previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
        Ok(OperationResult {
            new_messages: vec![message],
            updates,
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EntryID, MessageID, ThreadID, UserID};
    use crate::ops::{CreateEntryOp, EditEntryOp};
    use crate::specs::create_thread::new_thread_info;
    use crate::store::{LocalStore, MemoryStore, StaticIdentityResolver};
    use crate::thread::ThreadType;

    const T1: &str = "11111111-1111-4111-8111-111111111111";
    const E1: &str = "88888888-8888-4888-8888-888888888888";

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_thread(new_thread_info(
            &ThreadID::new(T1),
            ThreadType::Local,
            &UserID::new("U1"),
            &[UserID::new("U2")],
            100,
            &UserID::new("U2"),
            None,
            None,
        ));
        store
    }

    fn create_op() -> DmOperation {
        DmOperation::CreateEntry(CreateEntryOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time: 200,
            entry_id: EntryID::new(E1),
            entry_date: "2025-08-01".into(),
            text: "standup".into(),
            message_id: MessageID::new("22222222-2222-4222-8222-222222222222"),
        })
    }

    fn edit_op(time: u64, text: &str, message_id: &str) -> DmOperation {
        DmOperation::EditEntry(EditEntryOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time,
            entry_id: EntryID::new(E1),
            entry_date: "2025-08-01".into(),
            creation_time: 200,
            text: text.into(),
            message_id: MessageID::new(message_id),
        })
    }

    #[test]
    fn test_create_then_duplicate_create_is_invalid() {
        let viewer = UserID::new("U2");
        let identities = StaticIdentityResolver::default();
        let mut store = seeded_store();
        let result = {
            let ctx = SpecContext {
                viewer_id: &viewer,
                store: &store,
                identities: &identities,
            };
            CreateEntrySpec.apply(&create_op(), &ctx).unwrap()
        };
        assert_eq!(result.new_messages.len(), 1);
        assert_eq!(result.updates.len(), 1);
        store.merge(&result.new_messages, &result.updates);
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        assert_eq!(
            CreateEntrySpec
                .check_applicability(&create_op(), &ctx)
                .unwrap(),
            Applicability::Impossible(InapplicabilityReason::Invalid)
        );
    }

    #[test]
    fn test_edit_before_entry_exists_queues() {
        let viewer = UserID::new("U2");
        let identities = StaticIdentityResolver::default();
        let store = seeded_store();
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        assert_eq!(
            EditEntrySpec
                .check_applicability(&edit_op(300, "retro", "33333333-3333-4333-8333-333333333333"), &ctx)
                .unwrap(),
            Applicability::Impossible(InapplicabilityReason::MissingEntry(EntryID::new(E1)))
        );
    }

    #[test]
    fn test_stale_edit_records_audit_message_only() {
        let viewer = UserID::new("U2");
        let identities = StaticIdentityResolver::default();
        let mut store = seeded_store();
        let result = {
            let ctx = SpecContext {
                viewer_id: &viewer,
                store: &store,
                identities: &identities,
            };
            CreateEntrySpec.apply(&create_op(), &ctx).unwrap()
        };
        store.merge(&result.new_messages, &result.updates);

        // Edit older than the entry's lastUpdatedTime: message lands, state
        // does not move
        let stale = edit_op(150, "older text", "33333333-3333-4333-8333-333333333333");
        let result = {
            let ctx = SpecContext {
                viewer_id: &viewer,
                store: &store,
                identities: &identities,
            };
            EditEntrySpec.apply(&stale, &ctx).unwrap()
        };
        assert_eq!(result.new_messages.len(), 1);
        assert!(result.updates.is_empty());
        store.merge(&result.new_messages, &result.updates);
        let entry = store.fetch_entry(&EntryID::new(E1)).unwrap();
        assert_eq!(entry.text, "standup");

        // Newer edit moves the displayed state
        let fresh = edit_op(400, "retro", "44444444-4444-4444-8444-444444444444");
        let result = {
            let ctx = SpecContext {
                viewer_id: &viewer,
                store: &store,
                identities: &identities,
            };
            EditEntrySpec.apply(&fresh, &ctx).unwrap()
        };
        assert_eq!(result.updates.len(), 1);
        store.merge(&result.new_messages, &result.updates);
        let entry = store.fetch_entry(&EntryID::new(E1)).unwrap();
        assert_eq!(entry.text, "retro");
        assert_eq!(entry.last_updated_time, 400);
    }
}
