//! Thread-settings specs: the field bundle, read status, and subscription.

use crate::ids::{MessageID, ThreadID, UserID};
use crate::message::{MessageContent, MessageInfo};
use crate::ops::DmOperation;
use crate::result::{
    Applicability, InapplicabilityReason, NotificationsCreationData, OperationResult, UpdateInfo,
};
use crate::thread::ThreadSettingsChanges;

use super::{previews_for, DmOpSpec, ProcessError, SpecContext};

/// One message per changed field, with the deterministic per-field ID
/// `<prefix>/<field>`. Fields whose message already landed (duplicate
/// delivery) are skipped.
pub(super) fn settings_messages(
    ctx: &SpecContext<'_>,
    thread_id: &ThreadID,
    editor_id: &UserID,
    time: u64,
    changes: &ThreadSettingsChanges,
    changed_fields: &[&'static str],
    prefix: &MessageID,
) -> Vec<MessageInfo> {
    changed_fields
        .iter()
        .filter_map(|field| {
            let id = MessageID::from_prefix(prefix, field);
            if ctx.store.fetch_message(&id).is_some() {
                return None;
            }
            let value = match *field {
                "name" => serde_json::json!(changes.name),
                "description" => serde_json::json!(changes.description),
                "color" => serde_json::json!(changes.color),
                "avatar" => serde_json::to_value(&changes.avatar).unwrap_or_default(),
                _ => serde_json::Value::Null,
            };
            Some(MessageInfo {
                id,
                thread_id: thread_id.clone(),
                creator_id: editor_id.clone(),
                time,
                content: MessageContent::ChangeSettings {
                    field: (*field).to_string(),
                    value,
                },
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// change_thread_settings
// ---------------------------------------------------------------------------

pub(super) struct ChangeThreadSettingsSpec;

impl DmOpSpec for ChangeThreadSettingsSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::ChangeThreadSettings(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_settings",
            });
        };
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        };
        if !thread.is_member(&op.editor_id) {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingMembership {
                    thread_id: op.thread_id.clone(),
                    user_id: op.editor_id.clone(),
                },
            ));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::ChangeThreadSettings(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_settings",
            });
        };
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(OperationResult::empty());
        };
        let (next, changed) = thread.with_settings(&op.changes, op.time);
        if changed.is_empty() {
            return Ok(OperationResult::empty());
        }
        let messages = settings_messages(
            ctx,
            &op.thread_id,
            &op.editor_id,
            op.time,
            &op.changes,
            &changed,
            &op.message_ids_prefix,
        );
        let notification_data = previews_for(&op.thread_id, &messages, ctx.viewer_id);
        Ok(OperationResult {
            new_messages: messages,
            updates: vec![UpdateInfo::UpdateThread { thread: next }],
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

// ---------------------------------------------------------------------------
// change_thread_read_status
// ---------------------------------------------------------------------------

pub(super) struct ChangeThreadReadStatusSpec;

impl ChangeThreadReadStatusSpec {
    fn notification(
        op: &crate::ops::ChangeThreadReadStatusOp,
    ) -> Option<NotificationsCreationData> {
        if op.unread {
            Some(NotificationsCreationData::BadgeUpdate {
                thread_id: op.thread_id.clone(),
            })
        } else {
            // Marking read withdraws delivered notifications, even when the
            // local state write turns out to be superseded.
            Some(NotificationsCreationData::Rescind {
                thread_id: op.thread_id.clone(),
                time: op.time,
            })
        }
    }
}

impl DmOpSpec for ChangeThreadReadStatusSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::ChangeThreadReadStatus(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_read_status",
            });
        };
        // Read status is viewer-local state; only the viewer's own devices
        // may change it.
        if &op.creator_id != ctx.viewer_id {
            return Ok(Applicability::Impossible(InapplicabilityReason::Invalid));
        }
        if ctx.store.fetch_thread(&op.thread_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::ChangeThreadReadStatus(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_read_status",
            });
        };
        let notification_data = Self::notification(op);
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(OperationResult::empty());
        };
        let updates = match thread.with_unread(op.unread, op.time) {
            Some(_) => vec![UpdateInfo::UpdateThreadReadStatus {
                thread_id: op.thread_id.clone(),
                unread: op.unread,
                time: op.time,
            }],
            None => Vec::new(),
        };
        Ok(OperationResult {
            new_messages: Vec::new(),
            updates,
            blob_ops: Vec::new(),
            notification_data,
        })
    }

    fn notification_data(
        &self,
        op: &DmOperation,
        _ctx: &SpecContext<'_>,
    ) -> Result<Option<NotificationsCreationData>, ProcessError> {
        let DmOperation::ChangeThreadReadStatus(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_read_status",
            });
        };
        Ok(Self::notification(op))
    }
}

// ---------------------------------------------------------------------------
// change_thread_subscription
// ---------------------------------------------------------------------------

pub(super) struct ChangeThreadSubscriptionSpec;

impl DmOpSpec for ChangeThreadSubscriptionSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::ChangeThreadSubscription(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_subscription",
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
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::ChangeThreadSubscription(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_subscription",
            });
        };
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(OperationResult::empty());
        };
        let mut next = match thread.with_subscription(&op.creator_id, op.subscription, op.time) {
            Some(next) => next,
            None => return Ok(OperationResult::empty()),
        };
        if &op.creator_id == ctx.viewer_id {
            next.current_user.subscription = op.subscription;
        }
        Ok(OperationResult {
            new_messages: Vec::new(),
            updates: vec![UpdateInfo::UpdateThread { thread: next }],
            blob_ops: Vec::new(),
            notification_data: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{ChangeThreadReadStatusOp, ChangeThreadSettingsOp, ChangeThreadSubscriptionOp};
    use crate::specs::create_thread::new_thread_info;
    use crate::store::{LocalStore, MemoryStore, StaticIdentityResolver};
    use crate::thread::{ThreadSubscription, ThreadType};

    const T1: &str = "11111111-1111-4111-8111-111111111111";
    const PREFIX: &str = "22222222-2222-4222-8222-222222222222";

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

    #[test]
    fn test_settings_change_produces_per_field_messages() {
        let viewer = UserID::new("U2");
        let mut store = seeded_store();
        let identities = StaticIdentityResolver::default();
        let op = DmOperation::ChangeThreadSettings(ChangeThreadSettingsOp {
            thread_id: ThreadID::new(T1),
            editor_id: UserID::new("U1"),
            time: 200,
            changes: ThreadSettingsChanges {
                name: Some("demo".into()),
                color: Some("5c9f5f".into()),
                ..Default::default()
            },
            message_ids_prefix: MessageID::new(PREFIX),
        });
        let result = {
            let ctx = SpecContext {
                viewer_id: &viewer,
                store: &store,
                identities: &identities,
            };
            ChangeThreadSettingsSpec.apply(&op, &ctx).unwrap()
        };
        assert_eq!(result.new_messages.len(), 2);
        let ids: Vec<&str> = result.new_messages.iter().map(|m| m.id.as_str()).collect();
        assert!(ids.contains(&format!("{PREFIX}/name").as_str()));
        assert!(ids.contains(&format!("{PREFIX}/color").as_str()));
        store.merge(&result.new_messages, &result.updates);

        // Duplicate delivery: every field now gated, result empty
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        let replay = ChangeThreadSettingsSpec.apply(&op, &ctx).unwrap();
        assert!(replay.is_empty());
    }

    #[test]
    fn test_read_status_gating_and_rescind() {
        let viewer = UserID::new("U2");
        let store = seeded_store();
        let identities = StaticIdentityResolver::default();
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        // Equal to the stored timestamp: no update, rescind still computed
        let stale = DmOperation::ChangeThreadReadStatus(ChangeThreadReadStatusOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U2"),
            time: 100,
            unread: false,
        });
        let result = ChangeThreadReadStatusSpec.apply(&stale, &ctx).unwrap();
        assert!(result.updates.is_empty());
        assert!(matches!(
            result.notification_data,
            Some(NotificationsCreationData::Rescind { time: 100, .. })
        ));
        // Strictly newer: exactly one read-status update
        let fresh = DmOperation::ChangeThreadReadStatus(ChangeThreadReadStatusOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U2"),
            time: 150,
            unread: false,
        });
        let result = ChangeThreadReadStatusSpec.apply(&fresh, &ctx).unwrap();
        assert_eq!(result.updates.len(), 1);
        assert!(matches!(
            result.updates[0],
            UpdateInfo::UpdateThreadReadStatus {
                unread: false,
                time: 150,
                ..
            }
        ));
    }

    #[test]
    fn test_read_status_from_other_user_is_invalid() {
        let viewer = UserID::new("U2");
        let store = seeded_store();
        let identities = StaticIdentityResolver::default();
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        let op = DmOperation::ChangeThreadReadStatus(ChangeThreadReadStatusOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time: 500,
            unread: true,
        });
        assert_eq!(
            ChangeThreadReadStatusSpec
                .check_applicability(&op, &ctx)
                .unwrap(),
            Applicability::Impossible(InapplicabilityReason::Invalid)
        );
    }

    #[test]
    fn test_subscription_requires_membership_and_gates() {
        let viewer = UserID::new("U2");
        let store = seeded_store();
        let identities = StaticIdentityResolver::default();
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        let mut op = ChangeThreadSubscriptionOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U3"),
            time: 200,
            subscription: ThreadSubscription {
                home: false,
                push_notifs: false,
            },
        };
        assert_eq!(
            ChangeThreadSubscriptionSpec
                .check_applicability(&DmOperation::ChangeThreadSubscription(op.clone()), &ctx)
                .unwrap(),
            Applicability::Impossible(InapplicabilityReason::MissingMembership {
                thread_id: ThreadID::new(T1),
                user_id: UserID::new("U3"),
            })
        );
        op.creator_id = UserID::new("U2");
        let result = ChangeThreadSubscriptionSpec
            .apply(&DmOperation::ChangeThreadSubscription(op.clone()), &ctx)
            .unwrap();
        assert_eq!(result.updates.len(), 1);
        // Stale write is a no-op
        op.time = 100;
        let stale = ChangeThreadSubscriptionSpec
            .apply(&DmOperation::ChangeThreadSubscription(op), &ctx)
            .unwrap();
        assert!(stale.is_empty());
    }
}
