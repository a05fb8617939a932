//! Membership specs: adding members, the viewer-adding variants that carry
//! a thread snapshot, removals, and leaving.
//!
//! Membership resolves per member: each user's `isMember` timestamp gates
//! adds and removes independently, so concurrent churn on the same thread
//! converges no matter the delivery order.

use crate::ids::{MessageID, ThreadID, UserID};
use crate::message::{MessageContent, MessageInfo};
use crate::ops::DmOperation;
use crate::result::{
    Applicability, InapplicabilityReason, OperationResult, TruncationStatus, UpdateInfo,
};
use crate::thread::{ThreadInfo, ThreadSubscription};

use super::create_thread::thread_info_from_details;
use super::settings::settings_messages;
use super::{previews_for, DmOpSpec, ProcessError, SpecContext};

/// Fold per-member adds over a thread. Returns the updated thread and
/// whether any member actually changed.
fn add_members_lww(thread: &ThreadInfo, added: &[UserID], time: u64) -> (ThreadInfo, bool) {
    let mut current = thread.clone();
    let mut any = false;
    for user in added {
        if let Some(next) = current.with_member_added(user, time, ThreadSubscription::joined()) {
            current = next;
            any = true;
        }
    }
    (current, any)
}

/// The update for a thread the viewer just left or was removed from:
/// delete it, unless it is a sidebar whose parent is still resolvable (the
/// sidebar stays visible through its parent).
fn viewer_departure_update(ctx: &SpecContext<'_>, next: ThreadInfo) -> UpdateInfo {
    if next.thread_type.is_sidebar() {
        if let Some(parent) = &next.parent_thread_id {
            if ctx.store.fetch_thread(parent).is_some() {
                return UpdateInfo::UpdateThread { thread: next };
            }
        }
    }
    UpdateInfo::DeleteThread {
        thread_id: next.id.clone(),
    }
}

fn membership_message(
    thread_id: &ThreadID,
    editor_id: &UserID,
    time: u64,
    message_id: &MessageID,
    content: MessageContent,
) -> MessageInfo {
    MessageInfo {
        id: message_id.clone(),
        thread_id: thread_id.clone(),
        creator_id: editor_id.clone(),
        time,
        content,
    }
}

// ---------------------------------------------------------------------------
// add_members
// ---------------------------------------------------------------------------

pub(super) struct AddMembersSpec;

impl DmOpSpec for AddMembersSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::AddMembers(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "add_members",
            });
        };
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        };
        // A delivered membership message means this is a duplicate; let
        // apply resolve it to an empty result instead of queueing.
        if !thread.is_member(&op.editor_id)
            && ctx.store.fetch_message(&op.message_id).is_none()
        {
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
        let DmOperation::AddMembers(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "add_members",
            });
        };
        if ctx.store.fetch_message(&op.message_id).is_some() {
            return Ok(OperationResult::empty());
        }
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(OperationResult::empty());
        };
        let (next, any) = add_members_lww(&thread, &op.added_user_ids, op.time);
        let message = membership_message(
            &op.thread_id,
            &op.editor_id,
            op.time,
            &op.message_id,
            MessageContent::AddMembers {
                added_user_ids: op.added_user_ids.clone(),
            },
        );
        let notification_data =
            previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
        Ok(OperationResult {
            new_messages: vec![message],
            updates: if any {
                vec![UpdateInfo::UpdateThread { thread: next }]
            } else {
                Vec::new()
            },
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

// ---------------------------------------------------------------------------
// add_viewer_to_thread_members
// ---------------------------------------------------------------------------

pub(super) struct AddViewerToThreadMembersSpec;

impl DmOpSpec for AddViewerToThreadMembersSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::AddViewerToThreadMembers(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "add_viewer_to_thread_members",
            });
        };
        // This variant exists to be applicable without a local thread
        // record (the snapshot travels with it), but it must actually be
        // about the viewer.
        if op.added_user_ids.contains(ctx.viewer_id) {
            Ok(Applicability::Possible)
        } else {
            Ok(Applicability::Impossible(InapplicabilityReason::Invalid))
        }
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::AddViewerToThreadMembers(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "add_viewer_to_thread_members",
            });
        };
        let message = op.message_id.as_ref().and_then(|id| {
            if ctx.store.fetch_message(id).is_some() {
                return None;
            }
            Some(membership_message(
                &op.thread_id,
                &op.editor_id,
                op.time,
                id,
                MessageContent::AddMembers {
                    added_user_ids: op.added_user_ids.clone(),
                },
            ))
        });
        let notification_data = message
            .as_ref()
            .and_then(|m| previews_for(&op.thread_id, std::slice::from_ref(m), ctx.viewer_id));

        match ctx.store.fetch_thread(&op.thread_id) {
            Some(thread) => {
                let (next, any) = add_members_lww(&thread, &op.added_user_ids, op.time);
                if !any && message.is_none() {
                    return Ok(OperationResult::empty());
                }
                Ok(OperationResult {
                    new_messages: message.into_iter().collect(),
                    updates: if any {
                        vec![UpdateInfo::UpdateThread { thread: next }]
                    } else {
                        Vec::new()
                    },
                    blob_ops: Vec::new(),
                    notification_data,
                })
            }
            None => {
                let mut thread = thread_info_from_details(&op.existing_thread_details, ctx.viewer_id);
                let (with_added, _) = add_members_lww(&thread, &op.added_user_ids, op.time);
                thread = with_added;
                thread.current_user.unread = &op.editor_id != ctx.viewer_id;
                thread.timestamps.current_user.unread = op.time;
                Ok(OperationResult {
                    new_messages: Vec::new(),
                    updates: vec![UpdateInfo::JoinThread {
                        thread,
                        messages: message.into_iter().collect(),
                        // The snapshot carries no history
                        truncation: TruncationStatus::Truncated,
                    }],
                    blob_ops: Vec::new(),
                    notification_data,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// change_thread_settings_and_add_viewer
// ---------------------------------------------------------------------------

pub(super) struct ChangeThreadSettingsAndAddViewerSpec;

impl DmOpSpec for ChangeThreadSettingsAndAddViewerSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::ChangeThreadSettingsAndAddViewer(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_settings_and_add_viewer",
            });
        };
        if op.added_user_ids.contains(ctx.viewer_id) {
            Ok(Applicability::Possible)
        } else {
            Ok(Applicability::Impossible(InapplicabilityReason::Invalid))
        }
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::ChangeThreadSettingsAndAddViewer(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_thread_settings_and_add_viewer",
            });
        };
        let (base, fresh) = match ctx.store.fetch_thread(&op.thread_id) {
            Some(thread) => (thread, false),
            None => {
                let mut thread =
                    thread_info_from_details(&op.existing_thread_details, ctx.viewer_id);
                thread.current_user.unread = &op.editor_id != ctx.viewer_id;
                thread.timestamps.current_user.unread = op.time;
                (thread, true)
            }
        };
        let (with_members, members_changed) = add_members_lww(&base, &op.added_user_ids, op.time);
        let (next, changed_fields) = with_members.with_settings(&op.changes, op.time);
        let messages = settings_messages(
            ctx,
            &op.thread_id,
            &op.editor_id,
            op.time,
            &op.changes,
            &changed_fields,
            &op.message_ids_prefix,
        );
        let notification_data = previews_for(&op.thread_id, &messages, ctx.viewer_id);

        if fresh {
            return Ok(OperationResult {
                new_messages: Vec::new(),
                updates: vec![UpdateInfo::JoinThread {
                    thread: next,
                    messages,
                    truncation: TruncationStatus::Truncated,
                }],
                blob_ops: Vec::new(),
                notification_data,
            });
        }
        if !members_changed && changed_fields.is_empty() && messages.is_empty() {
            return Ok(OperationResult::empty());
        }
        Ok(OperationResult {
            new_messages: messages,
            updates: if members_changed || !changed_fields.is_empty() {
                vec![UpdateInfo::UpdateThread { thread: next }]
            } else {
                Vec::new()
            },
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

// ---------------------------------------------------------------------------
// remove_members
// ---------------------------------------------------------------------------

pub(super) struct RemoveMembersSpec;

impl DmOpSpec for RemoveMembersSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::RemoveMembers(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "remove_members",
            });
        };
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        };
        if !thread.is_member(&op.editor_id)
            && ctx.store.fetch_message(&op.message_id).is_none()
        {
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
        let DmOperation::RemoveMembers(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "remove_members",
            });
        };
        if ctx.store.fetch_message(&op.message_id).is_some() {
            return Ok(OperationResult::empty());
        }
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(OperationResult::empty());
        };
        let mut current = thread;
        let mut any = false;
        for user in &op.removed_user_ids {
            if let Some(next) = current.with_member_removed(user, op.time) {
                current = next;
                any = true;
            }
        }
        let viewer_removed = any
            && op.removed_user_ids.contains(ctx.viewer_id)
            && !current.is_member(ctx.viewer_id);
        let message = membership_message(
            &op.thread_id,
            &op.editor_id,
            op.time,
            &op.message_id,
            MessageContent::RemoveMembers {
                removed_user_ids: op.removed_user_ids.clone(),
            },
        );
        let notification_data =
            previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
        let updates = if viewer_removed {
            vec![viewer_departure_update(ctx, current)]
        } else if any {
            vec![UpdateInfo::UpdateThread { thread: current }]
        } else {
            Vec::new()
        };
        Ok(OperationResult {
            new_messages: vec![message],
            updates,
            blob_ops: Vec::new(),
            notification_data,
        })
    }
}

// ---------------------------------------------------------------------------
// leave_thread
// ---------------------------------------------------------------------------

pub(super) struct LeaveThreadSpec;

impl DmOpSpec for LeaveThreadSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::LeaveThread(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "leave_thread",
            });
        };
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
        let DmOperation::LeaveThread(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "leave_thread",
            });
        };
        if ctx.store.fetch_message(&op.message_id).is_some() {
            return Ok(OperationResult::empty());
        }
        let Some(thread) = ctx.store.fetch_thread(&op.thread_id) else {
            return Ok(OperationResult::empty());
        };
        let departed = thread.with_member_removed(&op.editor_id, op.time);
        let message = membership_message(
            &op.thread_id,
            &op.editor_id,
            op.time,
            &op.message_id,
            MessageContent::LeaveThread,
        );
        let notification_data =
            previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
        let updates = match departed {
            Some(next) if &op.editor_id == ctx.viewer_id => {
                vec![viewer_departure_update(ctx, next)]
            }
            Some(next) => vec![UpdateInfo::UpdateThread { thread: next }],
            None => Vec::new(),
        };
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
