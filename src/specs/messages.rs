//! Message-send specs: text, multimedia, reaction, edit, delete.
//!
//! Messages are additive, so these specs are applicable whenever the thread
//! (and, for targeted variants, the target message) is locally known. A
//! message ID already present in the store means duplicate delivery; the
//! apply is then an empty result.

use crate::ids::MessageID;
use crate::message::{MessageContent, MessageInfo};
use crate::ops::DmOperation;
use crate::result::{
    Applicability, BlobOp, BlobOpDirection, BlobOpKind, InapplicabilityReason, OperationResult,
};

use super::{previews_for, DmOpSpec, ProcessError, SpecContext};

fn thread_gate(
    ctx: &SpecContext<'_>,
    thread_id: &crate::ids::ThreadID,
) -> Option<InapplicabilityReason> {
    if ctx.store.fetch_thread(thread_id).is_none() {
        Some(InapplicabilityReason::MissingThread(thread_id.clone()))
    } else {
        None
    }
}

fn target_gate(ctx: &SpecContext<'_>, message_id: &MessageID) -> Option<InapplicabilityReason> {
    if ctx.store.fetch_message(message_id).is_none() {
        Some(InapplicabilityReason::MissingMessage(message_id.clone()))
    } else {
        None
    }
}

fn already_delivered(ctx: &SpecContext<'_>, message_id: &MessageID) -> bool {
    ctx.store.fetch_message(message_id).is_some()
}

fn message_result(
    ctx: &SpecContext<'_>,
    message: MessageInfo,
    blob_ops: Vec<BlobOp>,
) -> OperationResult {
    let notification_data = previews_for(
        &message.thread_id,
        std::slice::from_ref(&message),
        ctx.viewer_id,
    );
    OperationResult {
        new_messages: vec![message],
        updates: Vec::new(),
        blob_ops,
        notification_data,
    }
}

// ---------------------------------------------------------------------------
// send_text_message
// ---------------------------------------------------------------------------

pub(super) struct SendTextMessageSpec;

impl DmOpSpec for SendTextMessageSpec {
    fn supports_auto_retry(&self) -> bool {
        false
    }

    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::SendTextMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_text_message",
            });
        };
        match thread_gate(ctx, &op.thread_id) {
            Some(reason) => Ok(Applicability::Impossible(reason)),
            None => Ok(Applicability::Possible),
        }
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::SendTextMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_text_message",
            });
        };
        if already_delivered(ctx, &op.message_id) {
            return Ok(OperationResult::empty());
        }
        Ok(message_result(
            ctx,
            MessageInfo {
                id: op.message_id.clone(),
                thread_id: op.thread_id.clone(),
                creator_id: op.creator_id.clone(),
                time: op.time,
                content: MessageContent::Text {
                    text: op.text.clone(),
                },
            },
            Vec::new(),
        ))
    }

    fn notification_data(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Option<crate::result::NotificationsCreationData>, ProcessError> {
        let DmOperation::SendTextMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_text_message",
            });
        };
        let message = MessageInfo {
            id: op.message_id.clone(),
            thread_id: op.thread_id.clone(),
            creator_id: op.creator_id.clone(),
            time: op.time,
            content: MessageContent::Text {
                text: op.text.clone(),
            },
        };
        Ok(previews_for(
            &op.thread_id,
            std::slice::from_ref(&message),
            ctx.viewer_id,
        ))
    }
}

// ---------------------------------------------------------------------------
// send_multimedia_message
// ---------------------------------------------------------------------------

pub(super) struct SendMultimediaMessageSpec;

impl DmOpSpec for SendMultimediaMessageSpec {
    fn supports_auto_retry(&self) -> bool {
        false
    }

    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::SendMultimediaMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_multimedia_message",
            });
        };
        match thread_gate(ctx, &op.thread_id) {
            Some(reason) => Ok(Applicability::Impossible(reason)),
            None => Ok(Applicability::Possible),
        }
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::SendMultimediaMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_multimedia_message",
            });
        };
        if already_delivered(ctx, &op.message_id) {
            return Ok(OperationResult::empty());
        }
        // Receivers must register as holders of every referenced blob so it
        // stays alive; the sender already holds them.
        let blob_ops = op
            .media
            .iter()
            .map(|media| BlobOp {
                blob_hash: media.blob_hash.clone(),
                kind: BlobOpKind::EstablishHolder,
                direction: BlobOpDirection::InboundOnly,
            })
            .collect();
        Ok(message_result(
            ctx,
            MessageInfo {
                id: op.message_id.clone(),
                thread_id: op.thread_id.clone(),
                creator_id: op.creator_id.clone(),
                time: op.time,
                content: MessageContent::Multimedia {
                    media: op.media.clone(),
                },
            },
            blob_ops,
        ))
    }
}

// ---------------------------------------------------------------------------
// send_reaction_message
// ---------------------------------------------------------------------------

pub(super) struct SendReactionMessageSpec;

impl DmOpSpec for SendReactionMessageSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::SendReactionMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_reaction_message",
            });
        };
        if let Some(reason) = thread_gate(ctx, &op.thread_id) {
            return Ok(Applicability::Impossible(reason));
        }
        if let Some(reason) = target_gate(ctx, &op.target_message_id) {
            return Ok(Applicability::Impossible(reason));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::SendReactionMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_reaction_message",
            });
        };
        if already_delivered(ctx, &op.message_id) {
            return Ok(OperationResult::empty());
        }
        Ok(message_result(
            ctx,
            MessageInfo {
                id: op.message_id.clone(),
                thread_id: op.thread_id.clone(),
                creator_id: op.creator_id.clone(),
                time: op.time,
                content: MessageContent::Reaction {
                    target_message_id: op.target_message_id.clone(),
                    reaction: op.reaction.clone(),
                    action: op.action,
                },
            },
            Vec::new(),
        ))
    }
}

// ---------------------------------------------------------------------------
// send_edit_message
// ---------------------------------------------------------------------------

pub(super) struct SendEditMessageSpec;

impl DmOpSpec for SendEditMessageSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::SendEditMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_edit_message",
            });
        };
        if let Some(reason) = thread_gate(ctx, &op.thread_id) {
            return Ok(Applicability::Impossible(reason));
        }
        let Some(target) = ctx.store.fetch_message(&op.target_message_id) else {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingMessage(op.target_message_id.clone()),
            ));
        };
        // Only the author may edit, and only text messages are editable.
        let editable = matches!(target.content, MessageContent::Text { .. })
            && target.creator_id == op.creator_id;
        if editable {
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
        let DmOperation::SendEditMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_edit_message",
            });
        };
        if already_delivered(ctx, &op.message_id) {
            return Ok(OperationResult::empty());
        }
        Ok(message_result(
            ctx,
            MessageInfo {
                id: op.message_id.clone(),
                thread_id: op.thread_id.clone(),
                creator_id: op.creator_id.clone(),
                time: op.time,
                content: MessageContent::Edit {
                    target_message_id: op.target_message_id.clone(),
                    text: op.text.clone(),
                },
            },
            Vec::new(),
        ))
    }
}

// ---------------------------------------------------------------------------
// send_delete_message
// ---------------------------------------------------------------------------

pub(super) struct SendDeleteMessageSpec;

impl DmOpSpec for SendDeleteMessageSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::SendDeleteMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_delete_message",
            });
        };
        if let Some(reason) = thread_gate(ctx, &op.thread_id) {
            return Ok(Applicability::Impossible(reason));
        }
        if let Some(reason) = target_gate(ctx, &op.target_message_id) {
            return Ok(Applicability::Impossible(reason));
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::SendDeleteMessage(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "send_delete_message",
            });
        };
        if already_delivered(ctx, &op.message_id) {
            return Ok(OperationResult::empty());
        }
        Ok(message_result(
            ctx,
            MessageInfo {
                id: op.message_id.clone(),
                thread_id: op.thread_id.clone(),
                creator_id: op.creator_id.clone(),
                time: op.time,
                content: MessageContent::Delete {
                    target_message_id: op.target_message_id.clone(),
                },
            },
            Vec::new(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
