//! Relationship specs.
//!
//! `update_relationship` is a plain message-bearing operation.
//! `change_relationship` additionally resolves both parties through the
//! identity service; any resolution failure, transport failures included,
//! makes the operation permanently invalid rather than queued. That
//! conflation matches the long-standing client behavior and is kept as-is.

use log::warn;

use crate::message::{MessageContent, MessageInfo, RelationshipAction};
use crate::ops::{DmOperation, RelationshipOp};
use crate::result::{Applicability, InapplicabilityReason, OperationResult};

use super::{previews_for, DmOpSpec, ProcessError, SpecContext};

fn relationship_result(
    ctx: &SpecContext<'_>,
    op: &RelationshipOp,
) -> Result<OperationResult, ProcessError> {
    if ctx.store.fetch_message(&op.message_id).is_some() {
        return Ok(OperationResult::empty());
    }
    let message = MessageInfo {
        id: op.message_id.clone(),
        thread_id: op.thread_id.clone(),
        creator_id: op.creator_id.clone(),
        time: op.time,
        content: MessageContent::UpdateRelationship {
            operation: op.operation,
            target_id: op.target_user_id.clone(),
        },
    };
    let notification_data =
        previews_for(&op.thread_id, std::slice::from_ref(&message), ctx.viewer_id);
    Ok(OperationResult {
        new_messages: vec![message],
        updates: Vec::new(),
        blob_ops: Vec::new(),
        notification_data,
    })
}

// ---------------------------------------------------------------------------
// update_relationship
// ---------------------------------------------------------------------------

pub(super) struct UpdateRelationshipSpec;

impl DmOpSpec for UpdateRelationshipSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::UpdateRelationship(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "update_relationship",
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
        let DmOperation::UpdateRelationship(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "update_relationship",
            });
        };
        relationship_result(ctx, op)
    }
}

// ---------------------------------------------------------------------------
// change_relationship
// ---------------------------------------------------------------------------

pub(super) struct ChangeRelationshipSpec;

impl DmOpSpec for ChangeRelationshipSpec {
    fn check_applicability(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<Applicability, ProcessError> {
        let DmOperation::ChangeRelationship(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_relationship",
            });
        };
        if ctx.store.fetch_thread(&op.thread_id).is_none() {
            return Ok(Applicability::Impossible(
                InapplicabilityReason::MissingThread(op.thread_id.clone()),
            ));
        }
        let parties = [op.creator_id.clone(), op.target_user_id.clone()];
        let identities = match ctx.identities.find_user_identities(&parties) {
            Ok(identities) => identities,
            Err(err) => {
                warn!("identity resolution failed for change_relationship: {err}");
                return Ok(Applicability::Impossible(InapplicabilityReason::Invalid));
            }
        };
        for party in &parties {
            let Some(identity) = identities.get(party) else {
                return Ok(Applicability::Impossible(InapplicabilityReason::Invalid));
            };
            if op.operation == RelationshipAction::FarcasterMutual
                && identity.farcaster_id.is_none()
            {
                return Ok(Applicability::Impossible(InapplicabilityReason::Invalid));
            }
        }
        Ok(Applicability::Possible)
    }

    fn apply(
        &self,
        op: &DmOperation,
        ctx: &SpecContext<'_>,
    ) -> Result<OperationResult, ProcessError> {
        let DmOperation::ChangeRelationship(op) = op else {
            return Err(ProcessError::WrongVariant {
                expected: "change_relationship",
            });
        };
        relationship_result(ctx, op)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MessageID, ThreadID, UserID};
    use crate::specs::create_thread::new_thread_info;
    use crate::store::{MemoryStore, StaticIdentityResolver, UserIdentity};
    use crate::thread::ThreadType;
    use std::collections::HashMap;

    const T1: &str = "11111111-1111-4111-8111-111111111111";

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_thread(new_thread_info(
            &ThreadID::new(T1),
            ThreadType::Personal,
            &UserID::new("U1"),
            &[UserID::new("U2")],
            100,
            &UserID::new("U2"),
            None,
            None,
        ));
        store
    }

    fn relationship(operation: RelationshipAction) -> RelationshipOp {
        RelationshipOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time: 200,
            operation,
            target_user_id: UserID::new("U2"),
            message_id: MessageID::new("22222222-2222-4222-8222-222222222222"),
        }
    }

    fn identity(farcaster: Option<&str>) -> UserIdentity {
        UserIdentity {
            username: "someone".into(),
            farcaster_id: farcaster.map(str::to_string),
        }
    }

    #[test]
    fn test_update_relationship_needs_no_identity() {
        let viewer = UserID::new("U2");
        let store = seeded_store();
        let identities = StaticIdentityResolver::default();
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        let op = DmOperation::UpdateRelationship(relationship(RelationshipAction::RequestSent));
        assert_eq!(
            UpdateRelationshipSpec.check_applicability(&op, &ctx).unwrap(),
            Applicability::Possible
        );
        let result = UpdateRelationshipSpec.apply(&op, &ctx).unwrap();
        assert_eq!(result.new_messages.len(), 1);
        assert!(matches!(
            result.new_messages[0].content,
            MessageContent::UpdateRelationship {
                operation: RelationshipAction::RequestSent,
                ..
            }
        ));
    }

    #[test]
    fn test_change_relationship_unresolved_identity_is_invalid() {
        let viewer = UserID::new("U2");
        let store = seeded_store();
        // Only U1 resolves; U2 is unknown
        let mut map = HashMap::new();
        map.insert(UserID::new("U1"), identity(Some("fc-1")));
        let identities = StaticIdentityResolver { identities: map };
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        let op = DmOperation::ChangeRelationship(relationship(RelationshipAction::RequestSent));
        assert_eq!(
            ChangeRelationshipSpec.check_applicability(&op, &ctx).unwrap(),
            Applicability::Impossible(InapplicabilityReason::Invalid)
        );
    }

    #[test]
    fn test_farcaster_mutual_requires_both_farcaster_ids() {
        let viewer = UserID::new("U2");
        let store = seeded_store();
        let mut map = HashMap::new();
        map.insert(UserID::new("U1"), identity(Some("fc-1")));
        map.insert(UserID::new("U2"), identity(None));
        let identities = StaticIdentityResolver { identities: map };
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        let op =
            DmOperation::ChangeRelationship(relationship(RelationshipAction::FarcasterMutual));
        assert_eq!(
            ChangeRelationshipSpec.check_applicability(&op, &ctx).unwrap(),
            Applicability::Impossible(InapplicabilityReason::Invalid)
        );

        let mut map = HashMap::new();
        map.insert(UserID::new("U1"), identity(Some("fc-1")));
        map.insert(UserID::new("U2"), identity(Some("fc-2")));
        let identities = StaticIdentityResolver { identities: map };
        let ctx = SpecContext {
            viewer_id: &viewer,
            store: &store,
            identities: &identities,
        };
        assert_eq!(
            ChangeRelationshipSpec.check_applicability(&op, &ctx).unwrap(),
            Applicability::Possible
        );
    }
}
