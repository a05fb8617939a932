//! The orchestrator.
//!
//! One submission runs validate → applicability → apply → merge →
//! replay → reconcile → fan-out → notify. Failures are isolated per
//! operation; a bad operation never blocks the rest of a batch.
//!
//! Replay: merging one operation's effects can resolve dependencies other
//! operations are queued behind. Those are drained and pushed through the
//! same pipeline immediately, applicability re-checked, and their effects
//! folded into the triggering outcome.

use std::collections::{BTreeMap, VecDeque};

use log::{debug, warn};

use crate::fanout::{compute_recipients, outbound_envelopes, OutboundEnvelope, RecipientSpec};
use crate::ids::{ThreadID, UserID};
use crate::message::MessageInfo;
use crate::ops::{now_ms, DmOperation, OpError};
use crate::queue::{DependencyKey, RetryQueue, QUEUED_OPERATION_TTL_MS};
use crate::result::{
    Applicability, BlobOp, InapplicabilityReason, NotificationsCreationData, OperationResult,
    UpdateInfo,
};
use crate::specs::{spec_for, ProcessError, SpecContext};
use crate::store::{IdentityResolver, LocalStore, PeerDirectory};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Fanout(#[from] crate::fanout::FanoutError),
}

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum OperationRequest {
    Outbound {
        op: DmOperation,
        recipients: RecipientSpec,
        /// Fan out and notify without touching local state. Used when the
        /// local application already happened through another path.
        send_only: bool,
    },
    Inbound {
        op: DmOperation,
    },
}

impl OperationRequest {
    fn op(&self) -> &DmOperation {
        match self {
            OperationRequest::Outbound { op, .. } => op,
            OperationRequest::Inbound { op } => op,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DropReason {
    /// Failed the wire validator; never retried.
    Malformed(String),
    /// Permanently inapplicable.
    Invalid,
    /// Transiently inapplicable, but the variant does not auto-retry.
    AutoRetryUnsupported(InapplicabilityReason),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
    Applied,
    Queued(DependencyKey),
    Dropped(DropReason),
}

/// Everything one submission produced, replayed operations included.
#[derive(Clone, Debug, Default)]
pub struct ProcessOutcome {
    pub disposition: Option<Disposition>,
    pub new_messages: Vec<MessageInfo>,
    pub updates: Vec<UpdateInfo>,
    pub blob_ops: Vec<BlobOp>,
    pub notifications: Vec<NotificationsCreationData>,
    pub envelopes: Vec<OutboundEnvelope>,
}

impl ProcessOutcome {
    fn absorb(&mut self, result: OperationResult) {
        self.new_messages.extend(result.new_messages);
        self.updates.extend(result.updates);
        self.blob_ops.extend(result.blob_ops);
        if let Some(data) = result.notification_data {
            self.notifications.push(data);
        }
    }

    /// Every message this outcome introduced, whether standalone or bundled
    /// in a thread-join update.
    fn all_messages(&self) -> Vec<&MessageInfo> {
        let mut all: Vec<&MessageInfo> = self.new_messages.iter().collect();
        for update in &self.updates {
            if let UpdateInfo::JoinThread { messages, .. } = update {
                all.extend(messages.iter());
            }
        }
        all
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine<S, I, P> {
    viewer_id: UserID,
    store: S,
    identities: I,
    peers: P,
    queue: RetryQueue,
}

impl<S, I, P> Engine<S, I, P>
where
    S: LocalStore,
    I: IdentityResolver,
    P: PeerDirectory,
{
    pub fn new(viewer_id: UserID, store: S, identities: I, peers: P) -> Engine<S, I, P> {
        Engine {
            viewer_id,
            store,
            identities,
            peers,
            queue: RetryQueue::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Decode an inbound wire payload and process it. Malformed input is a
    /// drop, not an error.
    pub fn process_inbound_wire(
        &mut self,
        value: serde_json::Value,
    ) -> Result<ProcessOutcome, EngineError> {
        match DmOperation::from_wire(value) {
            Ok(op) => self.process(OperationRequest::Inbound { op }),
            Err(err) => {
                warn!("dropping malformed inbound operation: {err}");
                Ok(ProcessOutcome {
                    disposition: Some(Disposition::Dropped(DropReason::Malformed(
                        err.to_string(),
                    ))),
                    ..ProcessOutcome::default()
                })
            }
        }
    }

    pub fn process(&mut self, request: OperationRequest) -> Result<ProcessOutcome, EngineError> {
        let mut outcome = ProcessOutcome::default();
        let op = request.op().clone();

        if let Err(err) = op.validate() {
            warn!("dropping invalid {} operation: {err}", op.op_type());
            outcome.disposition = Some(Disposition::Dropped(drop_reason(err)));
            return Ok(outcome);
        }
        let spec = spec_for(op.op_type());

        // Fan-out proceeds independently of local applicability: an
        // outbound operation that queues locally still reaches peers.
        let mut send_only = false;
        if let OperationRequest::Outbound {
            recipients,
            send_only: only,
            ..
        } = &request
        {
            let targets =
                compute_recipients(recipients, &self.viewer_id, &self.store, &self.peers);
            outcome.envelopes = outbound_envelopes(&op, &targets, spec.supports_auto_retry())?;
            send_only = *only;
        }

        if send_only {
            let ctx = SpecContext {
                viewer_id: &self.viewer_id,
                store: &self.store,
                identities: &self.identities,
            };
            if let Some(data) = spec.notification_data(&op, &ctx)? {
                outcome.notifications.push(data);
            }
            outcome.disposition = Some(Disposition::Applied);
            return Ok(outcome);
        }

        let applicability = {
            let ctx = SpecContext {
                viewer_id: &self.viewer_id,
                store: &self.store,
                identities: &self.identities,
            };
            spec.check_applicability(&op, &ctx)?
        };
        match applicability {
            Applicability::Possible => {
                self.apply_and_replay(op, &mut outcome)?;
                outcome.disposition = Some(Disposition::Applied);
                self.reconcile(&mut outcome);
            }
            Applicability::Impossible(InapplicabilityReason::Invalid) => {
                warn!("dropping inapplicable {} operation", op.op_type());
                outcome.disposition = Some(Disposition::Dropped(DropReason::Invalid));
            }
            Applicability::Impossible(reason) => {
                let Some(key) = DependencyKey::for_reason(&reason) else {
                    outcome.disposition = Some(Disposition::Dropped(DropReason::Invalid));
                    return Ok(outcome);
                };
                if spec.supports_auto_retry() {
                    self.queue.enqueue(op, key.clone(), now_ms());
                    outcome.disposition = Some(Disposition::Queued(key));
                } else {
                    warn!(
                        "dropping {} operation waiting on {key}: variant does not auto-retry",
                        op.op_type()
                    );
                    outcome.disposition =
                        Some(Disposition::Dropped(DropReason::AutoRetryUnsupported(reason)));
                }
            }
        }
        Ok(outcome)
    }

    /// Process several submissions, isolating failures per operation.
    pub fn process_batch(
        &mut self,
        requests: Vec<OperationRequest>,
    ) -> Vec<Result<ProcessOutcome, EngineError>> {
        requests
            .into_iter()
            .map(|request| self.process(request))
            .collect()
    }

    /// Discard queued operations older than the TTL. Driven by a
    /// `QueuePruner` in production and by explicit clocks in tests.
    pub fn prune_queue(&mut self, now: u64) -> usize {
        self.queue
            .prune(now.saturating_sub(QUEUED_OPERATION_TTL_MS))
            .len()
    }

    // -----------------------------------------------------------------------
    // Pipeline internals
    // -----------------------------------------------------------------------

    /// Apply one applicable operation, merge its effects, then drain and
    /// replay everything queued behind dependencies those effects resolved.
    ///
    /// The triggering operation's errors propagate; a failure in a replayed
    /// entry is logged and skipped instead, because the entries behind it
    /// were already drained from the queue and must not be lost.
    fn apply_and_replay(
        &mut self,
        op: DmOperation,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), EngineError> {
        let mut worklist = VecDeque::from([op]);
        let mut replaying = false;
        while let Some(op) = worklist.pop_front() {
            let ty = op.op_type();
            match self.apply_one(op, &mut worklist, outcome) {
                Ok(()) => {}
                Err(err) if replaying => {
                    warn!("skipping failed replayed {ty} operation: {err}");
                }
                Err(err) => return Err(err.into()),
            }
            replaying = true;
        }
        Ok(())
    }

    fn apply_one(
        &mut self,
        op: DmOperation,
        worklist: &mut VecDeque<DmOperation>,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), ProcessError> {
        let spec = spec_for(op.op_type());
        let applicability = {
            let ctx = SpecContext {
                viewer_id: &self.viewer_id,
                store: &self.store,
                identities: &self.identities,
            };
            spec.check_applicability(&op, &ctx)?
        };
        match applicability {
            Applicability::Possible => {
                let result = {
                    let ctx = SpecContext {
                        viewer_id: &self.viewer_id,
                        store: &self.store,
                        identities: &self.identities,
                    };
                    spec.apply(&op, &ctx)?
                };
                debug!(
                    "applied {} operation: {} message(s), {} update(s)",
                    op.op_type(),
                    result.new_messages.len(),
                    result.updates.len()
                );
                self.store.merge(&result.new_messages, &result.updates);
                for key in resolved_keys(&result) {
                    for entry in self.queue.drain(&key) {
                        worklist.push_back(entry.operation);
                    }
                }
                outcome.absorb(result);
            }
            Applicability::Impossible(InapplicabilityReason::Invalid) => {
                warn!("dropping replayed {} operation: invalid", op.op_type());
            }
            Applicability::Impossible(reason) => {
                // Still missing a different dependency: back in the
                // queue under the new key.
                if let Some(key) = DependencyKey::for_reason(&reason) {
                    if spec.supports_auto_retry() {
                        self.queue.enqueue(op, key, now_ms());
                    }
                }
            }
        }
        Ok(())
    }

    /// Cross-cutting pass over every message the outcome introduced,
    /// grouped by thread: bump reply counters and flip unread using the
    /// maximum non-viewer message time, so an older replayed message can
    /// never shadow a newer read-status write.
    fn reconcile(&mut self, outcome: &mut ProcessOutcome) {
        let mut replies: BTreeMap<ThreadID, u64> = BTreeMap::new();
        let mut unread_time: BTreeMap<ThreadID, u64> = BTreeMap::new();
        for message in outcome.all_messages() {
            if message.content.included_in_replies_count() {
                *replies.entry(message.thread_id.clone()).or_default() += 1;
            }
            if message.creator_id != self.viewer_id {
                let max = unread_time.entry(message.thread_id.clone()).or_default();
                if message.time > *max {
                    *max = message.time;
                }
            }
        }

        let mut reconcile_updates: Vec<UpdateInfo> = Vec::new();
        for (thread_id, count) in replies {
            if let Some(mut thread) = self.store.fetch_thread(&thread_id) {
                thread.replies_count += count;
                reconcile_updates.push(UpdateInfo::UpdateThread { thread });
            }
        }
        for (thread_id, time) in unread_time {
            let Some(thread) = self.store.fetch_thread(&thread_id) else {
                continue;
            };
            if thread.with_unread(true, time).is_some() {
                reconcile_updates.push(UpdateInfo::UpdateThreadReadStatus {
                    thread_id,
                    unread: true,
                    time,
                });
            }
        }
        if !reconcile_updates.is_empty() {
            self.store.merge(&[], &reconcile_updates);
            outcome.updates.extend(reconcile_updates);
        }
    }
}

fn drop_reason(err: OpError) -> DropReason {
    DropReason::Malformed(err.to_string())
}

/// Dependency keys an operation's effects made resolvable.
fn resolved_keys(result: &OperationResult) -> Vec<DependencyKey> {
    let mut keys = Vec::new();
    for message in &result.new_messages {
        keys.push(DependencyKey::Message(message.id.clone()));
    }
    for update in &result.updates {
        match update {
            UpdateInfo::JoinThread {
                thread, messages, ..
            } => {
                keys.push(DependencyKey::Thread(thread.id.clone()));
                for message in messages {
                    keys.push(DependencyKey::Message(message.id.clone()));
                }
                for user in thread.members.keys() {
                    keys.push(DependencyKey::Membership {
                        thread_id: thread.id.clone(),
                        user_id: user.clone(),
                    });
                }
            }
            UpdateInfo::UpdateThread { thread } => {
                for user in thread.members.keys() {
                    keys.push(DependencyKey::Membership {
                        thread_id: thread.id.clone(),
                        user_id: user.clone(),
                    });
                }
            }
            UpdateInfo::ReplaceEntry { entry } => {
                keys.push(DependencyKey::Entry(entry.id.clone()));
            }
            UpdateInfo::DeleteThread { .. } | UpdateInfo::UpdateThreadReadStatus { .. } => {}
        }
    }
    keys
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{DeviceID, EntryID, MessageID};
    use crate::ops::{
        ChangeThreadSubscriptionOp, CreateSidebarOp, CreateThreadOp, EditEntryOp,
        SendEditMessageOp, SendTextMessageOp,
    };
    use crate::store::{
        LocalStore, MemoryStore, PeerDevice, StaticIdentityResolver, StaticPeerDirectory,
    };
    use crate::thread::ThreadType;
    use serde_json::json;

    const T1: &str = "11111111-1111-4111-8111-111111111111";
    const SIDEBAR: &str = "55555555-5555-4555-8555-555555555555";
    const CREATE_MSG: &str = "44444444-4444-4444-8444-444444444444";
    const TEXT_MSG: &str = "22222222-2222-4222-8222-222222222222";

    type TestEngine = Engine<MemoryStore, StaticIdentityResolver, StaticPeerDirectory>;

    fn engine(viewer: &str) -> TestEngine {
        let peers = StaticPeerDirectory {
            devices: vec![
                PeerDevice {
                    user_id: UserID::new("U1"),
                    device_id: DeviceID::new("d-u1"),
                },
                PeerDevice {
                    user_id: UserID::new("U2"),
                    device_id: DeviceID::new("d-u2"),
                },
                PeerDevice {
                    user_id: UserID::new(viewer),
                    device_id: DeviceID::new("d-self"),
                },
            ],
            current: DeviceID::new("d-self"),
        };
        Engine::new(
            UserID::new(viewer),
            MemoryStore::new(),
            StaticIdentityResolver::default(),
            peers,
        )
    }

    fn create_thread_op() -> DmOperation {
        DmOperation::CreateThread(CreateThreadOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time: 100,
            thread_type: ThreadType::Local,
            member_ids: vec![UserID::new("U2")],
            new_message_id: MessageID::new(CREATE_MSG),
        })
    }

    fn text_op(time: u64, message_id: &str, text: &str) -> DmOperation {
        DmOperation::SendTextMessage(SendTextMessageOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time,
            message_id: MessageID::new(message_id),
            text: text.into(),
        })
    }

    fn sidebar_op() -> DmOperation {
        DmOperation::CreateSidebar(CreateSidebarOp {
            thread_id: ThreadID::new(SIDEBAR),
            creator_id: UserID::new("U1"),
            time: 300,
            parent_thread_id: ThreadID::new(T1),
            member_ids: vec![UserID::new("U2")],
            source_message_id: MessageID::new(TEXT_MSG),
            new_sidebar_source_message_id: MessageID::new(
                "66666666-6666-4666-8666-666666666666",
            ),
            new_create_sidebar_message_id: MessageID::new(
                "77777777-7777-4777-8777-777777777777",
            ),
        })
    }

    fn inbound(op: DmOperation) -> OperationRequest {
        OperationRequest::Inbound { op }
    }

    #[test]
    fn test_end_to_end_create_thread_as_other_member() {
        let mut engine = engine("U2");
        let outcome = engine.process(inbound(create_thread_op())).unwrap();
        assert_eq!(outcome.disposition, Some(Disposition::Applied));
        let thread = engine.store().fetch_thread(&ThreadID::new(T1)).unwrap();
        assert!(thread.current_user.unread);
        let messages = engine.store().messages_for_thread(&ThreadID::new(T1));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].time, 100);
    }

    #[test]
    fn test_end_to_end_text_message_flips_unread() {
        let mut engine = engine("U2");
        engine.process(inbound(create_thread_op())).unwrap();
        let outcome = engine
            .process(inbound(text_op(200, TEXT_MSG, "hi")))
            .unwrap();
        assert_eq!(outcome.disposition, Some(Disposition::Applied));
        assert_eq!(outcome.new_messages.len(), 1);
        assert!(outcome.updates.iter().any(|u| matches!(
            u,
            UpdateInfo::UpdateThreadReadStatus {
                unread: true,
                time: 200,
                ..
            }
        )));
        let thread = engine.store().fetch_thread(&ThreadID::new(T1)).unwrap();
        assert!(thread.current_user.unread);
        assert_eq!(thread.timestamps.current_user.unread, 200);
        assert_eq!(thread.replies_count, 1);
    }

    #[test]
    fn test_queue_replay_equivalence_for_sidebar() {
        // Out of order: sidebar first, then its parent thread and source
        let mut out_of_order = engine("U2");
        let queued = out_of_order.process(inbound(sidebar_op())).unwrap();
        assert_eq!(
            queued.disposition,
            Some(Disposition::Queued(DependencyKey::Thread(ThreadID::new(
                T1
            ))))
        );
        assert_eq!(out_of_order.queued_len(), 1);
        out_of_order.process(inbound(create_thread_op())).unwrap();
        // Sidebar replays, re-queues behind the source message, then lands
        out_of_order
            .process(inbound(text_op(200, TEXT_MSG, "root")))
            .unwrap();
        assert_eq!(out_of_order.queued_len(), 0);

        // In order
        let mut in_order = engine("U2");
        in_order.process(inbound(create_thread_op())).unwrap();
        in_order
            .process(inbound(text_op(200, TEXT_MSG, "root")))
            .unwrap();
        in_order.process(inbound(sidebar_op())).unwrap();

        let a = out_of_order
            .store()
            .fetch_thread(&ThreadID::new(SIDEBAR))
            .unwrap();
        let b = in_order
            .store()
            .fetch_thread(&ThreadID::new(SIDEBAR))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(
            out_of_order.store().messages_for_thread(&ThreadID::new(SIDEBAR)),
            in_order.store().messages_for_thread(&ThreadID::new(SIDEBAR))
        );
    }

    #[test]
    fn test_ttl_pruning_removes_stale_entries() {
        let mut engine = engine("U2");
        engine.process(inbound(create_thread_op())).unwrap();
        let queued = engine
            .process(inbound(DmOperation::EditEntry(EditEntryOp {
                thread_id: ThreadID::new(T1),
                creator_id: UserID::new("U1"),
                time: 400,
                entry_id: EntryID::new("88888888-8888-4888-8888-888888888888"),
                entry_date: "2025-08-01".into(),
                creation_time: 200,
                text: "edited".into(),
                message_id: MessageID::new("33333333-3333-4333-8333-333333333333"),
            })))
            .unwrap();
        assert!(matches!(queued.disposition, Some(Disposition::Queued(_))));
        assert_eq!(engine.queued_len(), 1);
        let dropped = engine.prune_queue(now_ms() + QUEUED_OPERATION_TTL_MS + 1);
        assert_eq!(dropped, 1);
        assert_eq!(engine.queued_len(), 0);
    }

    #[test]
    fn test_replay_continues_past_a_dropped_entry() {
        let mut engine = engine("U2");
        // Both wait on the thread. The edit targets the thread's creation
        // message, which is not an editable text message, so it drops on
        // replay; the subscription change drained behind it must still land.
        let edit = DmOperation::SendEditMessage(SendEditMessageOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time: 400,
            message_id: MessageID::new("aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa"),
            target_message_id: MessageID::new(CREATE_MSG),
            text: "edited".into(),
        });
        let subscription = DmOperation::ChangeThreadSubscription(ChangeThreadSubscriptionOp {
            thread_id: ThreadID::new(T1),
            creator_id: UserID::new("U1"),
            time: 400,
            subscription: crate::thread::ThreadSubscription {
                home: false,
                push_notifs: false,
            },
        });
        engine.process(inbound(edit)).unwrap();
        engine.process(inbound(subscription)).unwrap();
        assert_eq!(engine.queued_len(), 2);
        engine.process(inbound(create_thread_op())).unwrap();
        assert_eq!(engine.queued_len(), 0);
        let thread = engine.store().fetch_thread(&ThreadID::new(T1)).unwrap();
        assert!(!thread.members[&UserID::new("U1")].subscription.home);
    }

    #[test]
    fn test_no_auto_retry_variants_drop_instead_of_queueing() {
        let mut engine = engine("U2");
        // Thread does not exist; text sends never queue
        let outcome = engine.process(inbound(text_op(200, TEXT_MSG, "hi"))).unwrap();
        assert!(matches!(
            outcome.disposition,
            Some(Disposition::Dropped(DropReason::AutoRetryUnsupported(_)))
        ));
        assert_eq!(engine.queued_len(), 0);
    }

    #[test]
    fn test_batch_isolates_malformed_operations() {
        let mut engine = engine("U2");
        let bad = engine
            .process_inbound_wire(json!({"type": "teleport_thread"}))
            .unwrap();
        assert!(matches!(
            bad.disposition,
            Some(Disposition::Dropped(DropReason::Malformed(_)))
        ));
        let outcomes = engine.process_batch(vec![inbound(create_thread_op())]);
        assert!(outcomes[0].is_ok());
        assert!(engine.store().fetch_thread(&ThreadID::new(T1)).is_some());
    }

    #[test]
    fn test_outbound_fanout_excludes_self_device() {
        let mut engine = engine("U1");
        engine.process(inbound(create_thread_op())).unwrap();
        let outcome = engine
            .process(OperationRequest::Outbound {
                op: text_op(200, TEXT_MSG, "hi"),
                recipients: RecipientSpec::AllThreadMembers(ThreadID::new(T1)),
                send_only: false,
            })
            .unwrap();
        assert_eq!(outcome.disposition, Some(Disposition::Applied));
        let devices: Vec<&str> = outcome
            .envelopes
            .iter()
            .map(|e| e.device_id.as_str())
            .collect();
        assert_eq!(devices, vec!["d-u1", "d-u2"]);
        assert!(outcome.envelopes.iter().all(|e| !e.supports_auto_retry));
    }

    #[test]
    fn test_send_only_skips_local_state() {
        let mut engine = engine("U2");
        engine.process(inbound(create_thread_op())).unwrap();
        let before = engine.store().messages_for_thread(&ThreadID::new(T1)).len();
        let outcome = engine
            .process(OperationRequest::Outbound {
                op: text_op(500, "99999999-9999-4999-8999-999999999999", "ping"),
                recipients: RecipientSpec::SelfDevices,
                send_only: true,
            })
            .unwrap();
        assert_eq!(outcome.disposition, Some(Disposition::Applied));
        assert!(outcome.new_messages.is_empty());
        assert!(outcome.updates.is_empty());
        assert!(!outcome.notifications.is_empty());
        assert_eq!(
            engine.store().messages_for_thread(&ThreadID::new(T1)).len(),
            before
        );
    }

    #[test]
    fn test_reconciliation_uses_maximum_message_time() {
        let mut engine = engine("U2");
        engine.process(inbound(create_thread_op())).unwrap();
        // Sidebar creation emits two non-viewer messages at 300 and 301
        engine.process(inbound(text_op(200, TEXT_MSG, "root"))).unwrap();
        let outcome = engine.process(inbound(sidebar_op())).unwrap();
        let flip_times: Vec<u64> = outcome
            .updates
            .iter()
            .filter_map(|u| match u {
                UpdateInfo::UpdateThreadReadStatus {
                    thread_id,
                    unread: true,
                    time,
                } if thread_id == &ThreadID::new(SIDEBAR) => Some(*time),
                _ => None,
            })
            .collect();
        assert_eq!(flip_times, vec![301]);
    }

    #[test]
    fn test_duplicate_delivery_is_a_no_op() {
        let mut engine = engine("U2");
        engine.process(inbound(create_thread_op())).unwrap();
        let first = engine.process(inbound(text_op(200, TEXT_MSG, "hi"))).unwrap();
        assert_eq!(first.new_messages.len(), 1);
        let second = engine.process(inbound(text_op(200, TEXT_MSG, "hi"))).unwrap();
        assert!(second.new_messages.is_empty());
        assert!(second.updates.is_empty());
        assert_eq!(
            engine.store().messages_for_thread(&ThreadID::new(T1)).len(),
            2 // CREATE_THREAD + one text
        );
    }
}
