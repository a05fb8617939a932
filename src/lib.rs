//! DM operations engine: peer-to-peer chat mutations without a central
//! source of truth.
//!
//! Operations arrive causally unordered, possibly duplicated, possibly
//! before the state they depend on exists locally. The engine validates
//! them, checks applicability against local state, applies the ones that
//! can land, queues the ones waiting on a dependency, and replays those
//! once the dependency appears. Conflict resolution is per-field,
//! per-member, timestamp-gated last-write-wins.
//!
//! # Module structure
//! - `ids`: UserID, DeviceID, ThreadID, MessageID, EntryID identity types
//! - `ops`: the DmOperation tagged union, wire decode and validation
//! - `thread` / `message` / `entry`: immutable state records with
//!   timestamp-gated update functions
//! - `result`: applicability results and effect descriptions
//! - `specs`: one spec per operation variant plus the total registry
//! - `queue`: dependency-keyed retry queue, TTL pruning, prune scheduler
//! - `store`: external-collaborator traits and the in-memory store
//! - `fanout`: recipient computation and outbound envelopes
//! - `engine`: the orchestrator

pub mod engine;
pub mod entry;
pub mod fanout;
pub mod ids;
pub mod message;
pub mod ops;
pub mod queue;
pub mod result;
pub mod specs;
pub mod store;
pub mod thread;

// Re-export core types for convenience
pub use engine::{
    Disposition, DropReason, Engine, EngineError, OperationRequest, ProcessOutcome,
};
pub use entry::EntryInfo;
pub use fanout::{
    compute_recipients, outbound_envelopes, DeliveryStatus, FanoutError, OutboundEnvelope,
    PeerMessage, RecipientSpec,
};
pub use ids::{DeviceID, EntryID, MessageID, ThreadID, UserID};
pub use message::{Media, MediaType, MessageContent, MessageInfo, ReactionAction, RelationshipAction};
pub use ops::{DmOperation, OpError, OpType};
pub use queue::{
    DependencyKey, QueueEntry, QueuePruner, RetryQueue, FIRST_PRUNING_DELAY_MS,
    PRUNING_FREQUENCY_MS, QUEUED_OPERATION_TTL_MS,
};
pub use result::{
    Applicability, BlobOp, BlobOpDirection, BlobOpKind, InapplicabilityReason,
    NotificationsCreationData, OperationResult, TruncationStatus, UpdateInfo,
};
pub use specs::{spec_for, DmOpSpec, ProcessError, SpecContext};
pub use store::{
    IdentityError, IdentityResolver, LocalStore, MemoryStore, PeerDevice, PeerDirectory,
    StaticIdentityResolver, StaticPeerDirectory, UserIdentity,
};
pub use thread::{
    Avatar, MemberInfo, ThreadCurrentUser, ThreadInfo, ThreadSettingsChanges, ThreadSubscription,
    ThreadTimestamps, ThreadType,
};
