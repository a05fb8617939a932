//! Peer fan-out: recipient computation and outbound envelope assembly.
//!
//! An outbound operation is wrapped in a `DM_OPERATION` peer message and
//! copied once per target device. Encryption happens downstream; the
//! envelopes leave here with plaintext payloads and empty ciphertext.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ids::{DeviceID, ThreadID, UserID};
use crate::ops::{now_ms, DmOperation};
use crate::store::{LocalStore, PeerDevice, PeerDirectory};

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("failed to serialize peer message: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

/// Who an outbound operation goes to. `SomeUsers` covers the mid-creation
/// window where the local thread record is absent or incomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipientSpec {
    SelfDevices,
    AllPeerDevices,
    SomeUsers(Vec<UserID>),
    AllThreadMembers(ThreadID),
}

/// Resolve a recipient spec to target devices. The sending device is always
/// excluded; it already applied the operation locally.
pub fn compute_recipients(
    spec: &RecipientSpec,
    viewer_id: &UserID,
    store: &dyn LocalStore,
    directory: &dyn PeerDirectory,
) -> Vec<PeerDevice> {
    let current = directory.current_device_id();
    let devices = directory.peer_devices();
    let keep = |device: &PeerDevice| -> bool {
        if device.device_id == current {
            return false;
        }
        match spec {
            RecipientSpec::SelfDevices => &device.user_id == viewer_id,
            RecipientSpec::AllPeerDevices => true,
            RecipientSpec::SomeUsers(users) => users.contains(&device.user_id),
            RecipientSpec::AllThreadMembers(thread_id) => store
                .fetch_thread(thread_id)
                .map(|thread| thread.is_member(&device.user_id))
                .unwrap_or(false),
        }
    };
    devices.into_iter().filter(keep).collect()
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Wire wrapper for everything sent device-to-device. Operations are the
/// only variant this engine produces.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum PeerMessage {
    #[serde(rename = "DM_OPERATION")]
    DmOperation { op: DmOperation },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Stored locally and awaiting transport confirmation.
    Persisted,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    /// Fresh per-envelope ID, distinct from any operation message ID.
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(rename = "userID")]
    pub user_id: UserID,
    #[serde(rename = "deviceID")]
    pub device_id: DeviceID,
    pub timestamp: u64,
    pub plaintext: String,
    /// Filled by the encryption layer downstream.
    pub ciphertext: String,
    pub status: DeliveryStatus,
    /// Copied from the operation's spec so the transport knows whether to
    /// keep retrying delivery indefinitely.
    pub supports_auto_retry: bool,
}

/// One envelope per target device, all sharing the serialized operation.
pub fn outbound_envelopes(
    operation: &DmOperation,
    recipients: &[PeerDevice],
    supports_auto_retry: bool,
) -> Result<Vec<OutboundEnvelope>, FanoutError> {
    let plaintext = serde_json::to_string(&PeerMessage::DmOperation {
        op: operation.clone(),
    })?;
    let timestamp = now_ms();
    Ok(recipients
        .iter()
        .map(|device| OutboundEnvelope {
            message_id: Uuid::new_v4().to_string(),
            user_id: device.user_id.clone(),
            device_id: device.device_id.clone(),
            timestamp,
            plaintext: plaintext.clone(),
            ciphertext: String::new(),
            status: DeliveryStatus::Persisted,
            supports_auto_retry,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
