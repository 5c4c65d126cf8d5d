//! External collaborator seams: messaging and broadcast.
//!
//! The settlement core never delivers anything itself. After a verdict
//! commits it hands a [`MessagePush`] to the messaging collaborator
//! (at-least-once, deduplicated by `reference_key` on the far side) and
//! fires an event at the broadcast collaborator. Both calls happen only
//! after the mutation succeeded, so a rolled-back operation never
//! notifies anyone.

use std::sync::Mutex;

use peerdesk_types::UserId;
use serde::{Deserialize, Serialize};

/// What kind of message is being pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    OrderVerdict,
    TransferVerdict,
    WithdrawVerdict,
    RechargeVerdict,
}

/// One message for one user, keyed for dedup on the collaborator side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePush {
    /// Repeated pushes with the same key update in place.
    pub reference_key: String,
    pub kind: MessageKind,
    pub content: String,
}

/// Messaging collaborator: per-user message delivery.
pub trait Messenger: Send + Sync {
    fn push_message(&self, target: UserId, push: MessagePush);
}

/// Broadcast collaborator: fire-and-forget events (dashboard refresh).
pub trait Broadcaster: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// Discards every message. Default wiring when no collaborator exists.
#[derive(Debug, Default)]
pub struct NullMessenger;

impl Messenger for NullMessenger {
    fn push_message(&self, _target: UserId, _push: MessagePush) {}
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn emit(&self, _event: &str, _payload: serde_json::Value) {}
}

/// In-memory messenger that mirrors the collaborator's dedup contract:
/// one slot per (target, reference key), updated in place.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    messages: Mutex<Vec<(UserId, MessagePush)>>,
}

impl RecordingMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the retained messages.
    #[must_use]
    pub fn messages(&self) -> Vec<(UserId, MessagePush)> {
        self.messages.lock().expect("messenger poisoned").clone()
    }
}

impl Messenger for RecordingMessenger {
    fn push_message(&self, target: UserId, push: MessagePush) {
        let mut messages = self.messages.lock().expect("messenger poisoned");
        if let Some(slot) = messages
            .iter_mut()
            .find(|(t, m)| *t == target && m.reference_key == push.reference_key)
        {
            slot.1 = push;
        } else {
            messages.push((target, push));
        }
    }
}

/// In-memory broadcaster retaining every emitted event.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the emitted events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().expect("broadcaster poisoned").clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .expect("broadcaster poisoned")
            .push((event.to_string(), payload));
    }
}
