//! Audit trail for security-relevant actions.
//!
//! Storage is someone else's concern; the gateway only emits events through
//! an [`AuditSink`].

use serde::Serialize;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

pub const ACTION_LOGIN: &str = "auth.login";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub actor_type: String,
    pub actor_id: String,
    pub action: String,
    pub metadata: Value,
}

impl AuditEvent {
    pub fn user(actor_id: impl Into<String>, action: &str, metadata: Value) -> Self {
        Self {
            actor_type: "user".to_string(),
            actor_id: actor_id.into(),
            action: action.to_string(),
            metadata,
        }
    }
}

/// Receives audit events. Recording must not fail the request that triggered it.
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    fn record(&self, event: AuditEvent);
}

/// Emits events as structured `tracing` records on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            actor_type = %event.actor_type,
            actor_id = %event.actor_id,
            action = %event.action,
            metadata = %event.metadata,
            "audit event"
        );
    }
}

/// Keeps events in memory; handy for tests and local debugging.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
