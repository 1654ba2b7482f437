//! Ujście zdarzeń o zagrożeniach. Silnik tylko woła `report`; dostarczenie
//! (kanał logów, paging, webhook) należy do otoczenia.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use super::fingerprint::{ActionDescriptor, Fingerprint};
use super::scorer::ConfidenceBreakdown;

/// Zdarzenie do zgłoszenia, gdy pewność przekroczy próg raportu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatEvent {
    pub scope_id: String,
    pub actor_id: String,
    pub fingerprint: Fingerprint,
    pub recent_sequence_tail: Vec<ActionDescriptor>,
    pub confidence: f64,
    pub breakdown: ConfidenceBreakdown,
    /// Pewność >= progu alertu – do pagingu.
    pub high_priority: bool,
    pub timestamp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub trait NotifySink: Send + Sync {
    fn report(&self, event: &ThreatEvent) -> Result<(), SinkError>;

    fn name(&self) -> &str {
        "sink"
    }
}

/// Tylko log (`warn!`). Domyślne ujście, gdy nikt nie podpiął innego.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotifySink for TracingSink {
    fn report(&self, event: &ThreatEvent) -> Result<(), SinkError> {
        warn!(
            scope_id = %event.scope_id,
            actor_id = %event.actor_id,
            fingerprint = %event.fingerprint,
            confidence = event.confidence,
            high_priority = event.high_priority,
            "zero-day threat pattern"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Przekazuje zdarzenia do taska asynchronicznego (np. wysyłka na kanał Discorda).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ThreatEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ThreatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotifySink for ChannelSink {
    fn report(&self, event: &ThreatEvent) -> Result<(), SinkError> {
        self.tx.send(event.clone()).map_err(|_| SinkError::Closed)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Trzyma zdarzenia w pamięci.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ThreatEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ThreatEvent> {
        self.events
            .lock()
            .map(|v| v.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl NotifySink for RecordingSink {
    fn report(&self, event: &ThreatEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|e| SinkError::Delivery(e.to_string()))?
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
