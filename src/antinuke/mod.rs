//! src/antinuke/mod.rs
//! Antinuke – wykrywanie nieznanych wcześniej („zero-day”) sekwencji akcji
//! administracyjnych: odcisk sekwencji → historia per gildia → anomalia + pewność
//! → zgłoszenie do ujścia i aktualizacja globalnej sygnatury.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AntinukeConfig;

pub mod fingerprint;
pub mod ledger;
pub mod scorer;
pub mod signature;
pub mod sink;

pub use fingerprint::{ActionCategory, ActionDescriptor, Fingerprint, fingerprint};
pub use ledger::{Occurrence, PatternLedger, PatternRecord};
pub use scorer::{AnomalyReason, ConfidenceBreakdown};
pub use signature::{ConfirmOutcome, SignatureRecord, SignatureState, SignatureStore};
pub use sink::{ChannelSink, NotifySink, RecordingSink, SinkError, ThreatEvent, TracingSink};

const DAY_MS: i64 = 24 * scorer::HOUR_MS;
/// Ile ostatnich akcji trafia do zgłoszenia.
const EVENT_TAIL_LEN: usize = 5;

/// Wynik `observe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub fingerprint: Fingerprint,
    pub is_anomalous: bool,
    pub confidence: f64,
    pub reasons: Vec<AnomalyReason>,
    /// Czy zdarzenie poszło do ujścia.
    pub reported: bool,
    pub high_priority: bool,
}

/// Serwis antinuke. Cały stan jest własnością instancji (bez globali), więc
/// w testach każda instancja startuje od zera.
pub struct Antinuke {
    cfg: AntinukeConfig,
    ledger: PatternLedger,
    signatures: SignatureStore,
    sink: Arc<dyn NotifySink>,
}

impl std::fmt::Debug for Antinuke {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Antinuke")
            .field("cfg", &self.cfg)
            .field("patterns", &self.ledger.len())
            .field("signatures", &self.signatures.len())
            .field("sink", &self.sink.name())
            .finish()
    }
}

impl Antinuke {
    pub fn new(cfg: AntinukeConfig, sink: Arc<dyn NotifySink>) -> Arc<Self> {
        Arc::new(Self {
            cfg: crate::config::sanitize_cfg(cfg),
            ledger: PatternLedger::new(),
            signatures: SignatureStore::new(),
            sink,
        })
    }

    pub fn config(&self) -> &AntinukeConfig {
        &self.cfg
    }

    pub fn ledger(&self) -> &PatternLedger {
        &self.ledger
    }

    pub fn signatures(&self) -> &SignatureStore {
        &self.signatures
    }

    /// `Observe`: `window` to ostatnie akcje tej gildii (bez bieżącej), chronologicznie.
    /// Sekwencja = okno + `action`, przycięta do `max_sequence_len` najnowszych.
    /// Czas oceny = `action.timestamp`.
    pub fn observe(
        &self,
        scope_id: &str,
        actor_id: &str,
        action: &ActionDescriptor,
        window: &[ActionDescriptor],
    ) -> Observation {
        let keep = self.cfg.max_sequence_len.saturating_sub(1);
        let start = window.len().saturating_sub(keep);
        let mut sequence: Vec<ActionDescriptor> = window[start..].to_vec();
        sequence.push(action.clone());

        let fp = fingerprint(&sequence);
        let now = action.timestamp;
        let record = self.ledger.record(scope_id, &fp, actor_id, now);

        let reasons = scorer::anomaly_reasons(&record, self.signatures.is_weak(&fp), now);
        if reasons.is_empty() {
            return Observation {
                fingerprint: fp,
                is_anomalous: false,
                confidence: 0.0,
                reasons,
                reported: false,
                high_priority: false,
            };
        }

        let breakdown =
            scorer::confidence(&record, self.ledger.known_fingerprints(), sequence.len(), now);
        self.ledger.mark_scored(&fp);
        let confidence = breakdown.total;
        debug!(%scope_id, fingerprint = %fp, confidence, ?reasons, "anomalous sequence");

        let mut reported = false;
        let high_priority = confidence >= self.cfg.alert_threshold;
        if confidence >= self.cfg.report_threshold {
            self.signatures.observe(&fp, confidence, now);
            let tail_start = sequence.len().saturating_sub(EVENT_TAIL_LEN);
            let event = ThreatEvent {
                scope_id: scope_id.to_string(),
                actor_id: actor_id.to_string(),
                fingerprint: fp.clone(),
                recent_sequence_tail: sequence[tail_start..].to_vec(),
                confidence,
                breakdown,
                high_priority,
                timestamp: now,
            };
            // błąd ujścia nie może przerwać detekcji
            match self.sink.report(&event) {
                Ok(()) => reported = true,
                Err(e) => warn!(sink = self.sink.name(), error = %e, "threat report not delivered"),
            }
        }

        Observation {
            fingerprint: fp,
            is_anomalous: true,
            confidence,
            reasons,
            reported,
            high_priority: reported && high_priority,
        }
    }

    /// Sama reguła anomalii dla istniejącego rekordu (bez zapisu).
    pub fn is_anomalous(&self, scope_id: &str, fingerprint: &Fingerprint, now: i64) -> bool {
        self.ledger
            .get(scope_id, fingerprint)
            .is_some_and(|r| scorer::is_anomalous(&r, self.signatures.is_weak(fingerprint), now))
    }

    /// Sama pewność dla rekordu (bez zapisu).
    pub fn confidence(&self, record: &PatternRecord, sequence_len: usize, now: i64) -> f64 {
        scorer::confidence(record, self.ledger.known_fingerprints(), sequence_len, now).total
    }

    /// Informacja zwrotna od moderatora: prawdziwy atak podnosi pewność sygnatury.
    pub fn confirm(&self, fingerprint: &Fingerprint, is_true_attack: bool, now: i64) -> ConfirmOutcome {
        if is_true_attack {
            return self
                .signatures
                .confirm(fingerprint, self.cfg.learning_increment, now);
        }
        match self.signatures.dismiss(fingerprint) {
            Some(SignatureState::Dismissed) => ConfirmOutcome::Dismissed,
            Some(state) => ConfirmOutcome::Unchanged(state),
            None => ConfirmOutcome::Unknown,
        }
    }

    pub fn lifecycle(&self, fingerprint: &Fingerprint) -> SignatureState {
        match self.signatures.state(fingerprint) {
            Some(state) => state,
            None if self.ledger.is_scored(fingerprint) => SignatureState::Scored,
            None if self.ledger.is_known(fingerprint) => SignatureState::Observed,
            None => SignatureState::Unknown,
        }
    }

    /// Retencja wystąpień; no-op gdy `retention_days` nie ustawione.
    pub fn prune(&self, now: i64) -> usize {
        match self.cfg.retention_days {
            Some(days) => {
                let keep_ms = i64::try_from(days).unwrap_or(i64::MAX).saturating_mul(DAY_MS);
                let removed = self.ledger.prune_older_than(now.saturating_sub(keep_ms));
                if removed > 0 {
                    debug!(removed, "antinuke retention pruned patterns");
                }
                removed
            }
            None => 0,
        }
    }

    /// Okresowa retencja w tle; task kończy się razem z ostatnim `Arc`.
    pub fn spawn_prune_task(this: &Arc<Self>) {
        if this.cfg.retention_days.is_none() {
            return;
        }
        let weak = Arc::downgrade(this);
        let every = Duration::from_secs(this.cfg.prune_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(strong) => {
                        strong.prune(chrono::Utc::now().timestamp_millis());
                    }
                    None => break,
                }
            }
        });
    }
}
