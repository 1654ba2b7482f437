//! src/antinuke/ledger.rs
//! Historia wystąpień odcisków per gildia (scope).
//!
//! `record` robi read-modify-write pod blokadą sharda `DashMap`, więc jest atomowe
//! względem innych wywołań na tym samym kluczu. Licznik znanych odcisków (globalny,
//! przez wszystkie gildie) tylko rośnie – retencja usuwa rekordy, ale nie odciski.
//! Tak samo zbiór odcisków, dla których policzono już pewność (`scored`).

use std::collections::BTreeSet;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub actor_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecord {
    pub fingerprint: Fingerprint,
    pub occurrences: Vec<Occurrence>,
    pub first_seen: i64,
    pub distinct_actors: BTreeSet<String>,
}

impl PatternRecord {
    fn new(fingerprint: Fingerprint, first_seen: i64) -> Self {
        Self {
            fingerprint,
            occurrences: Vec::new(),
            first_seen,
            distinct_actors: BTreeSet::new(),
        }
    }

    fn push(&mut self, actor_id: &str, timestamp: i64) {
        self.occurrences.push(Occurrence {
            actor_id: actor_id.to_string(),
            timestamp,
        });
        self.distinct_actors.insert(actor_id.to_string());
    }

    /// Liczba wystąpień w półotwartym oknie `[start, end)`.
    pub fn count_between(&self, start: i64, end: i64) -> usize {
        self.occurrences
            .iter()
            .filter(|o| o.timestamp >= start && o.timestamp < end)
            .count()
    }

    /// Średni odstęp (ms) między kolejnymi wystąpieniami po posortowaniu. `None` dla < 2.
    pub fn mean_interval_ms(&self) -> Option<f64> {
        if self.occurrences.len() < 2 {
            return None;
        }
        let mut ts: Vec<i64> = self.occurrences.iter().map(|o| o.timestamp).collect();
        ts.sort_unstable();
        // i128: skrajne znaczniki czasu nie mieszczą się w różnicy i64
        let total: i128 = ts.windows(2).map(|w| w[1] as i128 - w[0] as i128).sum();
        Some(total as f64 / (ts.len() - 1) as f64)
    }
}

#[derive(Debug, Default)]
pub struct PatternLedger {
    records: DashMap<(String, Fingerprint), PatternRecord>,
    known: DashSet<Fingerprint>,
    scored: DashSet<Fingerprint>,
}

impl PatternLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dopisuje wystąpienie (tworzy rekord przy pierwszym) i zwraca snapshot rekordu.
    pub fn record(
        &self,
        scope_id: &str,
        fingerprint: &Fingerprint,
        actor_id: &str,
        timestamp: i64,
    ) -> PatternRecord {
        let snapshot = {
            let mut entry = self
                .records
                .entry((scope_id.to_string(), fingerprint.clone()))
                .or_insert_with(|| PatternRecord::new(fingerprint.clone(), timestamp));
            entry.push(actor_id, timestamp);
            entry.value().clone()
        };
        self.known.insert(fingerprint.clone());
        snapshot
    }

    pub fn get(&self, scope_id: &str, fingerprint: &Fingerprint) -> Option<PatternRecord> {
        self.records
            .get(&(scope_id.to_string(), fingerprint.clone()))
            .map(|r| r.value().clone())
    }

    /// Liczba różnych odcisków widzianych we wszystkich gildiach.
    pub fn known_fingerprints(&self) -> usize {
        self.known.len()
    }

    pub fn is_known(&self, fingerprint: &Fingerprint) -> bool {
        self.known.contains(fingerprint)
    }

    /// Odnotowuje, że dla odcisku policzono pewność.
    pub fn mark_scored(&self, fingerprint: &Fingerprint) {
        self.scored.insert(fingerprint.clone());
    }

    pub fn is_scored(&self, fingerprint: &Fingerprint) -> bool {
        self.scored.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Retencja: wycina wystąpienia starsze niż `cutoff` (ms), przelicza aktorów,
    /// usuwa rekordy bez wystąpień. Zwraca liczbę usuniętych rekordów.
    pub fn prune_older_than(&self, cutoff: i64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, rec| {
            rec.occurrences.retain(|o| o.timestamp >= cutoff);
            rec.distinct_actors = rec.occurrences.iter().map(|o| o.actor_id.clone()).collect();
            !rec.occurrences.is_empty()
        });
        before.saturating_sub(self.records.len())
    }
}
