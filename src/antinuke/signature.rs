//! Globalny (ponad gildiami) magazyn sygnatur: odcisk → bieżące podsumowanie pewności.
//!
//! Cykl życia: `Unknown → Observed → Scored → {Confirmed | Dismissed}`.
//! Pewność to maksimum biegnące; potwierdzenie prawdziwego ataku podnosi ją o stały krok.
//! `Dismissed` jest końcowy: kolejne potwierdzenia niczego nie zmieniają.

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::fingerprint::Fingerprint;
use super::scorer::WEAK_SIGNATURE_CONFIDENCE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    pub fingerprint: Fingerprint,
    pub count: u64,
    pub first_seen: i64,
    pub last_seen: i64,
    pub confidence: f64,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub dismissed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureState {
    Unknown,
    Observed,
    Scored,
    Confirmed,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// Krok uczenia zastosowany – nowy stan sygnatury.
    Confirmed(SignatureRecord),
    /// Sygnatura jest (lub właśnie została) odrzucona; pewność bez zmian.
    Dismissed,
    /// Nic się nie zmieniło, sygnatura zostaje w podanym stanie.
    Unchanged(SignatureState),
    /// Brak sygnatury dla odcisku – nic do zrobienia.
    Unknown,
}

#[derive(Debug, Default)]
pub struct SignatureStore {
    map: DashMap<Fingerprint, SignatureRecord>,
    // do zapisania w DB przy najbliższym flushu
    dirty: DashSet<Fingerprint>,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<SignatureRecord> {
        self.map.get(fingerprint).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn is_weak(&self, fingerprint: &Fingerprint) -> bool {
        self.map
            .get(fingerprint)
            .is_some_and(|s| s.confidence < WEAK_SIGNATURE_CONFIDENCE)
    }

    /// Zapis wykrycia o wysokiej pewności. Zwraca stan po zapisie i czy sygnatura jest nowa.
    pub fn observe(
        &self,
        fingerprint: &Fingerprint,
        confidence: f64,
        timestamp: i64,
    ) -> (SignatureRecord, bool) {
        let mut created = false;
        let snapshot = {
            let mut sig = self.map.entry(fingerprint.clone()).or_insert_with(|| {
                created = true;
                SignatureRecord {
                    fingerprint: fingerprint.clone(),
                    count: 0,
                    first_seen: timestamp,
                    last_seen: timestamp,
                    confidence: 0.0,
                    confirmations: 0,
                    dismissed: false,
                }
            });
            sig.count += 1;
            sig.last_seen = sig.last_seen.max(timestamp);
            sig.confidence = sig.confidence.max(confidence.clamp(0.0, 100.0));
            sig.value().clone()
        };
        self.dirty.insert(fingerprint.clone());
        if created {
            info!(fingerprint = %fingerprint, confidence, "new threat signature");
        }
        (snapshot, created)
    }

    pub fn confirm(&self, fingerprint: &Fingerprint, increment: f64, timestamp: i64) -> ConfirmOutcome {
        let snapshot = match self.map.get_mut(fingerprint) {
            Some(sig) if sig.dismissed => return ConfirmOutcome::Dismissed,
            Some(mut sig) => {
                sig.confidence = (sig.confidence + increment).clamp(0.0, 100.0);
                sig.last_seen = sig.last_seen.max(timestamp);
                sig.confirmations += 1;
                sig.value().clone()
            }
            None => return ConfirmOutcome::Unknown,
        };
        self.dirty.insert(fingerprint.clone());
        info!(fingerprint = %fingerprint, confidence = snapshot.confidence, "signature confirmed");
        ConfirmOutcome::Confirmed(snapshot)
    }

    /// Oznacza sygnaturę jako fałszywy alarm. Potwierdzona sygnatura zostaje potwierdzona.
    /// Zwraca stan po operacji, `None` gdy sygnatury nie ma.
    pub fn dismiss(&self, fingerprint: &Fingerprint) -> Option<SignatureState> {
        let changed = {
            let mut sig = self.map.get_mut(fingerprint)?;
            if sig.confirmations > 0 || sig.dismissed {
                false
            } else {
                sig.dismissed = true;
                true
            }
        };
        if changed {
            self.dirty.insert(fingerprint.clone());
        }
        self.state(fingerprint)
    }

    pub fn state(&self, fingerprint: &Fingerprint) -> Option<SignatureState> {
        self.map.get(fingerprint).map(|s| {
            if s.confirmations > 0 {
                SignatureState::Confirmed
            } else if s.dismissed {
                SignatureState::Dismissed
            } else {
                SignatureState::Scored
            }
        })
    }

    /// Wczytanie sygnatur (np. z DB przy starcie). Nie oznacza ich jako brudnych.
    pub fn load(&self, records: impl IntoIterator<Item = SignatureRecord>) -> usize {
        let mut n = 0;
        for mut rec in records {
            rec.confidence = rec.confidence.clamp(0.0, 100.0);
            self.map.insert(rec.fingerprint.clone(), rec);
            n += 1;
        }
        n
    }

    /// Zabiera zmienione od ostatniego wywołania sygnatury.
    pub fn take_dirty(&self) -> Vec<SignatureRecord> {
        let keys: Vec<Fingerprint> = self.dirty.iter().map(|k| k.key().clone()).collect();
        keys.into_iter()
            .filter_map(|k| {
                self.dirty.remove(&k);
                self.get(&k)
            })
            .collect()
    }

    /// Ponowne oznaczenie (np. gdy zapis do DB się nie udał).
    pub fn mark_dirty(&self, fingerprint: &Fingerprint) {
        self.dirty.insert(fingerprint.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> Fingerprint {
        Fingerprint::from("sig")
    }

    #[test]
    fn observe_tracks_running_max() {
        let s = SignatureStore::new();
        let (rec, created) = s.observe(&fp(), 75.0, 10);
        assert!(created);
        assert_eq!(rec.count, 1);
        let (rec, created) = s.observe(&fp(), 72.0, 20);
        assert!(!created);
        assert_eq!(rec.count, 2);
        assert_eq!(rec.confidence, 75.0);
        assert_eq!((rec.first_seen, rec.last_seen), (10, 20));
    }

    #[test]
    fn confirm_adds_increment_and_clamps() {
        let s = SignatureStore::new();
        s.observe(&fp(), 95.0, 1);
        match s.confirm(&fp(), 10.0, 5) {
            ConfirmOutcome::Confirmed(rec) => {
                assert_eq!(rec.confidence, 100.0);
                assert_eq!(rec.last_seen, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.state(&fp()), Some(SignatureState::Confirmed));
    }

    #[test]
    fn confirm_unknown_is_noop() {
        let s = SignatureStore::new();
        assert_eq!(s.confirm(&fp(), 10.0, 1), ConfirmOutcome::Unknown);
        assert!(s.is_empty());
    }

    #[test]
    fn dismiss_does_not_touch_confidence() {
        let s = SignatureStore::new();
        s.observe(&fp(), 71.0, 1);
        assert_eq!(s.dismiss(&fp()), Some(SignatureState::Dismissed));
        assert_eq!(s.get(&fp()).unwrap().confidence, 71.0);
        assert_eq!(s.state(&fp()), Some(SignatureState::Dismissed));
        assert_eq!(s.dismiss(&Fingerprint::from("other")), None);
    }

    #[test]
    fn dismissed_is_terminal() {
        let s = SignatureStore::new();
        s.observe(&fp(), 72.0, 1);
        s.dismiss(&fp());
        s.take_dirty();
        assert_eq!(s.confirm(&fp(), 10.0, 5), ConfirmOutcome::Dismissed);
        let rec = s.get(&fp()).unwrap();
        assert_eq!((rec.confidence, rec.confirmations, rec.last_seen), (72.0, 0, 1));
        assert_eq!(s.state(&fp()), Some(SignatureState::Dismissed));
        assert!(s.take_dirty().is_empty());
    }

    #[test]
    fn confirmed_ignores_dismiss() {
        let s = SignatureStore::new();
        s.observe(&fp(), 72.0, 1);
        s.confirm(&fp(), 10.0, 2);
        assert_eq!(s.dismiss(&fp()), Some(SignatureState::Confirmed));
        assert_eq!(s.get(&fp()).unwrap().confidence, 82.0);
    }

    #[test]
    fn weak_signature_threshold() {
        let s = SignatureStore::new();
        s.load([SignatureRecord {
            fingerprint: fp(),
            count: 1,
            first_seen: 0,
            last_seen: 0,
            confidence: 40.0,
            confirmations: 0,
            dismissed: false,
        }]);
        assert!(s.is_weak(&fp()));
        assert!(!s.is_weak(&Fingerprint::from("other")));
    }

    #[test]
    fn dirty_set_is_drained() {
        let s = SignatureStore::new();
        s.observe(&fp(), 80.0, 1);
        assert_eq!(s.take_dirty().len(), 1);
        assert!(s.take_dirty().is_empty());
    }
}
