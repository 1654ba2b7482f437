//! Heurystyka anomalii i pewności (0–100) dla odcisku sekwencji.
//! Suma pięciu składników z twardymi limitami; to celowo ważona suma, nie model statystyczny.

use serde::{Deserialize, Serialize};

use super::ledger::PatternRecord;

pub const HOUR_MS: i64 = 3_600_000;

/* ==============================
   Reguły anomalii
   ============================== */

const RARE_MAX_OCCURRENCES: usize = 3;
const COORDINATED_MIN_ACTORS: usize = 2;
const SPIKE_FACTOR: usize = 3;
/// Sygnatura poniżej tej pewności traktowana jest jako „ewoluujący wariant”.
pub const WEAK_SIGNATURE_CONFIDENCE: f64 = 50.0;

/* ==============================
   Wagi pewności
   ============================== */

const RARITY_MAX: f64 = 30.0;
const RARITY_POPULATION: f64 = 1000.0;
const COORDINATION_MAX: f64 = 25.0;
const COORDINATION_PER_ACTOR: f64 = 10.0;
const FREQUENCY_MIN_COUNT: usize = 2;
const FREQUENCY_MAX: f64 = 20.0;
const FREQUENCY_PER_HIT: f64 = 5.0;
const COMPLEXITY_MIN_LEN: usize = 5;
const COMPLEXITY_MAX: f64 = 15.0;
const COMPLEXITY_PER_ACTION: f64 = 2.0;
const CLUSTER_INTERVAL_MS: f64 = 10_000.0;
const CLUSTER_BONUS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyReason {
    /// < 3 wystąpienia, >= 2 różnych aktorów
    RareCoordinated,
    /// ostatnia godzina > 3× godzina wcześniej
    RateSpike,
    /// znana, ale słaba sygnatura
    WeakSignature,
}

/// `(ostatnia godzina, godzina wcześniej)` – okna `[now-1h, now)` i `[now-2h, now-1h)`.
pub fn hourly_counts(record: &PatternRecord, now: i64) -> (usize, usize) {
    let hour_ago = now.saturating_sub(HOUR_MS);
    let recent = record.count_between(hour_ago, now);
    let prior = record.count_between(hour_ago.saturating_sub(HOUR_MS), hour_ago);
    (recent, prior)
}

pub fn anomaly_reasons(
    record: &PatternRecord,
    weak_signature: bool,
    now: i64,
) -> Vec<AnomalyReason> {
    let mut reasons = Vec::new();
    if record.occurrences.len() < RARE_MAX_OCCURRENCES
        && record.distinct_actors.len() >= COORDINATED_MIN_ACTORS
    {
        reasons.push(AnomalyReason::RareCoordinated);
    }
    let (recent, prior) = hourly_counts(record, now);
    if recent > SPIKE_FACTOR * prior {
        reasons.push(AnomalyReason::RateSpike);
    }
    if weak_signature {
        reasons.push(AnomalyReason::WeakSignature);
    }
    reasons
}

pub fn is_anomalous(record: &PatternRecord, weak_signature: bool, now: i64) -> bool {
    !anomaly_reasons(record, weak_signature, now).is_empty()
}

/// Rozbicie pewności na składniki (do logów / raportu).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub rarity: f64,
    pub coordination: f64,
    pub frequency: f64,
    pub complexity: f64,
    pub clustering: f64,
    pub total: f64,
}

pub fn confidence(
    record: &PatternRecord,
    known_fingerprints: usize,
    sequence_len: usize,
    now: i64,
) -> ConfidenceBreakdown {
    let rarity = {
        let population = (known_fingerprints as f64 / RARITY_POPULATION).max(1.0);
        (RARITY_MAX / population).min(RARITY_MAX)
    };

    let actors = record.distinct_actors.len();
    let coordination = if actors >= COORDINATED_MIN_ACTORS {
        (actors as f64 * COORDINATION_PER_ACTOR).min(COORDINATION_MAX)
    } else {
        0.0
    };

    let (recent, _) = hourly_counts(record, now);
    let frequency = if recent > FREQUENCY_MIN_COUNT {
        (recent as f64 * FREQUENCY_PER_HIT).min(FREQUENCY_MAX)
    } else {
        0.0
    };

    let complexity = if sequence_len > COMPLEXITY_MIN_LEN {
        (sequence_len as f64 * COMPLEXITY_PER_ACTION).min(COMPLEXITY_MAX)
    } else {
        0.0
    };

    let clustering = match record.mean_interval_ms() {
        Some(mean) if mean < CLUSTER_INTERVAL_MS => CLUSTER_BONUS,
        _ => 0.0,
    };

    let total = (rarity + coordination + frequency + complexity + clustering).clamp(0.0, 100.0);
    ConfidenceBreakdown {
        rarity,
        coordination,
        frequency,
        complexity,
        clustering,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antinuke::fingerprint::Fingerprint;
    use crate::antinuke::ledger::PatternLedger;
    use proptest::prelude::*;

    fn record_of(events: &[(&str, i64)]) -> PatternRecord {
        let l = PatternLedger::new();
        let fp = Fingerprint::from("fp");
        for (actor, ts) in events {
            l.record("g", &fp, actor, *ts);
        }
        l.get("g", &fp).unwrap()
    }

    #[test]
    fn rare_coordinated_pattern() {
        let now = 10 * HOUR_MS;
        let r = record_of(&[("a", now - 5_000), ("b", now)]);
        assert!(anomaly_reasons(&r, false, now).contains(&AnomalyReason::RareCoordinated));

        let solo = record_of(&[("a", now - 3 * HOUR_MS)]);
        assert!(!is_anomalous(&solo, false, now));
    }

    #[test]
    fn rate_spike_is_strict() {
        let now = 10 * HOUR_MS;
        let mut ev = vec![("a", now - 90 * 60_000)];
        for m in [50, 40, 30, 20, 10] {
            ev.push(("a", now - m * 60_000));
        }
        let r = record_of(&ev);
        assert_eq!(hourly_counts(&r, now), (5, 1));
        assert!(anomaly_reasons(&r, false, now).contains(&AnomalyReason::RateSpike));

        // 3 > 3×1 nie zachodzi
        let r = record_of(&[
            ("a", now - 90 * 60_000),
            ("a", now - 30 * 60_000),
            ("a", now - 20 * 60_000),
            ("a", now - 10 * 60_000),
        ]);
        assert!(!is_anomalous(&r, false, now));
    }

    #[test]
    fn occurrence_at_now_is_outside_recent_window() {
        let now = 10 * HOUR_MS;
        let r = record_of(&[("a", now)]);
        assert_eq!(hourly_counts(&r, now), (0, 0));
        assert!(!is_anomalous(&r, false, now));
    }

    #[test]
    fn weak_signature_flags() {
        let now = 10 * HOUR_MS;
        let r = record_of(&[("a", now)]);
        assert_eq!(anomaly_reasons(&r, true, now), vec![AnomalyReason::WeakSignature]);
    }

    #[test]
    fn confidence_components_and_caps() {
        let now = 10 * HOUR_MS;
        let r = record_of(&[
            ("a", now - 4_000),
            ("b", now - 3_000),
            ("c", now - 2_000),
            ("d", now - 1_000),
        ]);
        let c = confidence(&r, 10, 8, now);
        assert_eq!(c.rarity, 30.0);
        assert_eq!(c.coordination, 25.0);
        assert_eq!(c.frequency, 20.0);
        assert_eq!(c.complexity, 15.0);
        assert_eq!(c.clustering, 10.0);
        assert_eq!(c.total, 100.0);
    }

    #[test]
    fn rarity_shrinks_with_population() {
        let r = record_of(&[("a", 0)]);
        assert_eq!(confidence(&r, 2_000, 1, 0).rarity, 15.0);
        assert_eq!(confidence(&r, 999, 1, 0).rarity, 30.0);
    }

    #[test]
    fn thresholds_are_exclusive() {
        let now = 10 * HOUR_MS;
        // 2 wystąpienia w godzinie, 1 aktor, sekwencja długości 5, odstęp 10 s
        let r = record_of(&[("a", now - 20_000), ("a", now - 10_000)]);
        let c = confidence(&r, 5_000, 5, now);
        assert_eq!(c.coordination, 0.0);
        assert_eq!(c.frequency, 0.0);
        assert_eq!(c.complexity, 0.0);
        assert_eq!(c.clustering, 0.0);
        assert_eq!(c.total, 6.0);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let low = record_of(&[("a", i64::MIN + 5), ("b", i64::MIN + 6)]);
        assert_eq!(hourly_counts(&low, i64::MIN + 6), (1, 0));
        assert!(is_anomalous(&low, false, i64::MIN + 6));

        let wide = record_of(&[("a", i64::MIN + 3 * HOUR_MS), ("b", i64::MAX)]);
        let c = confidence(&wide, 1, 1, i64::MAX);
        assert_eq!(c.clustering, 0.0);
        assert!((0.0..=100.0).contains(&c.total));
    }

    proptest! {
        #[test]
        fn confidence_stays_in_bounds(
            offsets in proptest::collection::vec(0i64..(3 * HOUR_MS), 1..40),
            actors in 1usize..10,
            known in 0usize..100_000,
            seq_len in 0usize..200,
        ) {
            let now = 5 * HOUR_MS;
            let names: Vec<String> = (0..actors).map(|i| format!("a{i}")).collect();
            let events: Vec<(&str, i64)> = offsets
                .iter()
                .enumerate()
                .map(|(i, o)| (names[i % actors].as_str(), now - o))
                .collect();
            let r = record_of(&events);
            let c = confidence(&r, known, seq_len, now);
            prop_assert!((0.0..=100.0).contains(&c.total));
        }
    }
}
