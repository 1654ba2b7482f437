use std::sync::Arc;

use tigris_threat::antinuke::{
    ActionDescriptor, Antinuke, AnomalyReason, ChannelSink, ConfirmOutcome, RecordingSink,
    SignatureState, fingerprint,
};
use tigris_threat::config::AntinukeConfig;

const HOUR: i64 = 3_600_000;

fn act(kind: &str, actor: &str, ts: i64) -> ActionDescriptor {
    ActionDescriptor::new(kind, actor, ts)
}

fn engine() -> (Arc<Antinuke>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (Antinuke::new(AntinukeConfig::default(), sink.clone()), sink)
}

#[test]
fn coordinated_rare_pattern() {
    let (an, _) = engine();
    let t0 = 100 * HOUR;

    let w_alice = [act("CHANNEL_DELETE", "alice", t0)];
    let first = an.observe("g", "alice", &act("ROLE_DELETE", "alice", t0 + 1_000), &w_alice);
    assert!(!first.is_anomalous);

    let w_bob = [act("CHANNEL_DELETE", "bob", t0 + 60_000)];
    let second = an.observe("g", "bob", &act("ROLE_DELETE", "bob", t0 + 61_000), &w_bob);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert!(second.is_anomalous);
    assert!(second.reasons.contains(&AnomalyReason::RareCoordinated));
    assert!((0.0..=100.0).contains(&second.confidence));
}

#[test]
fn scopes_do_not_share_history() {
    let (an, _) = engine();
    let t0 = 100 * HOUR;
    an.observe("g1", "alice", &act("ROLE_DELETE", "alice", t0), &[]);
    let other = an.observe("g2", "bob", &act("ROLE_DELETE", "bob", t0 + 1), &[]);
    assert!(!other.is_anomalous);
}

#[test]
fn rate_spike() {
    let (an, _) = engine();
    let now = 100 * HOUR;
    an.observe("g", "a", &act("MEMBER_BAN_ADD", "a", now - 90 * 60_000), &[]);
    for m in [50, 40, 30, 20, 10] {
        an.observe("g", "a", &act("MEMBER_BAN_ADD", "a", now - m * 60_000), &[]);
    }
    let obs = an.observe("g", "a", &act("MEMBER_BAN_ADD", "a", now), &[]);
    assert!(obs.is_anomalous);
    assert_eq!(obs.reasons, vec![AnomalyReason::RateSpike]);
    assert!(an.is_anomalous("g", &obs.fingerprint, now));
}

#[test]
fn fingerprints_are_deterministic() {
    let a = [act("CHANNEL_DELETE", "x", 1), act("ROLE_DELETE", "y", 2)];
    let b = [act("channel_delete_x", "z", 9), act("role_delete_y", "w", 10)];
    assert_eq!(fingerprint(&a), fingerprint(&a));
    assert_eq!(fingerprint(&a), fingerprint(&b));
    // stała wartość między uruchomieniami
    assert_eq!(fingerprint(&a).as_str(), "pdmo93");

    let fwd = [act("CHANNEL_CREATE", "x", 1), act("MEMBER_BAN_ADD", "x", 2)];
    let rev = [act("MEMBER_BAN_ADD", "x", 1), act("CHANNEL_CREATE", "x", 2)];
    assert_ne!(fingerprint(&fwd), fingerprint(&rev));
}

/// Pięciu aktorów w ciągu kilku sekund powtarza tę samą długą sekwencję.
fn raid(an: &Antinuke, scope: &str, base: i64) -> Vec<tigris_threat::antinuke::Observation> {
    let window: Vec<_> = (0..6).map(|i| act("CHANNEL_DELETE", "x", base + i)).collect();
    ["a", "b", "c", "d", "e"]
        .iter()
        .enumerate()
        .map(|(i, actor)| {
            let ts = base + 1_000 * (i as i64 + 1);
            an.observe(scope, actor, &act("ROLE_DELETE", actor, ts), &window)
        })
        .collect()
}

#[test]
fn reports_go_to_sink_with_priority() {
    let (an, sink) = engine();
    let obs = raid(&an, "g", 100 * HOUR);

    let events = sink.events();
    assert_eq!(events.len(), obs.iter().filter(|o| o.reported).count());
    assert!(events.iter().all(|e| e.confidence >= 70.0));
    assert!(events.iter().all(|e| e.high_priority == (e.confidence >= 80.0)));
    assert!(events.iter().any(|e| e.high_priority));

    let fp = &obs[0].fingerprint;
    let sig = an.signatures().get(fp).unwrap();
    assert_eq!(sig.count as usize, events.len());
    let max = events.iter().map(|e| e.confidence).fold(0.0, f64::max);
    assert_eq!(sig.confidence, max);
}

#[test]
fn confirm_learning_loop() {
    let (an, _) = engine();
    let obs = raid(&an, "g", 100 * HOUR);
    let fp = obs[0].fingerprint.clone();
    assert_eq!(an.lifecycle(&fp), SignatureState::Scored);
    let before = an.signatures().get(&fp).unwrap().confidence;

    match an.confirm(&fp, true, 200 * HOUR) {
        ConfirmOutcome::Confirmed(sig) => {
            assert_eq!(sig.confidence, (before + 10.0).min(100.0));
            assert_eq!(sig.last_seen, 200 * HOUR);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(an.lifecycle(&fp), SignatureState::Confirmed);
}

#[tokio::test]
async fn channel_sink_delivers_to_async_consumer() {
    let (sink, mut rx) = ChannelSink::new();
    let an = Antinuke::new(AntinukeConfig::default(), Arc::new(sink));
    raid(&an, "g", 100 * HOUR);

    let ev = rx.recv().await.unwrap();
    assert_eq!(ev.scope_id, "g");
    assert!(ev.confidence >= 70.0);
    assert!(!ev.recent_sequence_tail.is_empty());
}
