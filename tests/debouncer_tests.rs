use vigil::kernel::channel::ChannelConfig;
use vigil::kernel::debouncer::{DebounceState, SignalDebouncer};
use vigil::{MonitorError, Observation, Severity, Signal, SignalChannel, SignalTransition, Timestamp};

const TOLERANCE_MS: u64 = 1_000;

fn debouncer(channel: SignalChannel) -> SignalDebouncer {
    SignalDebouncer::new("s1".to_string(), channel, ChannelConfig::default_for(channel), TOLERANCE_MS)
}

fn obs(channel: SignalChannel, ms: u64, active: bool) -> Observation {
    Observation::new("s1", channel, Timestamp::from_millis(ms), active)
}

/// Feed samples every `step` ms in `[from, to)` and collect transitions.
fn run(d: &mut SignalDebouncer, from: u64, to: u64, step: u64, active: bool, out: &mut Vec<SignalTransition>) {
    let mut t = from;
    while t < to {
        out.extend(d.observe(&obs(d.channel(), t, active)).expect("in-order observation"));
        t += step;
    }
}

/// Replay transitions into finished signals, the way the registry does.
fn materialize(transitions: &[SignalTransition]) -> Vec<Signal> {
    let mut signals: Vec<Signal> = Vec::new();
    for tr in transitions {
        match tr {
            SignalTransition::Raised(s) => signals.push(s.clone()),
            SignalTransition::Escalated { signal_id, severity, .. } => {
                let s = signals.iter_mut().find(|s| s.id == *signal_id).expect("known signal");
                s.severity = s.severity.max(*severity);
            }
            SignalTransition::Resolved { signal_id, ended_at, truncated, .. } => {
                let s = signals.iter_mut().find(|s| s.id == *signal_id).expect("known signal");
                s.resolve(*ended_at, *truncated);
            }
        }
    }
    signals
}

#[test]
fn test_flicker_is_absorbed_into_one_signal() {
    let mut d = debouncer(SignalChannel::FaceAbsence);
    let mut out = Vec::new();

    run(&mut d, 0, 6_000, 100, true, &mut out);
    run(&mut d, 6_000, 6_300, 100, false, &mut out);
    run(&mut d, 6_300, 9_000, 100, true, &mut out);
    run(&mut d, 9_000, 10_100, 100, false, &mut out);

    let signals = materialize(&out);
    assert_eq!(signals.len(), 1, "flicker must not split the signal: {:?}", out);

    let signal = &signals[0];
    assert!(signal.resolved);
    assert_eq!(signal.started_at, Timestamp::from_millis(0));
    assert_eq!(signal.ended_at, Some(Timestamp::from_millis(9_000)));
    assert_eq!(signal.duration_seconds, Some(9.0));
    assert!(!signal.is_truncated());
    assert_eq!(d.state(), DebounceState::Idle);
}

#[test]
fn test_short_absence_never_raises() {
    let mut d = debouncer(SignalChannel::FaceAbsence);
    let mut out = Vec::new();

    run(&mut d, 0, 4_900, 100, true, &mut out);
    run(&mut d, 4_900, 8_000, 100, false, &mut out);

    assert!(out.is_empty(), "4.9s of absence is below the 5s threshold: {:?}", out);
    assert_eq!(d.state(), DebounceState::Idle);
}

#[test]
fn test_raise_happens_exactly_at_threshold() {
    let mut d = debouncer(SignalChannel::FaceAbsence);

    assert!(d.observe(&obs(SignalChannel::FaceAbsence, 1_000, true)).unwrap().is_empty());
    assert!(matches!(d.state(), DebounceState::Pending { .. }));
    assert!(d.observe(&obs(SignalChannel::FaceAbsence, 5_999, true)).unwrap().is_empty());

    match d.observe(&obs(SignalChannel::FaceAbsence, 6_000, true)).unwrap().as_slice() {
        [SignalTransition::Raised(signal)] => {
            assert_eq!(signal.started_at, Timestamp::from_millis(1_000));
            assert_eq!(signal.severity, Severity::Low);
            assert!(!signal.resolved);
            assert_eq!(signal.ended_at, None);
        }
        other => panic!("expected a raise, got {:?}", other),
    }
}

#[test]
fn test_gap_longer_than_window_splits_signals() {
    let mut d = debouncer(SignalChannel::FaceAbsence);
    let mut out = Vec::new();

    run(&mut d, 0, 6_000, 500, true, &mut out);
    run(&mut d, 6_000, 7_500, 500, false, &mut out); // 6.0, 6.5, 7.0 -> resolves at 7.0
    run(&mut d, 7_500, 14_000, 500, true, &mut out);

    let signals = materialize(&out);
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].ended_at, Some(Timestamp::from_millis(6_000)));
    assert_eq!(signals[1].started_at, Timestamp::from_millis(7_500));
    assert!(!signals[1].resolved);
}

#[test]
fn test_clearing_then_late_active_resolves_and_restarts() {
    let mut d = debouncer(SignalChannel::FaceAbsence);
    let mut out = Vec::new();

    run(&mut d, 0, 5_100, 100, true, &mut out);
    d.observe(&obs(SignalChannel::FaceAbsence, 5_100, false)).unwrap();

    // Nothing arrives until long after the window; the condition is back.
    let tr = d.observe(&obs(SignalChannel::FaceAbsence, 8_000, true)).unwrap();
    match tr.as_slice() {
        [SignalTransition::Resolved { ended_at, truncated, .. }] => {
            assert_eq!(*ended_at, Timestamp::from_millis(5_100));
            assert!(!*truncated);
        }
        other => panic!("expected resolution, got {:?}", other),
    }
    assert_eq!(d.state(), DebounceState::Pending { since: Timestamp::from_millis(8_000) });
}

#[test]
fn test_out_of_order_beyond_tolerance_is_dropped() {
    let mut d = debouncer(SignalChannel::GazeDeviation);
    d.observe(&obs(SignalChannel::GazeDeviation, 10_000, true)).unwrap();

    let err = d.observe(&obs(SignalChannel::GazeDeviation, 8_500, false)).unwrap_err();
    assert!(matches!(err, MonitorError::OutOfOrderObservation { .. }));
    assert_eq!(d.dropped(), 1);
    assert!(matches!(d.state(), DebounceState::Pending { .. }), "dropped observation must not change state");
}

#[test]
fn test_late_within_tolerance_is_clamped() {
    let mut d = debouncer(SignalChannel::FaceAbsence);
    let mut out = Vec::new();
    run(&mut d, 0, 5_100, 100, true, &mut out);
    assert_eq!(out.len(), 1);

    // 600ms late: accepted, evaluated at t=5000.
    d.observe(&obs(SignalChannel::FaceAbsence, 4_400, false)).unwrap();
    assert_eq!(d.dropped(), 0);
    match d.state() {
        DebounceState::Clearing { since_clear, .. } => assert_eq!(since_clear, Timestamp::from_millis(5_000)),
        other => panic!("expected clearing, got {:?}", other),
    }
}

#[test]
fn test_severity_escalates_and_never_downgrades() {
    let mut d = debouncer(SignalChannel::GazeDeviation);
    let ch = SignalChannel::GazeDeviation;

    d.observe(&obs(ch, 0, true).with_magnitude(20.0)).unwrap();
    let raised = d.observe(&obs(ch, 3_000, true).with_magnitude(20.0)).unwrap();
    assert!(matches!(raised.as_slice(), [SignalTransition::Raised(s)] if s.severity == Severity::Low));

    let escalated = d.observe(&obs(ch, 4_000, true).with_magnitude(50.0)).unwrap();
    assert!(matches!(
        escalated.as_slice(),
        [SignalTransition::Escalated { severity: Severity::High, .. }]
    ));

    // Gaze comes back toward the screen but the condition persists.
    assert!(d.observe(&obs(ch, 5_000, true).with_magnitude(5.0)).unwrap().is_empty());
    match d.state() {
        DebounceState::Active { severity, .. } => assert_eq!(severity, Severity::High),
        other => panic!("expected active, got {:?}", other),
    }
}

#[test]
fn test_duration_band_escalation() {
    let mut d = debouncer(SignalChannel::FaceAbsence);
    let mut out = Vec::new();
    run(&mut d, 0, 16_000, 1_000, true, &mut out);

    let severities: Vec<Severity> = out
        .iter()
        .filter_map(|t| match t {
            SignalTransition::Raised(s) => Some(s.severity),
            SignalTransition::Escalated { severity, .. } => Some(*severity),
            _ => None,
        })
        .collect();
    assert_eq!(severities, vec![Severity::Low, Severity::Medium]);
}

#[test]
fn test_tab_switch_raises_immediately() {
    let mut d = debouncer(SignalChannel::TabSwitch);
    let tr = d.observe(&obs(SignalChannel::TabSwitch, 42_000, true)).unwrap();
    assert!(matches!(tr.as_slice(), [SignalTransition::Raised(s)] if s.started_at == Timestamp::from_millis(42_000)));
}

#[test]
fn test_tab_switch_after_gap_raises_new_signal_at_once() {
    let mut d = debouncer(SignalChannel::TabSwitch);
    let mut out = Vec::new();
    for (ms, active) in [(10_000, true), (12_000, false), (20_000, true), (21_000, false), (30_000, false)] {
        out.extend(d.observe(&obs(SignalChannel::TabSwitch, ms, active)).unwrap());
    }
    out.extend(d.force_resolve(Timestamp::from_secs(40)));

    let signals = materialize(&out);
    assert_eq!(signals.len(), 2, "both focus losses are recorded: {:?}", out);
    assert_eq!(signals[0].started_at, Timestamp::from_secs(10));
    assert_eq!(signals[0].ended_at, Some(Timestamp::from_secs(12)));
    assert_eq!(signals[1].started_at, Timestamp::from_secs(20));
    assert_eq!(signals[1].ended_at, Some(Timestamp::from_secs(21)));
    assert!(signals.iter().all(|s| s.resolved && !s.is_truncated()));
}

#[test]
fn test_gap_resolve_and_new_raise_come_in_order() {
    let mut d = debouncer(SignalChannel::TabSwitch);
    d.observe(&obs(SignalChannel::TabSwitch, 1_000, true)).unwrap();
    d.observe(&obs(SignalChannel::TabSwitch, 2_000, false)).unwrap();

    let step = d.observe(&obs(SignalChannel::TabSwitch, 5_000, true)).unwrap();
    match step.as_slice() {
        [SignalTransition::Resolved { ended_at, .. }, SignalTransition::Raised(next)] => {
            assert_eq!(*ended_at, Timestamp::from_millis(2_000));
            assert_eq!(next.started_at, Timestamp::from_millis(5_000));
        }
        other => panic!("expected resolve then raise, got {:?}", other),
    }
    assert!(matches!(d.state(), DebounceState::Active { .. }));
}

#[test]
fn test_force_resolve_active_is_truncated_at_session_end() {
    let mut d = debouncer(SignalChannel::MultiFace);
    let mut out = Vec::new();
    run(&mut d, 588_000, 591_000, 500, true, &mut out);
    assert_eq!(out.len(), 1);

    let closing = d.force_resolve(Timestamp::from_secs(600));
    out.extend(closing);

    let signals = materialize(&out);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].ended_at, Some(Timestamp::from_secs(600)));
    assert_eq!(signals[0].duration_seconds, Some(12.0));
    assert!(signals[0].is_truncated());
    assert_eq!(signals[0].metadata.get("truncated"), Some(&serde_json::Value::Bool(true)));
}

#[test]
fn test_force_resolve_pending() {
    // Below threshold: discarded.
    let mut short = debouncer(SignalChannel::FaceAbsence);
    short.observe(&obs(SignalChannel::FaceAbsence, 100_000, true)).unwrap();
    assert!(short.force_resolve(Timestamp::from_millis(103_000)).is_empty());

    // Threshold met by session end without another sample: raised and closed.
    let mut long = debouncer(SignalChannel::FaceAbsence);
    long.observe(&obs(SignalChannel::FaceAbsence, 100_000, true)).unwrap();
    let out = long.force_resolve(Timestamp::from_millis(107_000));
    let signals = materialize(&out);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].duration_seconds, Some(7.0));
    assert!(signals[0].is_truncated());
}

fn clearing_face_absence() -> (SignalDebouncer, Vec<SignalTransition>) {
    let mut d = debouncer(SignalChannel::FaceAbsence);
    let mut out = Vec::new();
    run(&mut d, 0, 6_000, 1_000, true, &mut out);
    d.observe(&obs(SignalChannel::FaceAbsence, 6_000, false)).unwrap();
    assert!(matches!(d.state(), DebounceState::Clearing { .. }));
    (d, out)
}

#[test]
fn test_force_resolve_clearing() {
    // Window already ran out: ends where the condition cleared.
    let (mut expired, mut out) = clearing_face_absence();
    out.extend(expired.force_resolve(Timestamp::from_millis(20_000)));
    let s = &materialize(&out)[0];
    assert_eq!(s.ended_at, Some(Timestamp::from_millis(6_000)));
    assert!(!s.is_truncated());

    // Still inside the window: truncated at session end.
    let (mut inside, mut out) = clearing_face_absence();
    out.extend(inside.force_resolve(Timestamp::from_millis(6_500)));
    let s = &materialize(&out)[0];
    assert_eq!(s.ended_at, Some(Timestamp::from_millis(6_500)));
    assert!(s.is_truncated());
}

#[test]
fn test_closed_debouncer_rejects_observations() {
    let mut d = debouncer(SignalChannel::UnusualAudio);
    d.force_resolve(Timestamp::from_secs(10));
    assert!(d.is_closed());

    let err = d.observe(&obs(SignalChannel::UnusualAudio, 11_000, true)).unwrap_err();
    assert!(matches!(err, MonitorError::MonitoringStopped(_)));
}
