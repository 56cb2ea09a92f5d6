//! Timer Set Tests

use std::time::{Duration, Instant};

use wireless_uart::link::{SetupStep, TimerKind, TimerSet};

#[test]
fn test_expired_in_deadline_order() {
    let mut timers = TimerSet::new();
    let base = Instant::now();

    let late = timers.schedule_at(TimerKind::Write, base + Duration::from_secs(3));
    let early = timers.schedule_at(
        TimerKind::Setup(SetupStep::Connect),
        base + Duration::from_secs(1),
    );
    let pending = timers.schedule_at(TimerKind::ScanRestart, base + Duration::from_secs(60));

    let fired = timers.expired(base + Duration::from_secs(5));

    assert_eq!(
        fired,
        vec![
            (early, TimerKind::Setup(SetupStep::Connect)),
            (late, TimerKind::Write)
        ]
    );
    assert_eq!(timers.len(), 1);
    assert!(timers.is_pending(pending));
}

#[test]
fn test_nothing_expires_early() {
    let mut timers = TimerSet::new();
    let base = Instant::now();
    timers.schedule_at(TimerKind::ScanRetry, base + Duration::from_secs(1));

    assert!(timers.expired(base).is_empty());
    assert_eq!(timers.len(), 1);
}

#[test]
fn test_cancel_once() {
    let mut timers = TimerSet::new();
    let id = timers.schedule(TimerKind::Write, Duration::from_secs(1));

    assert!(timers.cancel(id));
    assert!(!timers.cancel(id));
    assert!(timers.is_empty());
    assert!(timers.expired(Instant::now() + Duration::from_secs(2)).is_empty());
}

#[test]
fn test_fired_timer_cannot_be_canceled() {
    let mut timers = TimerSet::new();
    let id = timers.schedule(TimerKind::Write, Duration::ZERO);

    assert_eq!(timers.expired(Instant::now() + Duration::from_millis(1)).len(), 1);
    assert!(!timers.cancel(id));
}

#[test]
fn test_next_deadline_is_earliest() {
    let mut timers = TimerSet::new();
    assert!(timers.next_deadline().is_none());

    let base = Instant::now();
    timers.schedule_at(TimerKind::Write, base + Duration::from_secs(9));
    timers.schedule_at(TimerKind::ScanRetry, base + Duration::from_secs(2));

    assert_eq!(timers.next_deadline(), Some(base + Duration::from_secs(2)));
}

#[test]
fn test_ids_are_unique() {
    let mut timers = TimerSet::new();
    let a = timers.schedule(TimerKind::Write, Duration::from_secs(1));
    let b = timers.schedule(TimerKind::Write, Duration::from_secs(1));
    assert_ne!(a, b);
}
