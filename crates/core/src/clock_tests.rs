use super::*;
use std::time::Duration;

#[test]
fn fake_clock_advances_both_instant_and_epoch() {
    let clock = FakeClock::new();
    let before = clock.now();
    let before_epoch = clock.epoch_ms();

    clock.advance(Duration::from_secs(30));

    assert_eq!(clock.now(), before + Duration::from_secs(30));
    assert_eq!(clock.epoch_ms(), before_epoch + 30_000);
}

#[test]
fn fake_clock_set_epoch_ms_overrides_directly() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn system_clock_epoch_ms_is_plausible() {
    let clock = SystemClock;
    // Anything after 2020-01-01 in ms since epoch.
    assert!(clock.epoch_ms() > 1_577_836_800_000);
}
