use std::time::Duration;

use rstest::rstest;
use weighnode_hardware::hx711::{DEFAULT_READY_TIMEOUT, Gain, Hx711, RAIL_HIGH, RAIL_LOW};
use weighnode_hardware::sim::{SimCriticalSection, SimulatedHx711};
use weighnode_traits::clock::test_clock::TestClock;
use weighnode_traits::{NoCriticalSection, Scale};

fn driver(
    values: &[i32],
    gain: Gain,
) -> (Hx711<SimulatedHx711, TestClock, SimCriticalSection>, TestClock, SimCriticalSection) {
    let clock = TestClock::new();
    let irq = SimCriticalSection::new();
    let mut lines = SimulatedHx711::with_conversions(values.iter().copied());
    lines.watch_mask(&irq);
    (Hx711::new(lines, clock.clone(), irq.clone(), gain), clock, irq)
}

#[rstest]
#[case(123_456)]
#[case(-1)]
#[case(-500_000)]
#[case(RAIL_HIGH)]
#[case(RAIL_LOW)]
fn captures_signed_24_bit_codes(#[case] raw: i32) {
    let (mut hx, _clock, _irq) = driver(&[raw], Gain::A128);
    assert_eq!(hx.read_raw(), raw);
}

#[rstest]
#[case(Gain::A128, 1)]
#[case(Gain::B32, 2)]
#[case(Gain::A64, 3)]
fn appends_gain_select_pulses(#[case] gain: Gain, #[case] pulses: u8) {
    let (mut hx, _clock, _irq) = driver(&[10, 20], gain);
    assert_eq!(hx.read_raw(), 10);
    assert_eq!(hx.read_raw(), 20);
    assert_eq!(hx.lines().gain_pulses(), &[pulses, pulses]);
}

#[test]
fn gain_change_applies_to_following_reads() {
    let (mut hx, _clock, _irq) = driver(&[1, 2], Gain::A128);
    hx.read_raw();
    hx.set_gain(Gain::A64);
    hx.read_raw();
    assert_eq!(hx.lines().gain_pulses(), &[1, 3]);
}

#[test]
fn not_ready_returns_zero_after_timeout() {
    let (mut hx, clock, irq) = driver(&[], Gain::A128);
    assert_eq!(hx.read_raw(), 0);
    assert!(clock.elapsed() >= DEFAULT_READY_TIMEOUT);
    // no clock pulses and no masking when the chip never became ready
    assert_eq!(irq.enters(), 0);
}

#[test]
fn custom_ready_timeout_via_scale_trait() {
    let (hx, clock, _irq) = driver(&[], Gain::A128);
    let mut hx = hx.with_ready_timeout(Duration::from_secs(5));
    let raw = hx.read(Duration::from_millis(20)).unwrap();
    assert_eq!(raw, 0);
    assert!(clock.elapsed() >= Duration::from_millis(20));
    assert!(clock.elapsed() < Duration::from_millis(25));
}

#[test]
fn waits_through_busy_polls() {
    let (mut hx, clock, _irq) = driver(&[42], Gain::A128);
    hx.lines_mut().set_busy_polls(10);
    assert_eq!(hx.read_raw(), 42);
    assert!(clock.elapsed() >= Duration::from_millis(2));
}

#[test]
fn capture_runs_entirely_masked() {
    let (mut hx, _clock, irq) = driver(&[7, 8, 9], Gain::B32);
    for _ in 0..3 {
        hx.read_raw();
    }
    assert_eq!(irq.enters(), 3);
    assert_eq!(irq.exits(), 3);
    assert!(!irq.is_masked());
    assert_eq!(hx.lines().unmasked_edges(), 0);
}

#[test]
fn unmasked_driver_is_observable() {
    let clock = TestClock::new();
    let watch = SimCriticalSection::new();
    let mut lines = SimulatedHx711::with_conversions([5]);
    lines.watch_mask(&watch);
    let mut hx = Hx711::new(lines, clock, NoCriticalSection, Gain::A128);
    assert_eq!(hx.read_raw(), 5);
    // 24 data pulses plus one gain pulse, two edges each
    assert_eq!(hx.lines().unmasked_edges(), 50);
}
