use std::time::Duration;

use rstest::rstest;
use weighnode_core::radio::{EVENT_QUEUE_DEPTH, RadioIrq};
use weighnode_core::{
    LiquidCfg, RadioCfg, RadioLink, RadioLinkState, StabilityEvent, TxPolicy, event_queue,
};
use weighnode_hardware::sim::{RxOutcome, TxOutcome};
use weighnode_hardware::SimulatedRadio;
use weighnode_traits::{RadioCallbacks, RadioStatus};

struct Rig {
    link: RadioLink<SimulatedRadio>,
    radio: SimulatedRadio,
    irq: RadioIrq,
}

fn rig(cfg: RadioCfg) -> Rig {
    let radio = SimulatedRadio::new();
    let (irq, events) = event_queue(EVENT_QUEUE_DEPTH);
    radio.attach(irq.clone());
    let mut link = RadioLink::new(radio.clone(), events, cfg, LiquidCfg::default());
    link.init().unwrap();
    Rig { link, radio, irq }
}

fn delta_rig() -> Rig {
    rig(RadioCfg::default())
}

#[test]
fn init_configures_channel_and_modem() {
    let r = delta_rig();
    let log = r.radio.log();
    assert_eq!(log.inits, 1);
    assert_eq!(log.frequency_hz, Some(868_000_000));
    let tx = log.tx_config.unwrap();
    assert_eq!(tx.spreading_factor, 7);
    assert_eq!(tx.timeout, Duration::from_millis(3000));
    assert_eq!(log.rx_config.unwrap().max_payload, 64);
    assert_eq!(r.link.state(), RadioLinkState::Idle);
}

#[rstest]
#[case(56.0, RadioLinkState::Tx)]
#[case(55.0, RadioLinkState::Tx)]
#[case(53.0, RadioLinkState::Idle)]
#[case(44.5, RadioLinkState::Tx)]
fn delta_policy_threshold(#[case] weight: f32, #[case] expected: RadioLinkState) {
    let mut r = delta_rig();
    r.link.set_last_transmitted(50.0);
    assert_eq!(r.link.step(weight, None), expected);
    // the baseline only moves once the report is on air
    assert_eq!(r.link.last_transmitted(), 50.0);
    r.link.step(weight, None);
    if expected == RadioLinkState::Idle {
        assert_eq!(r.link.last_transmitted(), 50.0);
    } else {
        assert_eq!(r.link.last_transmitted(), weight);
    }
}

#[test]
fn transmit_sends_id_prefixed_report_then_sleeps_on_tx_done() {
    let mut r = delta_rig();
    assert_eq!(r.link.step(56.0, None), RadioLinkState::Tx);
    assert_eq!(r.link.step(56.0, None), RadioLinkState::Idle);

    let sent = r.radio.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0], 0x01);
    assert_eq!(&sent[0][1..], b"weight=56.000,liquid_detected=true");

    // TxDone was queued by the driver; the next step applies it
    let sleeps_before = r.radio.log().sleeps;
    r.link.step(56.0, None);
    assert_eq!(r.radio.log().sleeps, sleeps_before + 1);
    let stats = r.link.stats();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.tx_done, 1);
}

#[test]
fn light_load_reports_no_liquid() {
    let mut r = delta_rig();
    r.link.step(15.0, None);
    r.link.step(15.0, None);
    assert_eq!(&r.radio.sent()[0][1..], b"weight=15.000,liquid_detected=false");
}

#[test]
fn busy_hardware_defers_transmission() {
    let mut r = delta_rig();
    r.radio.force_status(RadioStatus::TxRunning);
    assert_eq!(r.link.step(100.0, None), RadioLinkState::Idle);
    assert_eq!(r.link.last_transmitted(), 0.0);

    r.radio.force_status(RadioStatus::Idle);
    assert_eq!(r.link.step(100.0, None), RadioLinkState::Tx);
}

#[test]
fn tx_timeout_is_counted_and_recovered() {
    let mut r = delta_rig();
    r.radio.set_tx_outcome(TxOutcome::Timeout);
    r.link.step(80.0, None);
    r.link.step(80.0, None);
    assert_eq!(r.radio.sent().len(), 1);

    let sleeps_before = r.radio.log().sleeps;
    assert_eq!(r.link.step(80.0, None), RadioLinkState::Idle);
    assert_eq!(r.link.stats().tx_timeouts, 1);
    assert_eq!(r.radio.log().sleeps, sleeps_before + 1);

    // link is usable again
    r.radio.set_tx_outcome(TxOutcome::Done);
    assert_eq!(r.link.step(120.0, None), RadioLinkState::Tx);
}

#[test]
fn send_failure_is_counted_not_fatal() {
    let mut r = delta_rig();
    r.radio.fail_next_send();
    r.link.step(70.0, None);
    assert_eq!(r.link.step(70.0, None), RadioLinkState::Idle);
    let stats = r.link.stats();
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.send_failures, 1);
}

#[test]
fn oversized_report_is_dropped() {
    let mut r = rig(RadioCfg {
        max_payload: 10,
        ..RadioCfg::default()
    });
    r.link.step(70.0, None);
    r.link.step(70.0, None);
    assert!(r.radio.sent().is_empty());
    assert_eq!(r.link.stats().send_failures, 1);
}

#[test]
fn frame_for_our_channel_is_accepted_and_receive_rearmed() {
    let mut r = delta_rig();
    r.irq
        .on_rx_done(b"\x01weight=12.000,liquid_detected=false", -40, 7);
    assert_eq!(r.link.step(0.0, None), RadioLinkState::Idle);

    let inbox = r.link.inbox().unwrap();
    assert!(inbox.accepted);
    assert_eq!(inbox.rssi, -40);
    assert_eq!(inbox.snr, 7);
    assert_eq!(r.link.stats().received, 1);
    assert_eq!(r.radio.log().receives, vec![Duration::from_millis(3000)]);
}

#[test]
fn frame_for_another_channel_is_ignored() {
    let mut r = delta_rig();
    r.irq.on_rx_done(b"\x99weight=1.000,liquid_detected=false", -90, -3);
    r.link.step(0.0, None);
    assert!(!r.link.inbox().unwrap().accepted);
    let stats = r.link.stats();
    assert_eq!(stats.received, 0);
    assert_eq!(stats.ignored, 1);
}

#[test]
fn overlong_frame_is_truncated_to_buffer() {
    let mut r = rig(RadioCfg {
        max_payload: 8,
        ..RadioCfg::default()
    });
    r.irq.on_rx_done(&[0x01; 20], -50, 5);
    r.link.step(0.0, None);
    assert_eq!(r.link.inbox().unwrap().bytes.len(), 8);
}

#[rstest]
#[case(RxOutcome::Timeout)]
#[case(RxOutcome::Error)]
fn rx_faults_are_counted_and_receive_rearmed(#[case] outcome: RxOutcome) {
    let mut r = delta_rig();
    r.radio.script_rx(outcome.clone());
    r.radio.script_rx(RxOutcome::Frame(b"\x01x=1".to_vec()));
    // a frame puts the link in Rx, which arms the scripted receive
    r.irq.on_rx_done(b"\x01weight=1.000,liquid_detected=false", -40, 7);
    r.link.step(0.0, None);
    // the fault fires from the armed receive and is handled next step
    assert_eq!(r.link.step(0.0, None), RadioLinkState::Idle);

    let stats = r.link.stats();
    match outcome {
        RxOutcome::Timeout => assert_eq!(stats.rx_timeouts, 1),
        RxOutcome::Error => assert_eq!(stats.rx_errors, 1),
        RxOutcome::Frame(_) => unreachable!(),
    }
    assert_eq!(r.radio.log().receives.len(), 2);
}

#[test]
fn event_policy_latches_event_until_radio_idle() {
    let mut r = rig(RadioCfg {
        policy: TxPolicy::Event,
        ..RadioCfg::default()
    });
    // weight change alone does not transmit
    assert_eq!(r.link.step(500.0, None), RadioLinkState::Idle);

    let ev = StabilityEvent::StableExited { weight: 42.0 };
    r.radio.force_status(RadioStatus::TxRunning);
    assert_eq!(r.link.step(42.0, Some(&ev)), RadioLinkState::Idle);

    r.radio.force_status(RadioStatus::Idle);
    assert_eq!(r.link.step(180.0, None), RadioLinkState::Tx);
    // the frame carries the event's weight, not the reading at send time
    r.link.step(250.0, None);
    assert_eq!(&r.radio.sent()[0][1..], b"weight=42.000,liquid_detected=true");
    assert_eq!(r.link.last_transmitted(), 42.0);

    // latch was consumed
    r.link.step(250.0, None);
    assert_eq!(r.link.step(250.0, None), RadioLinkState::Idle);
    assert_eq!(r.radio.sent().len(), 1);
}

#[test]
fn newer_event_replaces_latched_weight() {
    let mut r = rig(RadioCfg {
        policy: TxPolicy::Event,
        ..RadioCfg::default()
    });
    r.radio.force_status(RadioStatus::RxRunning);
    let entered = StabilityEvent::StableEntered {
        weight: 120.0,
        token: None,
    };
    r.link.step(120.0, Some(&entered));
    let exited = StabilityEvent::StableExited { weight: 64.0 };
    r.link.step(64.0, Some(&exited));

    r.radio.force_status(RadioStatus::Idle);
    r.link.step(10.0, None);
    r.link.step(10.0, None);
    let sent = r.radio.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][1..], b"weight=64.000,liquid_detected=true");
}

#[test]
fn callback_between_tx_decision_and_send_keeps_event_report() {
    let mut r = rig(RadioCfg {
        policy: TxPolicy::Event,
        ..RadioCfg::default()
    });
    let ev = StabilityEvent::StableEntered {
        weight: 120.0,
        token: None,
    };
    assert_eq!(r.link.step(120.0, Some(&ev)), RadioLinkState::Tx);
    r.irq.on_rx_done(&[0x99, b'x'], -70, 2);

    let states: Vec<_> = (0..4).map(|_| r.link.step(130.0, None)).collect();
    assert_eq!(states[0], RadioLinkState::Tx);
    let sent = r.radio.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][1..], b"weight=120.000,liquid_detected=true");
    assert_eq!(r.link.stats().ignored, 1);
}

#[test]
fn callback_between_tx_decision_and_send_keeps_delta_baseline() {
    let mut r = delta_rig();
    assert_eq!(r.link.step(80.0, None), RadioLinkState::Tx);
    r.irq.on_rx_timeout();

    // the timeout is handled, then the owed report still goes out
    assert_eq!(r.link.step(80.0, None), RadioLinkState::Tx);
    assert_eq!(r.link.last_transmitted(), 0.0);
    assert!(r.radio.sent().is_empty());
    assert_eq!(r.link.step(80.0, None), RadioLinkState::Idle);
    assert_eq!(r.radio.sent().len(), 1);
    assert_eq!(r.link.last_transmitted(), 80.0);
    assert_eq!(r.link.stats().rx_timeouts, 1);
}

#[test]
fn failed_send_is_retried_on_next_idle_cycle() {
    let mut r = rig(RadioCfg {
        policy: TxPolicy::Event,
        ..RadioCfg::default()
    });
    r.radio.fail_next_send();
    let ev = StabilityEvent::StableExited { weight: 33.0 };
    r.link.step(33.0, Some(&ev));
    r.link.step(33.0, None);
    assert!(r.radio.sent().is_empty());

    assert_eq!(r.link.step(90.0, None), RadioLinkState::Tx);
    r.link.step(90.0, None);
    assert_eq!(&r.radio.sent()[0][1..], b"weight=33.000,liquid_detected=true");
    let stats = r.link.stats();
    assert_eq!(stats.send_failures, 1);
    assert_eq!(stats.sent, 1);
}

#[test]
fn full_queue_counts_dropped_callbacks() {
    let radio = SimulatedRadio::new();
    let (irq, events) = event_queue(1);
    let mut link = RadioLink::new(radio, events, RadioCfg::default(), LiquidCfg::default());
    irq.on_tx_done();
    irq.on_tx_done();
    assert_eq!(irq.dropped(), 1);
    link.drain_events();
    assert_eq!(link.stats().tx_done, 1);
}
