use std::sync::atomic::AtomicBool;
use std::time::Duration;

use weighnode_core::calibration::RAIL_HIGH;
use weighnode_core::mocks::{CollectingSink, FailingScale, ScriptedScale};
use weighnode_core::runner::run;
use weighnode_core::{
    Calibration, CalibrationCfg, CycleOutcome, Node, NodeError, RadioLinkState, ReportMode,
    RunnerCfg, event_queue,
};
use weighnode_hardware::{Gain, Hx711, SimCriticalSection, SimulatedHx711, SimulatedRadio};
use weighnode_traits::clock::test_clock::TestClock;

fn cal_cfg(scale: f32) -> CalibrationCfg {
    CalibrationCfg {
        scale,
        tare_samples: 20,
        tare_interval_ms: 10,
    }
}

fn node_error(e: &eyre::Report) -> Option<&NodeError> {
    e.downcast_ref::<NodeError>()
}

#[test]
fn hx711_to_serial_lines_end_to_end() {
    let clock = TestClock::new();
    let mut lines = SimulatedHx711::new();
    for _ in 0..20 {
        lines.push_conversion(8_000);
    }
    // 250 g at 100 counts/g, then the load is lifted
    for _ in 0..4 {
        lines.push_conversion(33_000);
    }
    lines.push_conversion(8_000);
    let hx = Hx711::new(lines, clock.clone(), SimCriticalSection::new(), Gain::A128);

    let sink = CollectingSink::new();
    let mut node = Node::builder()
        .with_scale(hx)
        .with_clock(Box::new(clock.clone()))
        .with_calibration_cfg(cal_cfg(100.0))
        .with_sink(sink.clone())
        .build()
        .unwrap();

    assert_eq!(node.boot().unwrap(), 8_000);
    // settle plus 19 gaps between tare reads
    assert!(clock.elapsed() >= Duration::from_millis(500 + 190));

    for _ in 0..5 {
        node.run_cycle().unwrap();
    }

    let out = sink.lines();
    assert_eq!(out.len(), 2, "{out:?}");
    assert!(out[0].starts_with("{\"uuid\":\""), "{}", out[0]);
    assert!(out[0].ends_with("\",\"weight\":250.00}"), "{}", out[0]);
    // 8-4-4-4-12 hex token
    let token = &out[0][9..45];
    assert_eq!(token.len(), 36);
    assert_eq!(token.matches('-').count(), 4);
    assert_eq!(out[1], "{\"weight\":200.00}");
}

#[test]
fn sensor_timeout_feeds_sentinel_zero_through_pipeline() {
    let clock = TestClock::new();
    let lines = SimulatedHx711::with_conversions(std::iter::repeat_n(8_000, 20));
    let hx = Hx711::new(lines, clock.clone(), SimCriticalSection::new(), Gain::A128);
    let mut node = Node::builder()
        .with_scale(hx)
        .with_clock(Box::new(clock.clone()))
        .with_calibration_cfg(cal_cfg(100.0))
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    node.boot().unwrap();

    let before = clock.elapsed();
    let report = node.run_cycle().unwrap();
    assert!(clock.elapsed() - before >= Duration::from_millis(200));
    match report.outcome {
        CycleOutcome::Measured(m) => {
            assert_eq!(m.raw, 0);
            assert_eq!(m.weight, -80.0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn saturated_sample_is_discarded_with_short_backoff() {
    let mut values = vec![0; 20];
    values.extend([RAIL_HIGH, 100]);
    let mut node = Node::builder()
        .with_scale(ScriptedScale::new(values))
        .with_clock(Box::new(TestClock::new()))
        .with_calibration_cfg(cal_cfg(10.0))
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    node.boot().unwrap();

    let report = node.run_cycle().unwrap();
    assert!(report.is_saturated());
    assert_eq!(report.delay, Duration::from_millis(50));
    assert_eq!(node.filtered(), 0.0);

    let report = node.run_cycle().unwrap();
    assert!(!report.is_saturated());
    assert_eq!(report.delay, Duration::from_millis(100));
    assert_eq!(node.filtered(), 10.0);
}

#[test]
fn retare_request_is_consumed_at_start_of_cycle() {
    let mut values = vec![1_000; 20];
    values.push(1_500);
    values.extend(std::iter::repeat_n(2_000, 21));
    let mut node = Node::builder()
        .with_scale(ScriptedScale::new(values))
        .with_clock(Box::new(TestClock::new()))
        .with_calibration_cfg(cal_cfg(10.0))
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    node.boot().unwrap();
    assert_eq!(node.run_cycle().unwrap().event(), None);
    assert_eq!(node.filtered(), 50.0);

    let req = node.tare_request();
    req.request();
    assert!(req.is_pending());
    let report = node.run_cycle().unwrap();
    assert!(report.retared);
    assert!(!req.is_pending());
    assert_eq!(node.calibration().offset, 2_000);
    // pre-tare history is gone
    assert_eq!(node.filtered(), 0.0);
}

#[test]
fn tare_of_only_rails_keeps_offset() {
    let mut node = Node::builder()
        .with_scale(ScriptedScale::new(vec![RAIL_HIGH; 20]))
        .with_clock(Box::new(TestClock::new()))
        .with_calibration(Calibration {
            offset: 123,
            scale: 10.0,
        })
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    let err = node.boot().unwrap_err();
    assert_eq!(node_error(&err), Some(&NodeError::SensorSaturation(RAIL_HIGH)));
    assert_eq!(node.calibration().offset, 123);
}

#[test]
fn weight_averaged_uses_rounded_mean() {
    let mut values = vec![1_000; 20];
    values.extend([1_100, 1_120, 1_110]);
    let mut node = Node::builder()
        .with_scale(ScriptedScale::new(values))
        .with_clock(Box::new(TestClock::new()))
        .with_calibration_cfg(cal_cfg(10.0))
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    node.boot().unwrap();
    assert_eq!(node.weight_averaged(3).unwrap(), 11.0);
}

#[test]
fn scale_fault_is_propagated_as_io_error() {
    let mut node = Node::builder()
        .with_scale(FailingScale)
        .with_clock(Box::new(TestClock::new()))
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    let err = node.run_cycle().unwrap_err();
    assert_eq!(
        node_error(&err),
        Some(&NodeError::Io("scale bus fault".into()))
    );
    assert!(format!("{err:#}").contains("reading scale"));
}

#[test]
fn radio_mode_boots_link_and_sends_reports() {
    let radio = SimulatedRadio::new();
    let (irq, events) = event_queue(16);
    radio.attach(irq);

    let mut values = vec![1_000; 20];
    values.extend([3_000, 3_000, 3_000]);
    let mut node = Node::builder()
        .with_scale(ScriptedScale::new(values))
        .with_clock(Box::new(TestClock::new()))
        .with_calibration_cfg(cal_cfg(10.0))
        .with_runner(RunnerCfg {
            mode: ReportMode::Radio,
            ..RunnerCfg::default()
        })
        .with_radio(radio.clone(), events)
        .build()
        .unwrap();
    node.boot().unwrap();
    assert_eq!(radio.log().inits, 1);

    assert_eq!(node.run_cycle().unwrap().link_state, Some(RadioLinkState::Tx));
    assert_eq!(node.run_cycle().unwrap().link_state, Some(RadioLinkState::Idle));
    let sent = radio.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], b"\x01weight=200.000,liquid_detected=true".to_vec());

    node.run_cycle().unwrap();
    let stats = node.link().unwrap().stats();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.tx_done, 1);
}

#[test]
fn runner_sleeps_cycle_delay_and_stops_at_limit() {
    let clock = TestClock::new();
    let mut node = Node::builder()
        .with_scale(ScriptedScale::new(vec![0; 30]))
        .with_clock(Box::new(clock.clone()))
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    node.boot().unwrap();

    let before = clock.elapsed();
    let shutdown = AtomicBool::new(false);
    let summary = run(&mut node, &shutdown, Some(5)).unwrap();
    assert_eq!(summary.cycles, 5);
    assert_eq!(summary.saturated, 0);
    assert_eq!(clock.elapsed() - before, Duration::from_millis(500));
    assert_eq!(node.cycles(), 5);
}

#[test]
fn runner_honours_shutdown_flag() {
    let mut node = Node::builder()
        .with_scale(ScriptedScale::new(vec![]))
        .with_clock(Box::new(TestClock::new()))
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();
    let shutdown = AtomicBool::new(true);
    let summary = run(&mut node, &shutdown, None).unwrap();
    assert_eq!(summary.cycles, 0);
}
