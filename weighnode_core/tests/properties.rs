use proptest::prelude::*;
use weighnode_core::calibration::Calibration;
use weighnode_core::packet::{Packet, decode, encode};
use weighnode_core::{MovingAverage, StabilityCfg, StabilityDetector};

fn mean(values: &[f32]) -> f64 {
    values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
}

proptest! {
    #[test]
    fn partial_window_output_is_plain_mean(
        values in prop::collection::vec(-1000.0f32..1000.0, 1..10)
    ) {
        let mut ma = MovingAverage::new(10);
        let mut out = 0.0;
        for &v in &values {
            out = ma.push(v);
        }
        prop_assert!((f64::from(out) - mean(&values)).abs() < 1e-3);
    }

    #[test]
    fn oldest_sample_stops_contributing(
        first in -1.0e4f32..1.0e4,
        rest in prop::collection::vec(-1000.0f32..1000.0, 10)
    ) {
        let mut ma = MovingAverage::new(10);
        ma.push(first);
        let mut out = 0.0;
        for &v in &rest {
            out = ma.push(v);
        }
        prop_assert!((f64::from(out) - mean(&rest)).abs() < 1e-3);
    }

    #[test]
    fn offset_reads_as_zero_weight(
        offset in -8_388_608i32..=8_388_607,
        scale in prop_oneof![-1.0e5f32..-1.0e-3, 1.0e-3f32..1.0e5],
    ) {
        let cal = Calibration { offset, scale };
        prop_assert_eq!(cal.to_weight(offset), 0.0);
    }

    #[test]
    fn codec_round_trips_within_limit(id in any::<u8>(), text in "[ -~]{0,63}") {
        let bytes = encode(id, &text, 64).unwrap();
        prop_assert_eq!(decode(&bytes).unwrap(), Packet::new(id, text.as_bytes()));
    }

    #[test]
    fn stability_never_declared_before_kth_quiet_cycle(
        k in 1u32..8,
        w in 20.0f32..500.0,
    ) {
        let mut d = StabilityDetector::new(&StabilityCfg { delta_g: 10.0, run_length: k });
        // the jump from the 0.0 seed is not a quiet cycle
        prop_assert!(d.update(w, 0).is_none());
        for i in 1..k {
            prop_assert!(d.update(w, i).is_none());
            prop_assert!(!d.is_stable());
        }
        prop_assert!(d.update(w, k).is_some());
        prop_assert!(d.is_stable());
    }
}
