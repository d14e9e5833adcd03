use std::error::Error;
use std::time::Duration;

use rstest::rstest;
use weighnode_core::error::NodeError;
use weighnode_core::hw_error::map_hw_error;
use weighnode_core::mocks::CollectingSink;
use weighnode_core::{Calibration, Node};
use weighnode_hardware::HwError;
use weighnode_traits::Scale;

/// A scale that returns OK once, then errors, to exercise an error at a
/// non-first cycle.
struct FlakyScale {
    ok_sent: bool,
}
impl Scale for FlakyScale {
    fn read(&mut self, _timeout: Duration) -> Result<i32, Box<dyn Error + Send + Sync>> {
        if self.ok_sent {
            Err(Box::new(HwError::Gpio("dt line stuck".into())))
        } else {
            self.ok_sent = true;
            Ok(0)
        }
    }
}

#[test]
fn gpio_fault_maps_to_hardware_fault() {
    let mut node = Node::builder()
        .with_scale(FlakyScale { ok_sent: false })
        .with_calibration(Calibration::default())
        .with_sink(CollectingSink::new())
        .build()
        .unwrap();

    // First cycle OK, second should error:
    let _ = node.run_cycle().unwrap();
    let err = node.run_cycle().expect_err("expected hardware error");
    match err.downcast_ref::<NodeError>() {
        Some(NodeError::HardwareFault(msg)) => assert!(msg.contains("dt line stuck")),
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[rstest]
#[case(HwError::DataReadyTimeout, NodeError::SensorTimeout)]
#[case(
    HwError::Radio("spi".into()),
    NodeError::Hardware("radio error: spi".into())
)]
#[case(
    HwError::RadioBusy("tx"),
    NodeError::Hardware("radio busy: tx".into())
)]
#[case(
    HwError::Gpio("pin 5".into()),
    NodeError::HardwareFault("gpio error: pin 5".into())
)]
fn typed_hardware_errors_are_mapped(#[case] hw: HwError, #[case] expected: NodeError) {
    assert_eq!(map_hw_error(&hw), expected);
}

#[test]
fn io_errors_keep_their_message() {
    let io = std::io::Error::other("bus gone");
    assert_eq!(map_hw_error(&io), NodeError::Io("bus gone".into()));
    let hw = HwError::Io(std::io::Error::other("bus gone"));
    assert_eq!(map_hw_error(&hw), NodeError::Io("bus gone".into()));
}

#[rstest]
#[case("Sensor TIMEOUT after 200ms", NodeError::SensorTimeout)]
#[case("checksum mismatch", NodeError::Hardware("checksum mismatch".into()))]
fn untyped_errors_fall_back_to_message(#[case] msg: &str, #[case] expected: NodeError) {
    let boxed: Box<dyn Error + Send + Sync> = msg.into();
    assert_eq!(map_hw_error(&*boxed), expected);
}
