#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Weigh node acquisition and reporting pipeline (hardware-agnostic).
//!
//! All hardware interaction goes through the `weighnode_traits` capabilities:
//! `Scale` for raw samples, `Clock` for time, `Transceiver` for the radio.
//!
//! ## Architecture
//!
//! - **Calibration**: `(raw - offset) / scale` and tare (`calibration`)
//! - **Filtering**: fixed-window moving average (`filter`)
//! - **Stability**: hysteresis detector emitting enter/exit events (`stability`)
//! - **Reporting**: JSON event lines (`report`) or radio frames (`packet`, `radio`)
//! - **Loop**: `Node` ties the stages together; `runner::run` drives it
//!
//! Radio driver callbacks are delivered as messages over a bounded queue and
//! applied by the loop, so link state has a single writer.

pub mod acquisition;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod node;
pub mod packet;
pub mod radio;
pub mod report;
pub mod runner;
pub mod stability;
pub mod status;
pub mod token;
pub mod util;

pub use builder::NodeBuilder;
pub use calibration::{Calibration, Calibrator};
pub use config::{
    CalibrationCfg, FilterCfg, LiquidCfg, NodeCfg, RadioCfg, ReportMode, RunnerCfg, SensorCfg,
    StabilityCfg, TxPolicy,
};
pub use error::{BuildError, NodeError};
pub use filter::MovingAverage;
pub use node::{Node, TareRequest};
pub use packet::{Packet, WeightReport};
pub use radio::{RadioEvent, RadioIrq, RadioLink, RadioLinkState, event_queue};
pub use report::{EventSink, LineSink};
pub use stability::{StabilityDetector, StabilityEvent, StabilityState};
pub use status::{CycleOutcome, CycleReport, Measurement};
