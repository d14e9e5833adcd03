//! Sensor and radio drivers for the weigh node.
//!
//! The HX711 driver is generic over [`weighnode_traits::SensorLines`], so the
//! same bit protocol runs against Pi GPIO (feature `hardware`) or against the
//! pin-level simulator in [`sim`].
#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod hx711;
pub mod sim;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use error::HwError;
pub use hx711::{Gain, Hx711};
pub use sim::{SimCriticalSection, SimulatedHx711, SimulatedRadio};
