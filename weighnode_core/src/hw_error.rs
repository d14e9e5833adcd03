//! Maps `Box<dyn Error>` from trait boundaries to typed `NodeError`.
//!
//! The traits in `weighnode_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `weighnode_hardware::HwError` downcasting.

use crate::error::NodeError;

/// Map a trait-boundary error to a typed `NodeError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> NodeError {
    #[cfg(feature = "hardware-errors")]
    {
        use weighnode_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::DataReadyTimeout => NodeError::SensorTimeout,
                HwError::Io(io) => NodeError::Io(io.to_string()),
                HwError::Radio(_) | HwError::RadioBusy(_) => NodeError::Hardware(hw.to_string()),
                HwError::Gpio(_) => NodeError::HardwareFault(hw.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return NodeError::Io(io.to_string());
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        NodeError::SensorTimeout
    } else {
        NodeError::Hardware(s)
    }
}
