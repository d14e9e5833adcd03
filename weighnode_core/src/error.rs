use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for sensor")]
    SensorTimeout,
    #[error("sensor saturated (raw {0})")]
    SensorSaturation(i32),
    #[error("degenerate calibration: scale is zero")]
    DegenerateCalibration,
    #[error("radio transmit timeout")]
    RadioTxTimeout,
    #[error("radio receive timeout")]
    RadioRxTimeout,
    #[error("radio receive error")]
    RadioRxError,
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    #[error("payload too large: {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing scale")]
    MissingScale,
    #[error("missing radio")]
    MissingRadio,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
