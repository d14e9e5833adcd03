//! Raspberry Pi GPIO backing for the sensor lines.
use rppal::gpio::{Gpio, InputPin, OutputPin};
use weighnode_traits::SensorLines;

use crate::error::{HwError, Result};

/// DT input and SCK output pins of an HX711 wired to the Pi header.
pub struct RppalLines {
    dt: InputPin,
    sck: OutputPin,
}

impl RppalLines {
    /// Claim `dt_pin` and `sck_pin` (BCM numbering). SCK starts low.
    pub fn open(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("dt pin {dt_pin}: {e}")))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("sck pin {sck_pin}: {e}")))?
            .into_output();
        sck.set_low();
        Ok(Self { dt, sck })
    }
}

impl SensorLines for RppalLines {
    #[inline]
    fn data_is_high(&mut self) -> bool {
        self.dt.is_high()
    }

    #[inline]
    fn set_clock(&mut self, high: bool) {
        if high {
            self.sck.set_high();
        } else {
            self.sck.set_low();
        }
    }
}
