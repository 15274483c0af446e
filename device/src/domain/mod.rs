pub mod led;
pub mod temperature;

use core::fmt::{Debug, Formatter};
use temperature::*;

/// A single reading of both channels of an environmental sensor.
#[derive(Copy, Clone, PartialEq)]
pub struct SensorAcquisition<S: TemperatureScale> {
    pub temperature: Temperature<S>,
    pub relative_humidity: f32,
}

impl<S: TemperatureScale> SensorAcquisition<S> {
    pub fn new(temperature: Temperature<S>, relative_humidity: f32) -> Self {
        Self {
            temperature,
            relative_humidity,
        }
    }
}

impl SensorAcquisition<Celsius> {
    /// Moves the temperature channel into the reporting unit, leaving humidity untouched.
    pub fn calibrated(self, calibration: &Calibration) -> SensorAcquisition<Fahrenheit> {
        SensorAcquisition {
            temperature: calibration.to_reporting_unit(self.temperature),
            relative_humidity: self.relative_humidity,
        }
    }
}

impl<S: TemperatureScale> Debug for SensorAcquisition<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SensorAcquisition")
            .field("temperature", &self.temperature)
            .field("relative_humidity", &self.relative_humidity)
            .finish()
    }
}
