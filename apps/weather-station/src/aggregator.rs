//! Fixed-size window of readings reduced to one averaged observation.

use crate::observation::Observation;
use chrono::{DateTime, Utc};
use heapless::Vec;
use weather_device::domain::temperature::Fahrenheit;
use weather_device::domain::SensorAcquisition;

/// Largest supported window.
pub const MAX_WINDOW_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("window size must be between 1 and 64, got {0}")]
    InvalidSize(usize),
    #[error("window already holds all of its samples")]
    Full,
    #[error("window holds {len} of {size} samples")]
    Incomplete { len: usize, size: usize },
}

pub struct SamplingAggregator {
    device_id: String,
    size: usize,
    temperature: Vec<f64, MAX_WINDOW_SIZE>,
    humidity: Vec<f64, MAX_WINDOW_SIZE>,
}

impl SamplingAggregator {
    pub fn new<D: Into<String>>(device_id: D, size: usize) -> Result<Self, WindowError> {
        if !(1..=MAX_WINDOW_SIZE).contains(&size) {
            return Err(WindowError::InvalidSize(size));
        }
        Ok(Self {
            device_id: device_id.into(),
            size,
            temperature: Vec::new(),
            humidity: Vec::new(),
        })
    }

    /// Appends a reading at the next free slot of the window.
    pub fn record_sample(
        &mut self,
        reading: SensorAcquisition<Fahrenheit>,
    ) -> Result<(), WindowError> {
        if self.is_window_full() {
            return Err(WindowError::Full);
        }
        self.temperature
            .push(reading.temperature.raw_value() as f64)
            .map_err(|_| WindowError::Full)?;
        self.humidity
            .push(reading.relative_humidity as f64)
            .map_err(|_| WindowError::Full)?;
        Ok(())
    }

    pub fn is_window_full(&self) -> bool {
        self.temperature.len() == self.size
    }

    pub fn len(&self) -> usize {
        self.temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Averages a full window into an observation stamped with the current time, then
    /// empties the window.
    pub fn compute_average_and_reset(&mut self) -> Result<Observation, WindowError> {
        self.compute_average_and_reset_at(Utc::now())
    }

    pub fn compute_average_and_reset_at(
        &mut self,
        timestamp: DateTime<Utc>,
    ) -> Result<Observation, WindowError> {
        if !self.is_window_full() {
            return Err(WindowError::Incomplete {
                len: self.len(),
                size: self.size,
            });
        }
        let observation = Observation {
            device_id: self.device_id.clone(),
            timestamp,
            temperature: mean(&self.temperature),
            humidity: mean(&self.humidity),
        };
        self.reset();
        Ok(observation)
    }

    /// Drops every sample of the current window.
    pub fn reset(&mut self) {
        self.temperature.clear();
        self.humidity.clear();
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
