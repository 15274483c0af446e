use crate::domain::temperature::{Celsius, Temperature};
use crate::traits::sensors::humidity::HumiditySensor;
use crate::traits::sensors::temperature::TemperatureSensor;
use core::convert::Infallible;
use rand::Rng;

/// A simulated sensor hovering around fixed values, for hosts without sensor hardware.
pub struct FakeSensor {
    temperature: f32,
    humidity: f32,
    jitter: f32,
}

impl FakeSensor {
    pub fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
            jitter: 0.0,
        }
    }

    /// Adds uniform noise in `-jitter..=jitter` to every reading.
    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter.abs();
        self
    }

    fn noise(&self) -> f32 {
        if self.jitter == 0.0 {
            0.0
        } else {
            rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        }
    }
}

impl Default for FakeSensor {
    fn default() -> Self {
        Self::new(22.0, 45.0)
    }
}

impl TemperatureSensor<Celsius> for FakeSensor {
    type Error = Infallible;

    async fn temperature(&mut self) -> Result<Temperature<Celsius>, Self::Error> {
        Ok(Temperature::new(self.temperature + self.noise()))
    }
}

impl HumiditySensor for FakeSensor {
    type Error = Infallible;

    async fn relative_humidity(&mut self) -> Result<f32, Self::Error> {
        Ok((self.humidity + self.noise()).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_fixed_values() {
        let mut sensor = FakeSensor::new(20.0, 50.0);
        assert_eq!(20.0, block_on(sensor.temperature()).unwrap().raw_value());
        assert_eq!(50.0, block_on(sensor.relative_humidity()).unwrap());
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let mut sensor = FakeSensor::new(20.0, 99.5).with_jitter(1.0);
        for _ in 0..100 {
            let t = block_on(sensor.temperature()).unwrap().raw_value();
            assert!((19.0..=21.0).contains(&t));
            let h = block_on(sensor.relative_humidity()).unwrap();
            assert!((98.5..=100.0).contains(&h));
        }
    }
}
