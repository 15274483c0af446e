pub mod register;
use crate::domain::{temperature::Celsius, temperature::Temperature, SensorAcquisition};
use crate::traits::sensors::humidity::HumiditySensor;
use crate::traits::sensors::temperature::TemperatureSensor;
use embedded_hal::i2c::I2c;
use register::calibration::*;
use register::ctrl1::{BlockDataUpdate, Ctrl1, OutputDataRate};
use register::ctrl2::Ctrl2;
use register::h_out::Hout;
use register::status::Status;
use register::t_out::Tout;
use register::who_am_i::{WhoAmI, HTS221_ID};

pub const ADDR: u8 = 0x5F;

#[derive(Debug, thiserror::Error)]
pub enum Hts221Error<E: core::fmt::Debug> {
    #[error("i2c bus error: {0:?}")]
    I2c(E),
    #[error("sensor has not been initialized")]
    NotCalibrated,
    #[error("unexpected device id {0:#04x}")]
    UnknownDevice(u8),
}

/// HTS221 relative humidity and temperature sensor, as found on the Raspberry Pi Sense HAT.
pub struct Hts221<I: I2c> {
    i2c: I,
    address: u8,
    calibration: Option<Calibration>,
}

impl<I: I2c> Hts221<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            address: ADDR,
            calibration: None,
        }
    }

    /// Probes, powers up and calibrates the sensor. Must be called before reading.
    pub fn initialize(&mut self) -> Result<(), Hts221Error<I::Error>> {
        let id = WhoAmI::read(self.address, &mut self.i2c)?;
        if id != HTS221_ID {
            return Err(Hts221Error::UnknownDevice(id));
        }

        Ctrl2::modify(self.address, &mut self.i2c, |reg| {
            reg.boot();
        })?;

        Ctrl1::modify(self.address, &mut self.i2c, |reg| {
            reg.power_active()
                .output_data_rate(OutputDataRate::Hz1)
                .block_data_update(BlockDataUpdate::MsbLsbReading);
        })?;

        loop {
            // Ensure status is emptied
            if let Ok(status) = Status::read(self.address, &mut self.i2c) {
                if !status.any_available() {
                    break;
                }
            }
            Hout::read(self.address, &mut self.i2c)?;
            Tout::read(self.address, &mut self.i2c)?;
        }

        self.calibration
            .replace(Calibration::read(self.address, &mut self.i2c)?);
        log::debug!("HTS221 calibrated: {:?}", self.calibration);
        Ok(())
    }

    pub fn read(&mut self) -> Result<SensorAcquisition<Celsius>, Hts221Error<I::Error>> {
        Ok(SensorAcquisition::new(
            self.read_temperature()?,
            self.read_humidity()?,
        ))
    }

    fn read_temperature(&mut self) -> Result<Temperature<Celsius>, Hts221Error<I::Error>> {
        let calibration = self.calibration.ok_or(Hts221Error::NotCalibrated)?;
        let t_out = Tout::read(self.address, &mut self.i2c)?;
        Ok(calibration.calibrated_temperature(t_out))
    }

    fn read_humidity(&mut self) -> Result<f32, Hts221Error<I::Error>> {
        let calibration = self.calibration.ok_or(Hts221Error::NotCalibrated)?;
        let h_out = Hout::read(self.address, &mut self.i2c)?;
        Ok(calibration.calibrated_humidity(h_out))
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> TemperatureSensor<Celsius> for Hts221<I> {
    type Error = Hts221Error<I::Error>;

    async fn temperature(&mut self) -> Result<Temperature<Celsius>, Self::Error> {
        self.read_temperature()
    }
}

impl<I: I2c> HumiditySensor for Hts221<I> {
    type Error = Hts221Error<I::Error>;

    async fn relative_humidity(&mut self) -> Result<f32, Self::Error> {
        self.read_humidity()
    }
}

impl<E: core::fmt::Debug> From<E> for Hts221Error<E> {
    fn from(e: E) -> Hts221Error<E> {
        Hts221Error::I2c(e)
    }
}
