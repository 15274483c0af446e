use crate::domain::temperature::{Celsius, Temperature};
use embedded_hal::i2c::I2c;

// 16-byte block of calibration at 0x30 with high bit for auto-increment
const CALIBRATION_16: u8 = 0xB0;

#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub temperature: TemperatureCalibration,
    pub humidity: HumidityCalibration,
}

impl Calibration {
    pub fn read<I: I2c>(address: u8, i2c: &mut I) -> Result<Calibration, I::Error> {
        let mut buf = [0; 16];
        i2c.write_read(address, &[CALIBRATION_16], &mut buf)?;
        Ok(buf.into())
    }

    pub fn calibrated_temperature(&self, t_out: i16) -> Temperature<Celsius> {
        self.temperature.calibrated(t_out)
    }

    pub fn calibrated_humidity(&self, h_out: i16) -> f32 {
        self.humidity.calibrated(h_out)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TemperatureCalibration {
    pub t0_out: i16,
    pub t1_out: i16,
    pub t0_degc: Temperature<Celsius>,
    pub t1_degc: Temperature<Celsius>,
    pub slope: f32,
}

impl TemperatureCalibration {
    pub fn calibrated(&self, t_out: i16) -> Temperature<Celsius> {
        self.t0_degc + (self.slope * (t_out as f32 - self.t0_out as f32))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HumidityCalibration {
    pub h0_out: i16,
    pub h1_out: i16,
    pub h0_rh: f32,
    pub h1_rh: f32,
    pub slope: f32,
}

impl HumidityCalibration {
    /// Relative humidity in percent, clamped to the physical range.
    pub fn calibrated(&self, h_out: i16) -> f32 {
        let rh = self.h0_rh + (self.slope * (h_out as f32 - self.h0_out as f32));
        rh.clamp(0.0, 100.0)
    }
}

impl From<[u8; 16]> for Calibration {
    fn from(raw: [u8; 16]) -> Calibration {
        let t0_out = i16::from_le_bytes([raw[12], raw[13]]);
        let t1_out = i16::from_le_bytes([raw[14], raw[15]]);

        let t_msb = raw[5];
        let t0_msb = t_msb & 0b0000_0011;
        let t1_msb = (t_msb & 0b0000_1100) >> 2;

        let t0_degc: Temperature<Celsius> =
            (i16::from_le_bytes([raw[2], t0_msb]) as f32 / 8.0).into();
        let t1_degc: Temperature<Celsius> =
            (i16::from_le_bytes([raw[3], t1_msb]) as f32 / 8.0).into();

        let slope = (t1_degc - t0_degc) / (t1_out as f32 - t0_out as f32);

        let temperature = TemperatureCalibration {
            t0_out,
            t1_out,
            t0_degc,
            t1_degc,
            slope,
        };

        let h0_rh = raw[0] as f32 / 2.0;
        let h1_rh = raw[1] as f32 / 2.0;

        let h0_out = i16::from_le_bytes([raw[6], raw[7]]);
        let h1_out = i16::from_le_bytes([raw[10], raw[11]]);

        let slope = (h1_rh - h0_rh) / (h1_out as f32 - h0_out as f32);

        let humidity = HumidityCalibration {
            h0_out,
            h1_out,
            h0_rh,
            h1_rh,
            slope,
        };

        Calibration {
            temperature,
            humidity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> [u8; 16] {
        let mut raw = [0u8; 16];
        // 30 %rH and 70 %rH
        raw[0] = 60;
        raw[1] = 140;
        // 20 °C and 36 °C, the latter needs the msb bits
        raw[2] = 160;
        raw[3] = 0x20;
        raw[5] = 0b0000_0100;
        raw[6..8].copy_from_slice(&0i16.to_le_bytes());
        raw[10..12].copy_from_slice(&4000i16.to_le_bytes());
        raw[12..14].copy_from_slice(&0i16.to_le_bytes());
        raw[14..16].copy_from_slice(&1600i16.to_le_bytes());
        raw
    }

    #[test]
    fn test_calibration_block() {
        let calibration: Calibration = block().into();
        assert_eq!(20.0, calibration.temperature.t0_degc.raw_value());
        assert_eq!(36.0, calibration.temperature.t1_degc.raw_value());
        assert_eq!(30.0, calibration.humidity.h0_rh);
        assert_eq!(70.0, calibration.humidity.h1_rh);
    }

    #[test]
    fn test_interpolation() {
        let calibration: Calibration = block().into();
        let t = calibration.calibrated_temperature(800).raw_value();
        assert!((t - 28.0).abs() < 1e-3, "{}", t);

        let h = calibration.calibrated_humidity(2000);
        assert!((h - 50.0).abs() < 1e-3, "{}", h);
    }

    #[test]
    fn test_humidity_is_clamped() {
        let calibration: Calibration = block().into();
        assert_eq!(100.0, calibration.calibrated_humidity(i16::MAX));
        assert_eq!(0.0, calibration.calibrated_humidity(i16::MIN));
    }
}
