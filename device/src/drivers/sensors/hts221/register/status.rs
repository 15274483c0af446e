use embedded_hal::i2c::I2c;

const STATUS: u8 = 0x27;

pub struct Status {
    temperature_available: bool,
    humidity_available: bool,
}

impl Status {
    pub fn read<I: I2c>(address: u8, i2c: &mut I) -> Result<Status, I::Error> {
        let mut buf = [0; 1];
        i2c.write_read(address, &[STATUS], &mut buf)?;
        Ok(buf[0].into())
    }

    pub fn temperature_available(&self) -> bool {
        self.temperature_available
    }

    pub fn humidity_available(&self) -> bool {
        self.humidity_available
    }

    pub fn any_available(&self) -> bool {
        self.temperature_available || self.humidity_available
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Status {
            temperature_available: (value & 0b01) != 0,
            humidity_available: (value & 0b10) != 0,
        }
    }
}
