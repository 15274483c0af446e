use embedded_hal::i2c::I2c;

const CTRL_REG2: u8 = 0x21;

const BOOT: u8 = 0b1000_0000;
const HEATER: u8 = 0b0000_0010;
const ONE_SHOT: u8 = 0b0000_0001;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Ctrl2 {
    boot: bool,
    heater: bool,
    one_shot: bool,
}

impl Ctrl2 {
    pub fn read<I: I2c>(address: u8, i2c: &mut I) -> Result<Ctrl2, I::Error> {
        let mut buf = [0; 1];
        i2c.write_read(address, &[CTRL_REG2], &mut buf)?;
        Ok(buf[0].into())
    }

    pub fn write<I: I2c>(address: u8, i2c: &mut I, reg: Ctrl2) -> Result<(), I::Error> {
        i2c.write(address, &[CTRL_REG2, reg.into()])
    }

    pub fn modify<I: I2c, F: FnOnce(&mut Ctrl2)>(
        address: u8,
        i2c: &mut I,
        modify: F,
    ) -> Result<(), I::Error> {
        let mut reg = Self::read(address, i2c)?;
        modify(&mut reg);
        Self::write(address, i2c, reg)
    }

    /// Reloads the factory calibration into the trimming registers.
    pub fn boot(&mut self) -> &mut Self {
        self.boot = true;
        self
    }

    pub fn heater(&mut self, enabled: bool) -> &mut Self {
        self.heater = enabled;
        self
    }
}

impl From<u8> for Ctrl2 {
    fn from(value: u8) -> Self {
        Ctrl2 {
            boot: (value & BOOT) != 0,
            heater: (value & HEATER) != 0,
            one_shot: (value & ONE_SHOT) != 0,
        }
    }
}

impl From<Ctrl2> for u8 {
    fn from(reg: Ctrl2) -> u8 {
        let mut value = 0;
        if reg.boot {
            value |= BOOT;
        }
        if reg.heater {
            value |= HEATER;
        }
        if reg.one_shot {
            value |= ONE_SHOT;
        }
        value
    }
}
