use embedded_hal::i2c::I2c;

const WHO_AM_I: u8 = 0x0F;

pub const HTS221_ID: u8 = 0xBC;

pub struct WhoAmI;

impl WhoAmI {
    pub fn read<I: I2c>(address: u8, i2c: &mut I) -> Result<u8, I::Error> {
        let mut buf = [0; 1];
        i2c.write_read(address, &[WHO_AM_I], &mut buf)?;
        Ok(buf[0])
    }
}
