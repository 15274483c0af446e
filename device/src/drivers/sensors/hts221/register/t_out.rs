use embedded_hal::i2c::I2c;

// auto-increment variant of 2 bytes
const T_OUT: u8 = 0xAA;

pub struct Tout;

impl Tout {
    pub fn read<I: I2c>(address: u8, i2c: &mut I) -> Result<i16, I::Error> {
        let mut buf = [0; 2];
        i2c.write_read(address, &[T_OUT], &mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }
}
