use serde::{Deserialize, Serialize};

pub const OFF: Rgb8 = Rgb8::new(0x00, 0x00, 0x00);
pub const WHITE: Rgb8 = Rgb8::new(0xFF, 0xFF, 0xFF);
pub const GREEN: Rgb8 = Rgb8::new(0x00, 0xFF, 0x00);
pub const RASPBERRY: Rgb8 = Rgb8::new(0xE3, 0x0B, 0x5D);

/// An 8 bit per channel RGB colour.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packs the colour into the 5-6-5 layout used by 16 bit framebuffers.
    pub const fn to_rgb565(self) -> u16 {
        let r = (self.r as u16 >> 3) & 0x1F;
        let g = (self.g as u16 >> 2) & 0x3F;
        let b = (self.b as u16 >> 3) & 0x1F;
        (r << 11) | (g << 5) | b
    }

    pub fn is_off(&self) -> bool {
        *self == OFF
    }
}

/// Clockwise rotation applied to a frame before it reaches the matrix.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rotation must be 0, 90, 180 or 270, got {0}")]
pub struct InvalidRotation(pub u16);

impl TryFrom<u16> for Rotation {
    type Error = InvalidRotation;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> u16 {
        match rotation {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/**
 * A NxN frame of colours that can be displayed on a LED matrix.
 *
 * Pixels are stored row by row, starting at the top left corner.
 */
#[derive(Clone, Copy, PartialEq)]
pub struct Frame<const SIZE: usize> {
    pixels: [[Rgb8; SIZE]; SIZE],
}

impl<const SIZE: usize> core::fmt::Debug for Frame<SIZE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for row in self.pixels.iter() {
            for pixel in row.iter() {
                if pixel.is_off() {
                    write!(f, ".")?;
                } else {
                    write!(f, "#")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<const SIZE: usize> Frame<SIZE> {
    pub const fn empty() -> Self {
        Self {
            pixels: [[OFF; SIZE]; SIZE],
        }
    }

    pub const fn new(pixels: [[Rgb8; SIZE]; SIZE]) -> Self {
        Self { pixels }
    }

    /// Builds a frame from a flat, row-major sequence of `SIZE * SIZE` colours.
    ///
    /// Missing trailing pixels are left off and surplus pixels are ignored.
    pub fn from_pixels<I: IntoIterator<Item = Rgb8>>(pixels: I) -> Self {
        let mut frame = Self::empty();
        for (i, pixel) in pixels.into_iter().take(SIZE * SIZE).enumerate() {
            frame.pixels[i / SIZE][i % SIZE] = pixel;
        }
        frame
    }

    pub fn clear(&mut self) {
        for row in self.pixels.iter_mut() {
            row.fill(OFF);
        }
    }

    pub fn set(&mut self, x: usize, y: usize, color: Rgb8) {
        self.pixels[y][x] = color;
    }

    pub fn get(&self, x: usize, y: usize) -> Rgb8 {
        self.pixels[y][x]
    }

    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        !self.pixels[y][x].is_off()
    }

    /// Row-major iterator over all pixels.
    pub fn pixels(&self) -> impl Iterator<Item = Rgb8> + '_ {
        self.pixels.iter().flat_map(|row| row.iter().copied())
    }

    pub fn rotated(&self, rotation: Rotation) -> Self {
        let mut out = Self::empty();
        let last = SIZE - 1;
        for y in 0..SIZE {
            for x in 0..SIZE {
                let (nx, ny) = match rotation {
                    Rotation::Deg0 => (x, y),
                    Rotation::Deg90 => (last - y, x),
                    Rotation::Deg180 => (last - x, last - y),
                    Rotation::Deg270 => (y, last - x),
                };
                out.pixels[ny][nx] = self.pixels[y][x];
            }
        }
        out
    }
}

impl<const SIZE: usize> Default for Frame<SIZE> {
    fn default() -> Self {
        Frame::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame() {
        let mut f: Frame<4> = Frame::empty();
        f.set(0, 0, WHITE);
        f.set(3, 1, GREEN);
        assert!(f.is_lit(0, 0));
        assert!(!f.is_lit(1, 0));
        assert_eq!(GREEN, f.get(3, 1));
        assert_eq!(2, f.pixels().filter(|p| !p.is_off()).count());

        f.clear();
        assert_eq!(0, f.pixels().filter(|p| !p.is_off()).count());
    }

    #[test]
    fn test_from_pixels() {
        let f: Frame<2> = Frame::from_pixels([WHITE, OFF, OFF, GREEN, WHITE]);
        assert_eq!(WHITE, f.get(0, 0));
        assert_eq!(OFF, f.get(1, 0));
        assert_eq!(GREEN, f.get(1, 1));
    }

    #[test]
    fn test_rotation() {
        let mut f: Frame<3> = Frame::empty();
        f.set(0, 0, WHITE);

        let r = f.rotated(Rotation::Deg90);
        assert!(r.is_lit(2, 0));

        let r = f.rotated(Rotation::Deg180);
        assert!(r.is_lit(2, 2));

        let r = f.rotated(Rotation::Deg270);
        assert!(r.is_lit(0, 2));

        assert_eq!(f, f.rotated(Rotation::Deg0));
        assert_eq!(
            f,
            f.rotated(Rotation::Deg90)
                .rotated(Rotation::Deg90)
                .rotated(Rotation::Deg180)
        );
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(Ok(Rotation::Deg270), Rotation::try_from(270));
        assert_eq!(Err(InvalidRotation(45)), Rotation::try_from(45));
        assert_eq!(
            "rotation must be 0, 90, 180 or 270, got 45",
            InvalidRotation(45).to_string()
        );
        assert_eq!(180u16, Rotation::Deg180.into());
    }

    #[test]
    fn test_rgb565() {
        assert_eq!(0xFFFF, WHITE.to_rgb565());
        assert_eq!(0x07E0, GREEN.to_rgb565());
        assert_eq!(0x0000, OFF.to_rgb565());
    }
}
