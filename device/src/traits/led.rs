use crate::domain::led::matrix::Frame;

/// A square RGB LED matrix.
pub trait LedMatrix<const SIZE: usize> {
    type Error;
    fn render(&mut self, frame: &Frame<SIZE>) -> Result<(), Self::Error>;
    fn clear(&mut self) -> Result<(), Self::Error>;
}
