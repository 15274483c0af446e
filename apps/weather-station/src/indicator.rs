use weather_device::domain::led::status::{Status, MATRIX_SIZE};
use weather_device::traits::led::LedMatrix;

/// Shows the outcome of the last publish on an 8x8 matrix.
pub struct StatusIndicator<M: LedMatrix<MATRIX_SIZE>> {
    matrix: M,
    current: Option<Status>,
}

impl<M: LedMatrix<MATRIX_SIZE>> StatusIndicator<M> {
    pub fn new(matrix: M) -> Self {
        Self {
            matrix,
            current: None,
        }
    }

    pub fn show(&mut self, status: Status) -> Result<(), M::Error> {
        self.current = None;
        self.matrix.render(&status.frame())?;
        self.current = Some(status);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), M::Error> {
        self.current = None;
        self.matrix.clear()
    }

    /// Status currently displayed, if the last render succeeded.
    pub fn current(&self) -> Option<Status> {
        self.current
    }
}
