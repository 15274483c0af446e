use crate::domain::led::matrix::Frame;
use crate::traits::led::LedMatrix;
use core::convert::Infallible;

/// A matrix that prints frames to the log, for running without a display.
#[derive(Default)]
pub struct LogMatrix {
    last: Option<String>,
}

impl LogMatrix {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<const SIZE: usize> LedMatrix<SIZE> for LogMatrix {
    type Error = Infallible;

    fn render(&mut self, frame: &Frame<SIZE>) -> Result<(), Self::Error> {
        let rendered = format!("{:?}", frame);
        // unchanged frames only go to trace
        if self.last.as_deref() == Some(rendered.as_str()) {
            log::trace!("LED matrix unchanged");
        } else {
            log::info!("LED matrix:\n{}", rendered);
            self.last = Some(rendered);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        log::info!("LED matrix cleared");
        self.last = None;
        Ok(())
    }
}
