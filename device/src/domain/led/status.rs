//! Outcome feedback shown on an 8x8 matrix.

use super::matrix::{Frame, Rgb8, GREEN, OFF, RASPBERRY, WHITE};

pub const MATRIX_SIZE: usize = 8;

pub type StatusFrame = Frame<MATRIX_SIZE>;

/// Outcome of the last publish attempt, or `Idle` while a window is being sampled.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Status {
    Idle,
    Success,
    Failure,
}

impl Status {
    pub fn frame(&self) -> StatusFrame {
        match self {
            Status::Idle => IDLE,
            Status::Success => SUCCESS,
            Status::Failure => FAILURE,
        }
    }
}

impl From<Status> for StatusFrame {
    fn from(status: Status) -> Self {
        status.frame()
    }
}

const O: Rgb8 = OFF;
const G: Rgb8 = GREEN;
const R: Rgb8 = RASPBERRY;
const W: Rgb8 = WHITE;

/// Raspberry logo.
#[rustfmt::skip]
pub const IDLE: StatusFrame = Frame::new([
    [O, G, G, O, O, G, G, O],
    [O, O, G, G, G, G, O, O],
    [O, O, R, R, R, R, O, O],
    [O, R, R, R, R, R, R, O],
    [R, R, R, R, R, R, R, R],
    [R, R, R, R, R, R, R, R],
    [O, R, R, R, R, R, R, O],
    [O, O, R, R, R, R, O, O],
]);

/// White check mark on a green disc.
#[rustfmt::skip]
pub const SUCCESS: StatusFrame = Frame::new([
    [O, O, G, G, G, G, O, O],
    [O, G, G, G, G, G, G, O],
    [G, G, G, G, G, G, W, G],
    [G, G, G, G, G, W, G, G],
    [G, G, G, G, W, G, G, G],
    [G, W, G, W, G, G, G, G],
    [O, G, W, G, G, G, G, O],
    [O, O, G, G, G, G, O, O],
]);

/// White cross on a raspberry disc.
#[rustfmt::skip]
pub const FAILURE: StatusFrame = Frame::new([
    [O, O, R, R, R, R, O, O],
    [O, W, R, R, R, R, W, O],
    [R, R, W, R, R, W, R, R],
    [R, R, R, W, W, R, R, R],
    [R, R, R, W, W, R, R, R],
    [R, R, W, R, R, W, R, R],
    [O, W, R, R, R, R, W, O],
    [O, O, R, R, R, R, O, O],
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_selection() {
        assert_eq!(IDLE, Status::Idle.frame());
        assert_eq!(SUCCESS, Status::Success.frame());
        assert_eq!(FAILURE, Status::Failure.frame());
        assert_ne!(SUCCESS, FAILURE);
    }

    #[test]
    fn test_bitmaps_have_64_pixels() {
        for status in [Status::Idle, Status::Success, Status::Failure] {
            assert_eq!(64, status.frame().pixels().count());
        }
    }

    #[test]
    fn test_failure_cross_is_symmetric() {
        use super::super::matrix::Rotation;
        assert_eq!(FAILURE, FAILURE.rotated(Rotation::Deg180));
    }
}
