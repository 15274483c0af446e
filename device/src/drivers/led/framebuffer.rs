//! Sense HAT LED matrix driven through the Linux framebuffer.
//!
//! The Sense HAT kernel driver exposes its 8x8 matrix as a 16 bit (RGB565) framebuffer named
//! `RPi-Sense FB`. A frame is written as 64 little endian pixels, row by row.

use crate::domain::led::matrix::{Frame, Rotation};
use crate::domain::led::status::MATRIX_SIZE;
use crate::traits::led::LedMatrix;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const SENSE_HAT_FB_NAME: &str = "RPi-Sense FB";

const SYSFS_GRAPHICS: &str = "/sys/class/graphics";
const FRAME_BYTES: usize = MATRIX_SIZE * MATRIX_SIZE * 2;

#[derive(Debug, thiserror::Error)]
pub enum FramebufferError {
    #[error("no framebuffer named {0:?} found")]
    NotFound(&'static str),
    #[error("framebuffer i/o: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Framebuffer<W: Write + Seek = File> {
    device: W,
    rotation: Rotation,
}

impl Framebuffer<File> {
    /// Opens the Sense HAT framebuffer, looking it up by name in sysfs.
    pub fn detect() -> Result<Self, FramebufferError> {
        let path = find_device(Path::new(SYSFS_GRAPHICS), SENSE_HAT_FB_NAME)
            .ok_or(FramebufferError::NotFound(SENSE_HAT_FB_NAME))?;
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramebufferError> {
        log::debug!("Opening LED framebuffer {:?}", path.as_ref());
        let device = OpenOptions::new().write(true).open(path)?;
        Ok(Self::new(device))
    }
}

impl<W: Write + Seek> Framebuffer<W> {
    pub fn new(device: W) -> Self {
        Self {
            device,
            rotation: Rotation::Deg0,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn into_inner(self) -> W {
        self.device
    }

    fn write_frame(&mut self, frame: &Frame<MATRIX_SIZE>) -> Result<(), FramebufferError> {
        let mut buf = [0u8; FRAME_BYTES];
        for (chunk, pixel) in buf.chunks_exact_mut(2).zip(frame.pixels()) {
            chunk.copy_from_slice(&pixel.to_rgb565().to_le_bytes());
        }
        self.device.seek(SeekFrom::Start(0))?;
        self.device.write_all(&buf)?;
        self.device.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> LedMatrix<MATRIX_SIZE> for Framebuffer<W> {
    type Error = FramebufferError;

    fn render(&mut self, frame: &Frame<MATRIX_SIZE>) -> Result<(), Self::Error> {
        let rotated = frame.rotated(self.rotation);
        self.write_frame(&rotated)
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.write_frame(&Frame::empty())
    }
}

/// Finds the `/dev/fbN` node whose sysfs entry under `sysfs` carries `name`.
pub fn find_device(sysfs: &Path, name: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(sysfs).ok()?;
    for entry in entries.flatten() {
        let node = entry.file_name();
        let node = node.to_string_lossy();
        if !node.starts_with("fb") {
            continue;
        }
        if let Ok(found) = std::fs::read_to_string(entry.path().join("name")) {
            if found.trim() == name {
                return Some(Path::new("/dev").join(node.as_ref()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::led::matrix::{GREEN, WHITE};
    use crate::domain::led::status::{Status, SUCCESS};
    use std::io::Cursor;

    #[test]
    fn test_render_writes_rgb565() {
        let mut fb = Framebuffer::new(Cursor::new(Vec::new()));
        let mut frame = Frame::empty();
        frame.set(0, 0, WHITE);
        frame.set(1, 0, GREEN);
        fb.render(&frame).unwrap();

        let data = fb.into_inner().into_inner();
        assert_eq!(FRAME_BYTES, data.len());
        assert_eq!([0xFF, 0xFF], data[0..2]);
        assert_eq!([0xE0, 0x07], data[2..4]);
        assert!(data[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_render_overwrites_previous_frame() {
        let mut fb = Framebuffer::new(Cursor::new(Vec::new()));
        fb.render(&Status::Success.frame()).unwrap();
        fb.clear().unwrap();

        let data = fb.into_inner().into_inner();
        assert_eq!(FRAME_BYTES, data.len());
        assert!(data.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_render_applies_rotation() {
        let mut fb = Framebuffer::new(Cursor::new(Vec::new())).with_rotation(Rotation::Deg180);
        fb.render(&SUCCESS).unwrap();

        let mut expected = Framebuffer::new(Cursor::new(Vec::new()));
        expected.render(&SUCCESS.rotated(Rotation::Deg180)).unwrap();
        assert_eq!(
            expected.into_inner().into_inner(),
            fb.into_inner().into_inner()
        );
    }

    #[test]
    fn test_find_device() {
        let root = std::env::temp_dir().join(format!("weather-device-fb-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("fb0")).unwrap();
        std::fs::create_dir_all(root.join("fb1")).unwrap();
        std::fs::write(root.join("fb0/name"), "BCM2708 FB\n").unwrap();
        std::fs::write(root.join("fb1/name"), "RPi-Sense FB\n").unwrap();

        assert_eq!(
            Some(PathBuf::from("/dev/fb1")),
            find_device(&root, SENSE_HAT_FB_NAME)
        );
        assert_eq!(None, find_device(&root, "missing"));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
