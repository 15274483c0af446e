#![allow(async_fn_in_trait)]
//! Weather Device is a small set of building blocks for single-board environmental sensors:
//! temperature and humidity sources, an 8x8 RGB LED matrix and a cloud transport.
//!
//! # Layout
//!
//! * [`domain`] holds the value types: temperatures with their scale, sensor acquisitions and
//!   LED frames.
//! * [`traits`] holds the seams between an application and its hardware or network: sensors,
//!   LED matrices and the message transport.
//! * [`drivers`] implements the sensor and LED traits for real hardware (Sense HAT HTS221 and
//!   framebuffer) and for simulation.
//! * [`clients`] implements the transport trait for an MQTT broker reached over TLS.
//!
//! # Example
//!
//! ```
//! use weather_device::domain::temperature::{Calibration, Celsius, Temperature};
//!
//! let calibration = Calibration::new(0.0);
//! let reported = calibration.to_reporting_unit(Temperature::<Celsius>::new(20.0));
//! assert_eq!(68.0, reported.raw_value());
//! ```

pub mod clients;
pub mod domain;
pub mod drivers;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
