//! Types and traits related to temperature.

use core::fmt::{Debug, Display, Formatter};
use core::marker::PhantomData;
use core::ops::{Add, Div, Sub};

/// Trait representing a temperature scale.
pub trait TemperatureScale: Send {
    const LETTER: char;
}

/// Discriminant for the _Celsius_ temperature scale.
#[derive(Clone)]
pub struct Celsius;

impl Debug for Celsius {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("°C")
    }
}

impl TemperatureScale for Celsius {
    const LETTER: char = 'C';
}

/// Discriminant for the _Fahrenheit_ temperature scale.
#[derive(Clone)]
pub struct Fahrenheit;

impl Debug for Fahrenheit {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("°F")
    }
}

impl TemperatureScale for Fahrenheit {
    const LETTER: char = 'F';
}

/// A temperature value with its associated scale.
pub struct Temperature<S: TemperatureScale> {
    value: f32,
    _marker: PhantomData<S>,
}

impl<S: TemperatureScale> Clone for Temperature<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: TemperatureScale> Copy for Temperature<S> {}

impl<S: TemperatureScale> PartialEq for Temperature<S> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<S: TemperatureScale> Debug for Temperature<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}°{}", &self.value, S::LETTER)
    }
}

impl<S: TemperatureScale> Temperature<S> {
    pub const fn new(value: f32) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn raw_value(&self) -> f32 {
        self.value
    }
}

impl Temperature<Celsius> {
    pub fn into_fahrenheit(self) -> Temperature<Fahrenheit> {
        Temperature::new((self.value * 9.0 / 5.0) + 32.0)
    }
}

impl From<f32> for Temperature<Celsius> {
    fn from(value: f32) -> Self {
        Temperature::new(value)
    }
}

impl<S: TemperatureScale> Add<f32> for Temperature<S> {
    type Output = Self;

    fn add(self, rhs: f32) -> Self::Output {
        Self::new(self.value + rhs)
    }
}

impl<S: TemperatureScale> Sub for Temperature<S> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.value - rhs.value)
    }
}

impl<S: TemperatureScale> Div<f32> for Temperature<S> {
    type Output = f32;

    fn div(self, rhs: f32) -> Self::Output {
        self.value / rhs
    }
}

impl<S: TemperatureScale> Display for Temperature<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&self.value, f)?;
        write!(f, "°{}", S::LETTER)
    }
}

/// Converts raw sensor temperatures into the reporting unit.
///
/// Readings are converted from Celsius to Fahrenheit and then shifted by a fixed offset, which
/// is how drift of a particular board (for example heat from the CPU below the sensor) is
/// corrected without touching code. The offset is expressed in the reporting unit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration {
    offset: f32,
}

impl Calibration {
    pub const fn new(offset: f32) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn to_reporting_unit(&self, raw: Temperature<Celsius>) -> Temperature<Fahrenheit> {
        raw.into_fahrenheit() + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporting_unit() {
        let calibration = Calibration::default();
        assert_eq!(
            32.0,
            calibration
                .to_reporting_unit(Temperature::new(0.0))
                .raw_value()
        );
        assert_eq!(
            212.0,
            calibration
                .to_reporting_unit(Temperature::new(100.0))
                .raw_value()
        );
        assert_eq!(
            -40.0,
            calibration
                .to_reporting_unit(Temperature::new(-40.0))
                .raw_value()
        );
    }

    #[test]
    fn test_calibration_offset() {
        let calibration = Calibration::new(-3.5);
        assert_eq!(
            64.5,
            calibration
                .to_reporting_unit(Temperature::new(20.0))
                .raw_value()
        );
    }

    #[test]
    fn test_display() {
        let t: Temperature<Celsius> = 25.0f32.into();
        assert_eq!("25°C", format!("{}", t));
        assert_eq!("77°F", format!("{}", t.into_fahrenheit()));
    }
}
