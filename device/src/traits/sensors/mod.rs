pub mod humidity;
pub mod temperature;
