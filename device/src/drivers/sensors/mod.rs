pub mod fake;
pub mod hts221;
