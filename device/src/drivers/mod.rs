pub mod led;
pub mod sensors;
