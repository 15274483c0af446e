pub mod led;
pub mod sensors;
pub mod transport;
