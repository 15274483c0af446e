pub mod matrix;
pub mod status;
