pub mod input_validator;

pub use input_validator::*;
