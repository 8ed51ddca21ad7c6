pub mod paths;
pub mod validate;

pub use validate::{slugify, validate_filename};
