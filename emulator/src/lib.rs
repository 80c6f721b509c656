pub mod config;
pub mod constants;
pub mod image;
pub mod runtime;

pub use self::image::load;
