pub mod config;
pub mod error;
pub mod interval;
pub mod model;
pub mod normalize;
pub mod time;

pub use error::{Result, TracelensError};
