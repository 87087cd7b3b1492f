//! The optimization driver: one generic evaluate/fit/acquire loop, with the
//! algorithm variants expressed as tagged configuration.

mod config;
mod driver;

pub use config::*;
pub use driver::*;
