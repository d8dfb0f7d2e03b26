#![forbid(unsafe_code)]

pub mod aggregator;
pub mod error;
pub mod model;
pub mod normalizer;
pub mod score;
pub mod time;

pub use error::Error;
pub use time::Clock;
