#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod collocation;
pub mod config;
pub mod dataset;
mod error;
pub(crate) mod screening;
pub mod statistics;

pub use collocation::{estimate, estimate_with_flag, ErrorEstimate, Moments, TripleCollocation};
pub use config::{Config, Filtering};
pub use dataset::Dataset;
pub use error::Error;
pub use screening::{Screening, DIFFERENCE_THRESHOLD};

pub type Result<T> = ::std::result::Result<T, Error>;
