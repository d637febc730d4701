pub mod config;
pub mod domain;
pub mod error;

pub use config::Config;
pub use domain::*;
pub use error::*;
