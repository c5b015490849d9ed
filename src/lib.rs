pub mod admission;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod queue;
pub mod resolver;
pub mod stages;
pub mod stamp;
pub mod submit;

pub use error::{Result, StagehandError};
