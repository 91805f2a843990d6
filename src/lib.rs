pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod layout;
pub mod limiter;
pub mod pipeline;
pub mod preview;
pub mod report;
pub mod util;

pub use error::{Result, RipError};
