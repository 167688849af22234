//! Command-line interface module.

mod args;
pub mod build;
pub mod pack;
pub mod replay;
pub mod serve;

pub use args::{Cli, Commands};
