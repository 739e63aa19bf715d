pub mod commands;
pub mod fixtures;

pub use commands::*;
pub use fixtures::*;
