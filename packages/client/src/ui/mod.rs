//! Console surface: command parsing, formatting and the interactive loop.

pub mod command;
pub mod formatter;
pub mod prompt;
pub mod runner;

pub use runner::run_client;
