//! Utilities shared by the Yapper packages.

pub mod logger;
pub mod time;
