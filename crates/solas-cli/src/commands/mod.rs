//! CLI commands

pub mod pull;
pub mod vendor;
