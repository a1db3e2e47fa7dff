//! CLI command implementations

pub mod context;
pub mod hook;
pub mod output;
pub mod pipeline;
pub mod put;
pub mod samples;
