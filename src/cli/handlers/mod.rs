// src/cli/handlers/mod.rs

// One module per command. Each handler parses its own arguments.

pub mod commons;
pub mod fmt;
pub mod get;
pub mod populate;
pub mod resources;
pub mod tree;
pub mod validate;
