// src/core/mod.rs

pub mod aggregator;
pub mod entity;
pub mod graph_display;
pub mod meta;
pub mod paths;
pub mod populator;
pub mod repository;
pub mod spath;
pub mod templates;
