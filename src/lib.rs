//! Hierarchical deployment configuration for serverless projects.
//!
//! A project is a tree of directories (project, components, modules, functions) each holding a
//! JSON descriptor. This crate addresses nodes of that tree by sPath, loads and saves it, expands
//! templates and variables for a stage and region, and merges the per-node CloudFormation
//! fragments into one template.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
