//! Scribe: staged, fault-tolerant long-form content generation
//!
//! A plan of steps is generated one section at a time against a pluggable text
//! generator. Each finished section is assembled into the artifact and persisted
//! atomically, so an interrupted run always leaves a readable document behind.

pub mod assembly;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod persistence;
pub mod pipeline;
pub mod plan;
