//! Resumable batch force-directed layout for large weighted graphs.
//!
//! A run streams an edge list into a [`graph::Graph`], either assigns random
//! positions or reloads them from a checkpoint, and then advances the layout
//! in whole batches. Every batch leaves a preview image behind; every run,
//! finished or interrupted, ends with a full-size render and a checkpoint
//! that a later run can resume from.

pub mod checkpoint;
pub mod community;
pub mod config;
pub mod error;
pub mod graph;
pub mod layout;
pub mod pipeline;
pub mod render;
pub mod scheduler;
