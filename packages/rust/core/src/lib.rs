//! Core pipeline orchestration for bundlebot.
//!
//! This crate ties together manifest reading, catalog resolution, document
//! download and merging into the end-to-end run: every pending manifest row
//! becomes one merged artifact.

pub mod pipeline;
pub mod processor;

#[cfg(test)]
mod fakes;

pub use pipeline::{PipelineRunner, ProgressReporter, RunSummary, SilentProgress};
pub use processor::{RowProcessor, RowSettings, merge_inputs};
