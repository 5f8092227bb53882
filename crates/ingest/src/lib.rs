//! Trace export ingestion for tracelens.

pub mod decode;
pub mod reader;

pub use reader::{read_trace_file, CollectedTraces};
