//! Tracelines - execution timeline reconstruction from raw trace events
//!
//! This library turns a flat, arbitrarily ordered stream of Enter / Exit /
//! Error / Normal / Awaited events into a navigable timeline: spans, families
//! of sibling spans, direct and temporal containment, repeated-run detection
//! and a ranking of root families by how much execution they encompass.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod family;
pub mod grouper;
pub mod ingest;
pub mod linker;
pub mod pattern;
pub mod pipeline;
pub mod profiling;
pub mod render;
pub mod scorer;
pub mod span;
pub mod timeline;
pub mod worker;

pub use config::TimelineConfig;
pub use error::{Result, TimelineError};
pub use event::{Position, RawEvent, TraceType};
pub use pipeline::{build_timeline, compute_timeline, ComputedTimeline};
pub use timeline::Timeline;
