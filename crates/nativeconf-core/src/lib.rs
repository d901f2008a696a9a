//! nativeconf Core
//!
//! Core types and interfaces shared by the probes, the sinks and the CLI.

pub mod config;
pub mod error;
pub mod platform;
pub mod sink;
pub mod types;

pub use config::{GeneratorConfig, PatchConfig, SinkKind};
pub use error::{Error, Result};
pub use platform::Platform;
pub use sink::{ConfigSink, MemorySink};
pub use types::*;
