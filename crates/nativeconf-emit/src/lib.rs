//! nativeconf Emitters
//!
//! Sinks that turn [`ConfigEntry`](nativeconf_core::ConfigEntry) values into
//! the artifacts the runtime reads:
//!
//! - `flat` - `<prefix>.<key> = <value>` lines
//! - `patch` - typed statements spliced between two markers of a source file
//! - `literal` - rendering of entry values as source literals

pub mod flat;
pub mod literal;
pub mod patch;

pub use flat::FlatSink;
pub use literal::render_literal;
pub use patch::EmbeddedPatchSink;
