//! nativeconf Probes
//!
//! ABI probes that synthesize small C programs, run them through the host
//! toolchain and turn the output into [`ConfigEntry`] values.
//!
//! ## Modules
//!
//! - `compiler` - Host compiler invocation with scoped temp files
//! - `structs` - Struct size and field offset/size probing
//! - `constants` - Preprocessor constant probing
//! - `typedefs` - Typedef canonicalization from preprocessed headers
//! - `catalog` - Declarative probe set
//! - `orchestrator` - Drives every declared probe into a sink

pub mod catalog;
pub mod compiler;
pub mod constants;
pub mod orchestrator;
pub mod structs;
pub mod typedefs;

pub use catalog::Catalog;
pub use compiler::{ProbeCompiler, Toolchain};
pub use orchestrator::{Orchestrator, RunSummary};

use nativeconf_core::{ConfigEntry, ConfigSink, Result};

/// How a probe's source is turned into output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// Compile, execute, capture stdout
    Execute,
    /// Capture the preprocessor's expansion; nothing is executed
    Preprocess,
}

/// One generate -> compile -> analyse -> save cycle.
pub trait Probe {
    /// Probe name used in diagnostics
    fn name(&self) -> String;

    fn mode(&self) -> ProbeMode {
        ProbeMode::Execute
    }

    /// Synthesize the C translation unit
    fn source(&self) -> String;

    /// Parse the toolchain output
    fn analyse(&mut self, output: &str) -> Result<()>;

    /// Entries discovered by the last `analyse`
    fn entries(&self) -> Vec<ConfigEntry>;

    /// Push the discovered entries into `sink`, returning how many were registered
    fn save(&self, sink: &mut dyn ConfigSink) -> Result<usize> {
        let entries = self.entries();
        let count = entries.len();
        for entry in entries {
            sink.register(entry)?;
        }
        Ok(count)
    }
}

/// Run a single probe to completion
pub fn run_probe(
    probe: &mut dyn Probe,
    toolchain: &dyn Toolchain,
    sink: &mut dyn ConfigSink,
) -> Result<usize> {
    let source = probe.source();
    let output = match probe.mode() {
        ProbeMode::Execute => toolchain.run(&source)?,
        ProbeMode::Preprocess => toolchain.preprocess(&source)?,
    };
    probe.analyse(&output)?;
    probe.save(sink)
}

/// Write the `#include` block shared by the executing probes
pub(crate) fn write_includes(out: &mut String, includes: &[String]) {
    out.push_str("#include <stdio.h>\n");
    for header in includes {
        out.push_str(&format!("#include <{}>\n", header));
    }
    out.push_str("#include <stddef.h>\n\n");
}
