//! Probe Orchestration
//!
//! Runs every declared probe in a fixed order (structs, constants,
//! typedefs) against one toolchain and funnels the entries into one sink.
//! Everything is sequential; the first failure aborts the run.

use nativeconf_core::{ConfigSink, Platform, Result};
use serde::Serialize;
use tracing::info;

use crate::catalog::Catalog;
use crate::compiler::Toolchain;
use crate::constants::ConstantValueProber;
use crate::structs::StructLayoutProber;
use crate::typedefs::TypedefResolver;
use crate::{run_probe, Probe};

/// Kind of a completed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Struct,
    Constants,
    Typedefs,
}

/// Outcome of one probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSummary {
    pub name: String,
    pub kind: ProbeKind,
    pub entries: usize,
}

/// Outcome of a full run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub platform: String,
    pub sink: String,
    pub probes: Vec<ProbeSummary>,
}

impl RunSummary {
    pub fn total_entries(&self) -> usize {
        self.probes.iter().map(|p| p.entries).sum()
    }
}

/// Drives the catalog through a toolchain into a sink
pub struct Orchestrator<'a> {
    toolchain: &'a dyn Toolchain,
    platform: Platform,
}

impl<'a> Orchestrator<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, platform: Platform) -> Self {
        Self {
            toolchain,
            platform,
        }
    }

    /// Run every probe in `catalog`, then finish the sink.
    ///
    /// The sink is only finished when every probe succeeded.
    pub fn run(&self, catalog: &Catalog, sink: &mut dyn ConfigSink) -> Result<RunSummary> {
        let mut probes = Vec::new();

        for decl in &catalog.structs {
            let mut probe = StructLayoutProber::from_decl(decl);
            probes.push(self.execute(&mut probe, ProbeKind::Struct, sink)?);
        }

        for decl in &catalog.constant_groups {
            let mut probe = ConstantValueProber::from_decl(decl);
            probes.push(self.execute(&mut probe, ProbeKind::Constants, sink)?);
        }

        if !catalog.typedef_headers.is_empty() {
            let mut probe =
                TypedefResolver::for_platform(catalog.typedef_headers.clone(), self.platform);
            probes.push(self.execute(&mut probe, ProbeKind::Typedefs, sink)?);
        }

        sink.finish()?;

        let summary = RunSummary {
            platform: self.platform.name().to_string(),
            sink: sink.name().to_string(),
            probes,
        };
        info!(
            "Emitted {} entries from {} probes to the {} sink",
            summary.total_entries(),
            summary.probes.len(),
            summary.sink
        );
        Ok(summary)
    }

    fn execute(
        &self,
        probe: &mut dyn Probe,
        kind: ProbeKind,
        sink: &mut dyn ConfigSink,
    ) -> Result<ProbeSummary> {
        let entries = run_probe(probe, self.toolchain, sink)?;
        info!("{}: {} entries", probe.name(), entries);
        Ok(ProbeSummary {
            name: probe.name(),
            kind,
            entries,
        })
    }
}
