//! Output sink interface

use crate::error::Result;
use crate::types::ConfigEntry;

/// Destination for discovered configuration entries.
///
/// A sink is constructed once per run and handed to every probe.
/// `finish` must be called after the last probe; entries registered after
/// that are an error.
pub trait ConfigSink {
    /// Record one entry
    fn register(&mut self, entry: ConfigEntry) -> Result<()>;

    /// Write out whatever the sink has buffered and release its file
    fn finish(&mut self) -> Result<()>;

    /// Get sink name
    fn name(&self) -> &str;
}

/// Collects entries in memory; used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub entries: Vec<ConfigEntry>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a registered value by key
    pub fn get(&self, key: &str) -> Option<&crate::types::EntryValue> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }
}

impl ConfigSink for MemorySink {
    fn register(&mut self, entry: ConfigEntry) -> Result<()> {
        if self.finished {
            return Err(crate::Error::Config(format!(
                "entry {} registered after the sink was finished",
                entry.key
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
