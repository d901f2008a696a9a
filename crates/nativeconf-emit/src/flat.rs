//! Flat key/value sink
//!
//! Writes one `<prefix>.<key> = <value>` line per entry. Lines go to a temp
//! file next to the destination, which only replaces the destination when
//! the run finishes, so a failed run leaves the previous artifact intact.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nativeconf_core::{ConfigEntry, ConfigSink, Error, Result};
use tempfile::NamedTempFile;
use tracing::debug;

pub struct FlatSink {
    path: PathBuf,
    prefix: String,
    writer: Option<BufWriter<NamedTempFile>>,
    written: usize,
}

impl FlatSink {
    /// Open the sink; the file at `path` is replaced by `finish`
    pub fn create(path: &Path, prefix: impl Into<String>) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = NamedTempFile::new_in(dir)?;
        debug!("Writing flat configuration to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            prefix: prefix.into(),
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render one line, without the trailing newline
    pub fn format_line(prefix: &str, entry: &ConfigEntry) -> String {
        format!("{} = {}", entry.qualified_key(prefix), entry.value)
    }
}

impl ConfigSink for FlatSink {
    fn register(&mut self, entry: ConfigEntry) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            Error::Config(format!("{} is already closed", self.path.display()))
        })?;
        writeln!(writer, "{}", Self::format_line(&self.prefix, &entry))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        debug!("Wrote {} entries to {}", self.written, self.path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "flat"
    }
}
