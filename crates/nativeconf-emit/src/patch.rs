//! Embedded-patch sink
//!
//! Rewrites the generated region of an existing runtime source file. The
//! file is read once when the sink opens; everything up to and including
//! the begin marker, and everything from the end marker onward, is written
//! back byte for byte around the generated statements. The rewrite goes
//! through a temp file in the same directory and keeps the file's mode.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use nativeconf_core::{ConfigEntry, ConfigSink, Error, PatchConfig, Platform, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::literal::{quote, render_literal};

pub struct EmbeddedPatchSink {
    path: PathBuf,
    prefix: String,
    indent: String,
    /// Content up to and including the begin marker
    head: String,
    /// Content from the end marker onward
    tail: String,
    comment: String,
    statements: Vec<String>,
    finished: bool,
}

impl EmbeddedPatchSink {
    /// Read `path` and locate the generated region
    pub fn open(
        path: &Path,
        config: &PatchConfig,
        prefix: impl Into<String>,
        platform: Platform,
    ) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let (head, tail) = split_region(&contents, &config.begin_marker, &config.end_marker)
            .map_err(|marker| Error::MissingMarker {
                path: path.to_path_buf(),
                marker: marker.to_string(),
            })?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let comment = format!(
            "// Generated by nativeconf on {} at {}",
            platform,
            stamp
        );

        Ok(Self {
            path: path.to_path_buf(),
            prefix: prefix.into(),
            indent: config.indent.clone(),
            head: head.to_string(),
            tail: tail.to_string(),
            comment,
            statements: Vec::new(),
            finished: false,
        })
    }

    /// Replace the generated header comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render one entry as a `configuration.config` statement
    pub fn format_statement(prefix: &str, entry: &ConfigEntry) -> String {
        format!(
            "configuration.config({}, {});",
            quote(&entry.qualified_key(prefix)),
            render_literal(&entry.value)
        )
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.head.len() + self.tail.len() + self.statements.len() * 64,
        );
        out.push_str(&self.head);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.indent);
        out.push_str(&self.comment);
        out.push('\n');
        for statement in &self.statements {
            out.push_str(&self.indent);
            out.push_str(statement);
            out.push('\n');
        }
        out.push_str(&self.tail);
        out
    }
}

/// Split `contents` into the part ending with `begin` and the part starting
/// at the first `end` after it. On failure returns the missing marker.
fn split_region<'a>(
    contents: &'a str,
    begin: &'a str,
    end: &'a str,
) -> std::result::Result<(&'a str, &'a str), &'a str> {
    let from = contents.find(begin).ok_or(begin)? + begin.len();
    let to = contents[from..].find(end).ok_or(end)? + from;
    Ok((&contents[..from], &contents[to..]))
}

impl ConfigSink for EmbeddedPatchSink {
    fn register(&mut self, entry: ConfigEntry) -> Result<()> {
        if self.finished {
            return Err(Error::Config(format!(
                "{} was already written",
                self.path.display()
            )));
        }
        self.statements
            .push(Self::format_statement(&self.prefix, &entry));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(&self.path)?.permissions();
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(self.render().as_bytes())?;
        file.as_file().set_permissions(permissions)?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        self.finished = true;
        debug!(
            "Patched {} statements into {}",
            self.statements.len(),
            self.path.display()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "embedded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativeconf_core::EntryValue;
    use pretty_assertions::assert_eq;

    const BEFORE: &str = "package org.example.platform;\n\n\
        public class LinuxConfiguration {\n\n    \
        public static void load(RubiniusConfiguration configuration, RubyContext context) {\n";
    const AFTER: &str = "    }\n\n}\n// trailing content stays\n";

    fn target(dir: &Path, interior: &str) -> PathBuf {
        let path = dir.join("LinuxConfiguration.java");
        fs::write(&path, format!("{}{}{}", BEFORE, interior, AFTER)).unwrap();
        path
    }

    fn open(path: &Path) -> EmbeddedPatchSink {
        EmbeddedPatchSink::open(
            path,
            &PatchConfig::default(),
            "rbx.platform",
            Platform::X86_64Linux,
        )
        .unwrap()
        .with_comment("// Generated by nativeconf on x86_64-linux")
    }

    #[test]
    fn test_patch_replaces_interior_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = target(
            dir.path(),
            "        configuration.config(\"rbx.platform.stale\", 1);\n",
        );

        let mut sink = open(&path);
        sink.register(ConfigEntry::new("linger.sizeof", EntryValue::Integer(8)))
            .unwrap();
        sink.register(ConfigEntry::new(
            "process.RLIM_INFINITY",
            EntryValue::Bignum("18446744073709551615".into()),
        ))
        .unwrap();
        sink.register(ConfigEntry::new("socket.BIG", EntryValue::WideInteger(4294967296)))
            .unwrap();
        sink.register(ConfigEntry::new("typedef.uid_t", "uint")).unwrap();
        sink.finish().unwrap();

        let expected = format!(
            "{}{}{}",
            BEFORE,
            "        // Generated by nativeconf on x86_64-linux\n\
             \x20       configuration.config(\"rbx.platform.linger.sizeof\", 8);\n\
             \x20       configuration.config(\"rbx.platform.process.RLIM_INFINITY\", newBignum(context, \"18446744073709551615\"));\n\
             \x20       configuration.config(\"rbx.platform.socket.BIG\", 4294967296L);\n\
             \x20       configuration.config(\"rbx.platform.typedef.uid_t\", string(context, \"uint\"));\n",
            AFTER
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_surroundings_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = target(dir.path(), "");

        let mut sink = open(&path);
        sink.register(ConfigEntry::new("io.SEEK_SET", EntryValue::Integer(0)))
            .unwrap();
        sink.finish().unwrap();

        let patched = fs::read_to_string(&path).unwrap();
        assert!(patched.starts_with(BEFORE));
        assert!(patched.ends_with(AFTER));
        assert!(patched.contains("configuration.config(\"rbx.platform.io.SEEK_SET\", 0);"));
    }

    #[test]
    fn test_nothing_written_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = target(dir.path(), "        // old\n");
        let original = fs::read_to_string(&path).unwrap();

        let mut sink = open(&path);
        sink.register(ConfigEntry::new("io.SEEK_SET", EntryValue::Integer(0)))
            .unwrap();
        drop(sink);

        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_finish_replaces_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = target(dir.path(), "");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        }

        let mut sink = open(&path);
        assert_eq!(sink.path(), path.as_path());
        sink.register(ConfigEntry::new("io.SEEK_END", EntryValue::Integer(2)))
            .unwrap();
        sink.finish().unwrap();

        // Only the patched file remains; no temp file is left next to it
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("configuration.config(\"rbx.platform.io.SEEK_END\", 2);"));
    }

    #[test]
    fn test_missing_markers() {
        let dir = tempfile::tempdir().unwrap();

        let no_begin = dir.path().join("NoBegin.java");
        fs::write(&no_begin, "class X {\n    }\n\n}").unwrap();
        let err = EmbeddedPatchSink::open(
            &no_begin,
            &PatchConfig::default(),
            "p",
            Platform::X86_64Linux,
        )
        .err()
        .unwrap();
        match err {
            Error::MissingMarker { marker, .. } => assert!(marker.starts_with("public static void load")),
            other => panic!("unexpected error: {other}"),
        }

        let no_end = dir.path().join("NoEnd.java");
        fs::write(&no_end, BEFORE).unwrap();
        let err = EmbeddedPatchSink::open(
            &no_end,
            &PatchConfig::default(),
            "p",
            Platform::X86_64Linux,
        )
        .err()
        .unwrap();
        match err {
            Error::MissingMarker { marker, .. } => assert_eq!(marker, "    }\n\n}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_split_region_searches_end_after_begin() {
        let contents = "END head BEGIN body END tail";
        let (head, tail) = split_region(contents, "BEGIN", "END").unwrap();
        assert_eq!(head, "END head BEGIN");
        assert_eq!(tail, "END tail");
    }

    #[test]
    fn test_default_comment_names_platform() {
        let dir = tempfile::tempdir().unwrap();
        let path = target(dir.path(), "");
        let sink = EmbeddedPatchSink::open(
            &path,
            &PatchConfig::default(),
            "rbx.platform",
            Platform::X86_64Darwin,
        )
        .unwrap();
        assert!(sink
            .render()
            .contains("        // Generated by nativeconf on x86_64-darwin at "));
    }
}
