//! Struct Layout Probing
//!
//! Computes `sizeof(struct X)` and each declared field's offset and size.

use nativeconf_core::{ConfigEntry, Error, Result};
use regex::Regex;

use crate::catalog::StructDecl;
use crate::{write_includes, Probe};

/// A probed struct field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// Declared type tag, emitted verbatim when present
    pub type_tag: Option<String>,
    pub offset: Option<u64>,
    pub size: Option<u64>,
}

impl Field {
    pub fn new(name: impl Into<String>, type_tag: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_tag,
            offset: None,
            size: None,
        }
    }
}

/// Probe for one struct's layout
#[derive(Debug, Clone)]
pub struct StructLayoutProber {
    name: String,
    includes: Vec<String>,
    fields: Vec<Field>,
    size: Option<u64>,
}

impl StructLayoutProber {
    pub fn new(name: impl Into<String>, includes: Vec<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            includes,
            fields,
            size: None,
        }
    }

    pub fn from_decl(decl: &StructDecl) -> Self {
        let fields = decl
            .fields
            .iter()
            .map(|f| Field::new(&f.name, f.type_tag.clone()))
            .collect();
        Self::new(&decl.name, decl.includes.clone(), fields)
    }

    /// Total size, once analysed
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn mismatch(&self, line: &str, reason: impl Into<String>) -> Error {
        Error::format_mismatch(self.name(), line, reason)
    }

    fn parse_number(&self, digits: &str, line: &str) -> Result<u64> {
        digits
            .parse::<u64>()
            .map_err(|_| self.mismatch(line, "number out of range"))
    }
}

impl Probe for StructLayoutProber {
    fn name(&self) -> String {
        format!("struct {}", self.name)
    }

    fn source(&self) -> String {
        let name = &self.name;
        let mut src = String::new();
        write_includes(&mut src, &self.includes);

        src.push_str("int main(int argc, char **argv) {\n");
        src.push_str(&format!("  struct {} s;\n", name));
        src.push_str(&format!(
            "  printf(\"sizeof(struct {name}) %u\\n\", (unsigned int) sizeof(struct {name}));\n"
        ));
        for field in &self.fields {
            src.push_str(&format!(
                "  printf(\"{f} %u %u\\n\", (unsigned int) offsetof(struct {name}, {f}), (unsigned int) sizeof(s.{f}));\n",
                f = field.name
            ));
        }
        src.push_str("\n  return 0;\n}\n");
        src
    }

    fn analyse(&mut self, output: &str) -> Result<()> {
        let mut lines = output.lines();

        let size_re = Regex::new(&format!(
            r"^sizeof\(struct {}\) (\d+)$",
            regex::escape(&self.name)
        ))
        .map_err(|e| self.mismatch("", e.to_string()))?;

        let line = lines.next().unwrap_or("");
        let caps = size_re
            .captures(line)
            .ok_or_else(|| self.mismatch(line, "expected struct size"))?;
        let total = self.parse_number(&caps[1], line)?;

        let mut layout = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let field_re = Regex::new(&format!(r"^{} (\d+) (\d+)$", regex::escape(&field.name)))
                .map_err(|e| self.mismatch("", e.to_string()))?;

            let line = lines.next().unwrap_or("");
            let caps = field_re.captures(line).ok_or_else(|| {
                self.mismatch(line, format!("expected offset and size of {}", field.name))
            })?;
            let offset = self.parse_number(&caps[1], line)?;
            let size = self.parse_number(&caps[2], line)?;

            if offset.checked_add(size).map_or(true, |end| end > total) {
                return Err(self.mismatch(
                    line,
                    format!("field {} extends past the struct size {}", field.name, total),
                ));
            }
            layout.push((offset, size));
        }

        if let Some(extra) = lines.find(|l| !l.trim().is_empty()) {
            return Err(self.mismatch(extra, "unexpected trailing output"));
        }

        self.size = Some(total);
        for (field, (offset, size)) in self.fields.iter_mut().zip(layout) {
            field.offset = Some(offset);
            field.size = Some(size);
        }
        Ok(())
    }

    fn entries(&self) -> Vec<ConfigEntry> {
        let Some(size) = self.size else {
            return Vec::new();
        };

        let name = &self.name;
        let mut entries = vec![ConfigEntry::new(format!("{}.sizeof", name), size)];
        for field in &self.fields {
            let (Some(offset), Some(size)) = (field.offset, field.size) else {
                continue;
            };
            entries.push(ConfigEntry::new(
                format!("{}.{}.offset", name, field.name),
                offset,
            ));
            entries.push(ConfigEntry::new(format!("{}.{}.size", name, field.name), size));
            if let Some(tag) = &field.type_tag {
                entries.push(ConfigEntry::new(
                    format!("{}.{}.type", name, field.name),
                    tag.as_str(),
                ));
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativeconf_core::EntryValue;
    use pretty_assertions::assert_eq;

    fn linger() -> StructLayoutProber {
        StructLayoutProber::new(
            "linger",
            vec!["sys/socket.h".to_string()],
            vec![
                Field::new("l_onoff", Some("int".to_string())),
                Field::new("l_linger", None),
            ],
        )
    }

    #[test]
    fn test_source() {
        let expected = r#"#include <stdio.h>
#include <sys/socket.h>
#include <stddef.h>

int main(int argc, char **argv) {
  struct linger s;
  printf("sizeof(struct linger) %u\n", (unsigned int) sizeof(struct linger));
  printf("l_onoff %u %u\n", (unsigned int) offsetof(struct linger, l_onoff), (unsigned int) sizeof(s.l_onoff));
  printf("l_linger %u %u\n", (unsigned int) offsetof(struct linger, l_linger), (unsigned int) sizeof(s.l_linger));

  return 0;
}
"#;
        assert_eq!(linger().source(), expected);
    }

    #[test]
    fn test_analyse_and_entries() {
        let mut probe = linger();
        probe.analyse("sizeof(struct linger) 8\nl_onoff 0 4\nl_linger 4 4\n").unwrap();

        assert_eq!(probe.size(), Some(8));
        let entries = probe.entries();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "linger.sizeof",
                "linger.l_onoff.offset",
                "linger.l_onoff.size",
                "linger.l_onoff.type",
                "linger.l_linger.offset",
                "linger.l_linger.size",
            ]
        );
        assert_eq!(entries[0].value, EntryValue::Integer(8));
        assert_eq!(entries[3].value, EntryValue::Text("int".into()));
        assert_eq!(entries[4].value, EntryValue::Integer(4));
    }

    #[test]
    fn test_wrong_struct_name() {
        let mut probe = linger();
        let err = probe
            .analyse("sizeof(struct lingerie) 8\nl_onoff 0 4\nl_linger 4 4\n")
            .unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
        assert!(probe.entries().is_empty());
    }

    #[test]
    fn test_fields_out_of_order() {
        let mut probe = linger();
        let err = probe
            .analyse("sizeof(struct linger) 8\nl_linger 4 4\nl_onoff 0 4\n")
            .unwrap_err();
        match err {
            Error::FormatMismatch { line, .. } => assert_eq!(line, "l_linger 4 4"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_field_line() {
        let mut probe = linger();
        let err = probe.analyse("sizeof(struct linger) 8\nl_onoff 0 4\n").unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
        assert!(probe.entries().is_empty());
    }

    #[test]
    fn test_trailing_output() {
        let mut probe = linger();
        let err = probe
            .analyse("sizeof(struct linger) 8\nl_onoff 0 4\nl_linger 4 4\nextra 1 1\n")
            .unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
    }

    #[test]
    fn test_field_past_end() {
        let mut probe = linger();
        let err = probe
            .analyse("sizeof(struct linger) 8\nl_onoff 0 4\nl_linger 6 4\n")
            .unwrap_err();
        assert!(err.to_string().contains("extends past the struct size"));
    }

    #[test]
    fn test_flexible_array_member_at_end() {
        let mut probe = StructLayoutProber::new(
            "sockaddr_un",
            vec![],
            vec![Field::new("sun_family", None), Field::new("sun_path", None)],
        );
        probe
            .analyse("sizeof(struct sockaddr_un) 110\nsun_family 0 2\nsun_path 2 108\n")
            .unwrap();
        assert_eq!(probe.entries().len(), 5);
    }
}
