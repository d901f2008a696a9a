//! Preprocessor Constant Probing
//!
//! Each declared constant is printed only `#ifdef` it exists, so a group can
//! declare the union of names across every supported platform. A constant
//! that prints nothing is simply not emitted.

use indexmap::IndexMap;
use nativeconf_core::{ConfigEntry, EntryValue, Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::ConstantGroupDecl;
use crate::{write_includes, Probe};

pub const DEFAULT_FORMAT: &str = "%ld";
pub const DEFAULT_CAST: &str = "(long)";

/// A probed macro constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    /// printf conversion used to print the value
    pub format: String,
    /// Cast applied to the macro before printing
    pub cast: String,
    /// `None` when the macro is not defined on this platform
    pub value: Option<EntryValue>,
}

/// Probe for one group of constants
#[derive(Debug, Clone)]
pub struct ConstantValueProber {
    group: String,
    includes: Vec<String>,
    constants: IndexMap<String, Constant>,
}

static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+) (.*)$").unwrap());

impl ConstantValueProber {
    pub fn new(group: impl Into<String>, includes: Vec<String>) -> Self {
        Self {
            group: group.into(),
            includes,
            constants: IndexMap::new(),
        }
    }

    pub fn from_decl(decl: &ConstantGroupDecl) -> Self {
        let mut prober = Self::new(&decl.name, decl.includes.clone());
        for batch in &decl.batches {
            prober.add_batch(&batch.names, &batch.format, &batch.cast);
        }
        prober
    }

    /// Declare `names` printed with `format` after applying `cast`.
    ///
    /// Re-declaring a name keeps its original position and takes the new
    /// format and cast.
    pub fn add_batch<S: AsRef<str>>(&mut self, names: &[S], format: &str, cast: &str) {
        for name in names {
            let name = name.as_ref();
            self.constants.insert(
                name.to_string(),
                Constant {
                    name: name.to_string(),
                    format: format.to_string(),
                    cast: cast.to_string(),
                    value: None,
                },
            );
        }
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

impl Probe for ConstantValueProber {
    fn name(&self) -> String {
        format!("constants {}", self.group)
    }

    fn source(&self) -> String {
        let mut src = String::new();
        write_includes(&mut src, &self.includes);

        src.push_str("int main(int argc, char **argv) {\n");
        for c in self.constants.values() {
            src.push_str(&format!("  #ifdef {}\n", c.name));
            src.push_str(&format!(
                "  printf(\"{} {}\\n\", {}{});\n",
                c.name, c.format, c.cast, c.name
            ));
            src.push_str("  #endif\n");
        }
        src.push_str("\n  return 0;\n}\n");
        src
    }

    fn analyse(&mut self, output: &str) -> Result<()> {
        let mut found = Vec::new();
        for line in output.lines() {
            let caps = LINE_RE
                .captures(line)
                .ok_or_else(|| Error::format_mismatch(self.name(), line, "expected NAME VALUE"))?;
            let name = &caps[1];
            if !self.constants.contains_key(name) {
                return Err(Error::format_mismatch(
                    self.name(),
                    line,
                    format!("{} was not declared in this group", name),
                ));
            }
            found.push((name.to_string(), EntryValue::from_output(&caps[2])));
        }

        for (name, value) in found {
            if let Some(constant) = self.constants.get_mut(&name) {
                constant.value = Some(value);
            }
        }
        Ok(())
    }

    fn entries(&self) -> Vec<ConfigEntry> {
        self.constants
            .values()
            .filter_map(|c| {
                c.value
                    .clone()
                    .map(|value| ConfigEntry::new(format!("{}.{}", self.group, c.name), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_guards_each_constant() {
        let mut probe = ConstantValueProber::new("process", vec!["sys/resource.h".to_string()]);
        probe.add_batch(&["RLIMIT_CPU"], DEFAULT_FORMAT, DEFAULT_CAST);
        probe.add_batch(&["RLIM_INFINITY"], "%llu", "(unsigned long long)");

        let expected = r#"#include <stdio.h>
#include <sys/resource.h>
#include <stddef.h>

int main(int argc, char **argv) {
  #ifdef RLIMIT_CPU
  printf("RLIMIT_CPU %ld\n", (long)RLIMIT_CPU);
  #endif
  #ifdef RLIM_INFINITY
  printf("RLIM_INFINITY %llu\n", (unsigned long long)RLIM_INFINITY);
  #endif

  return 0;
}
"#;
        assert_eq!(probe.source(), expected);
    }

    #[test]
    fn test_undefined_constants_are_omitted() {
        let mut probe = ConstantValueProber::new("errno", vec![]);
        probe.add_batch(&["EPERM", "EDEADLOCK_NOT_HERE", "ENOENT"], DEFAULT_FORMAT, DEFAULT_CAST);

        probe.analyse("EPERM 1\nENOENT 2\n").unwrap();

        let entries = probe.entries();
        assert_eq!(
            entries,
            vec![
                ConfigEntry::new("errno.EPERM", EntryValue::Integer(1)),
                ConfigEntry::new("errno.ENOENT", EntryValue::Integer(2)),
            ]
        );
        assert_eq!(probe.constant("EDEADLOCK_NOT_HERE").unwrap().value, None);
    }

    #[test]
    fn test_values_are_classified() {
        let mut probe = ConstantValueProber::new("process", vec![]);
        probe.add_batch(&["WNOHANG"], DEFAULT_FORMAT, DEFAULT_CAST);
        probe.add_batch(&["RLIM_INFINITY"], "%llu", "(unsigned long long)");
        probe.add_batch(&["NAME"], "%s", "");

        probe
            .analyse("WNOHANG 1\nRLIM_INFINITY 18446744073709551615\nNAME some text\n")
            .unwrap();

        assert_eq!(
            probe.constant("RLIM_INFINITY").unwrap().value,
            Some(EntryValue::Bignum("18446744073709551615".into()))
        );
        assert_eq!(
            probe.constant("NAME").unwrap().value,
            Some(EntryValue::Text("some text".into()))
        );
    }

    #[test]
    fn test_duplicate_declaration_keeps_first_position() {
        let mut probe = ConstantValueProber::new("signal", vec![]);
        assert!(probe.is_empty());
        probe.add_batch(&["SIGCHLD", "SIGCLD", "SIGCHLD"], DEFAULT_FORMAT, DEFAULT_CAST);
        assert_eq!(probe.len(), 2);

        probe.analyse("SIGCLD 17\nSIGCHLD 17\n").unwrap();
        let keys: Vec<String> = probe.entries().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["signal.SIGCHLD", "signal.SIGCLD"]);
    }

    #[test]
    fn test_undeclared_name_is_mismatch() {
        let mut probe = ConstantValueProber::new("io", vec![]);
        probe.add_batch(&["SEEK_SET"], DEFAULT_FORMAT, DEFAULT_CAST);

        let err = probe.analyse("SEEK_END 2\n").unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
    }

    #[test]
    fn test_malformed_line_is_mismatch() {
        let mut probe = ConstantValueProber::new("io", vec![]);
        probe.add_batch(&["SEEK_SET"], DEFAULT_FORMAT, DEFAULT_CAST);

        let err = probe.analyse("SEEK_SET\n").unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
        assert!(probe.entries().is_empty());
    }
}
