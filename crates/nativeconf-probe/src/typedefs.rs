//! Typedef Canonicalization
//!
//! Preprocesses a set of system headers and maps every single-line typedef
//! to a [`TypeCategory`]. Each resolved alias is added to the lookup map,
//! so a typedef of a typedef resolves in the same left-to-right pass.

use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use nativeconf_core::{ConfigEntry, Platform, Result, TypeCategory};
use regex::Regex;
use tracing::debug;

use crate::{Probe, ProbeMode};

/// Standard C type names and the category each maps to
const STANDARD_TYPES: &[(&str, TypeCategory)] = &[
    ("char", TypeCategory::Char),
    ("signed char", TypeCategory::Char),
    ("__signed char", TypeCategory::Char),
    ("unsigned char", TypeCategory::Uchar),
    ("short", TypeCategory::Short),
    ("short int", TypeCategory::Short),
    ("signed short", TypeCategory::Short),
    ("signed short int", TypeCategory::Short),
    ("unsigned short", TypeCategory::Ushort),
    ("unsigned short int", TypeCategory::Ushort),
    ("short unsigned int", TypeCategory::Ushort),
    ("int", TypeCategory::Int),
    ("signed", TypeCategory::Int),
    ("signed int", TypeCategory::Int),
    ("unsigned", TypeCategory::Uint),
    ("unsigned int", TypeCategory::Uint),
    ("long", TypeCategory::Long),
    ("long int", TypeCategory::Long),
    ("signed long", TypeCategory::Long),
    ("signed long int", TypeCategory::Long),
    ("unsigned long", TypeCategory::Ulong),
    ("unsigned long int", TypeCategory::Ulong),
    ("long unsigned int", TypeCategory::Ulong),
    ("long long", TypeCategory::LongLong),
    ("long long int", TypeCategory::LongLong),
    ("signed long long", TypeCategory::LongLong),
    ("signed long long int", TypeCategory::LongLong),
    ("unsigned long long", TypeCategory::UlongLong),
    ("unsigned long long int", TypeCategory::UlongLong),
    ("long long unsigned int", TypeCategory::UlongLong),
    ("char *", TypeCategory::String),
    ("void *", TypeCategory::Pointer),
];

/// Running alias -> category map, seeded with [`STANDARD_TYPES`]
#[derive(Debug, Clone)]
pub struct TypeMap {
    types: HashMap<String, TypeCategory>,
}

impl TypeMap {
    pub fn standard() -> Self {
        let types = STANDARD_TYPES
            .iter()
            .map(|(name, category)| (name.to_string(), *category))
            .collect();
        Self { types }
    }

    pub fn get(&self, phrase: &str) -> Option<TypeCategory> {
        self.types.get(phrase).copied()
    }

    pub fn insert(&mut self, alias: impl Into<String>, category: TypeCategory) {
        self.types.insert(alias.into(), category);
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::standard()
    }
}

/// One typedef line split into its alias and underlying-type phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedefDecl {
    pub alias: String,
    /// Underlying type, with ` *` appended for pointer aliases
    pub base: String,
    /// The alias was written with a leading `*`
    pub pointer_alias: bool,
}

static TYPEDEF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*typedef\s*(.+)\s*;\s*$").unwrap());

static TAGGED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(union|struct|enum)\b").unwrap());

static MACHINE_MODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__[QHSD]I__|__word__").unwrap());

/// Underlying type implied by a GCC `__mode__` attribute on `line`
fn machine_mode_type(line: &str) -> &'static str {
    if line.contains("__QI__") {
        "char"
    } else if line.contains("__HI__") {
        "short"
    } else if line.contains("__SI__") {
        "int"
    } else if line.contains("__DI__") {
        "long long"
    } else if line.contains("__word__") {
        "long"
    } else {
        "int"
    }
}

/// Split a single preprocessed typedef line.
///
/// Returns `None` for lines the single-line grammar cannot describe.
pub fn parse_typedef(line: &str) -> Option<TypedefDecl> {
    let caps = TYPEDEF_RE.captures(line)?;
    let parts: Vec<&str> = caps[1].split_whitespace().collect();
    let (&last, leading) = parts.split_last()?;

    let mut alias = last;
    let mut base = leading.join(" ");

    if line.contains("__attribute__") && MACHINE_MODE_RE.is_match(line) {
        // typedef int int8_t __attribute__ ((__mode__ (__QI__)));
        let attr = parts.iter().position(|p| p.contains("__attribute__"))?;
        alias = *parts.get(attr.checked_sub(1)?)?;
        base = machine_mode_type(line).to_string();
        if line.contains("unsigned") {
            base = format!("unsigned {}", base);
        }
    }

    let pointer_alias = alias.starts_with('*');
    if pointer_alias {
        alias = alias.trim_start_matches('*');
        base = format!("{} *", base);
    }

    if alias.is_empty() || !alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    Some(TypedefDecl {
        alias: alias.to_string(),
        base,
        pointer_alias,
    })
}

/// Resolves platform typedefs to canonical categories
#[derive(Debug, Clone)]
pub struct TypedefResolver {
    headers: Vec<String>,
    type_map: TypeMap,
    typedefs: IndexMap<String, TypeCategory>,
    overrides: Vec<(String, TypeCategory)>,
    ignored: Vec<String>,
}

impl TypedefResolver {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            type_map: TypeMap::standard(),
            typedefs: IndexMap::new(),
            overrides: Vec::new(),
            ignored: Vec::new(),
        }
    }

    /// Resolver with the overrides known for `platform`.
    ///
    /// Darwin declares `pthread_t` across two lines
    /// (`typedef struct _opaque_pthread_t` / `*__darwin_pthread_t;`),
    /// which the line grammar cannot follow.
    pub fn for_platform(headers: Vec<String>, platform: Platform) -> Self {
        let mut resolver = Self::new(headers);
        if platform.is_darwin() {
            resolver.add_override("pthread_t", TypeCategory::Pointer);
        }
        resolver
    }

    /// Force `alias` to `category` after analysis
    pub fn add_override(&mut self, alias: impl Into<String>, category: TypeCategory) {
        self.overrides.push((alias.into(), category));
    }

    pub fn resolved(&self, alias: &str) -> Option<TypeCategory> {
        self.typedefs.get(alias).copied()
    }

    /// Typedef lines that could not be resolved
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    fn resolve(&self, decl: &TypedefDecl) -> Option<TypeCategory> {
        if decl.pointer_alias {
            return Some(TypeCategory::Pointer);
        }
        if let Some(category) = self.type_map.get(&decl.base) {
            return Some(category);
        }
        if decl.base.ends_with('*') {
            return Some(TypeCategory::Pointer);
        }
        None
    }
}

impl Probe for TypedefResolver {
    fn name(&self) -> String {
        "typedefs".to_string()
    }

    fn mode(&self) -> ProbeMode {
        ProbeMode::Preprocess
    }

    fn source(&self) -> String {
        self.headers
            .iter()
            .map(|h| format!("#include <{}>\n", h))
            .collect()
    }

    fn analyse(&mut self, output: &str) -> Result<()> {
        for line in output.lines() {
            if !line.contains("typedef") || TAGGED_RE.is_match(line) {
                continue;
            }

            let resolved = parse_typedef(line)
                .and_then(|decl| self.resolve(&decl).map(|category| (decl.alias, category)));

            match resolved {
                Some((alias, category)) => {
                    self.type_map.insert(alias.clone(), category);
                    self.typedefs.insert(alias, category);
                }
                None => {
                    debug!("Ignoring {}", line.trim());
                    self.ignored.push(line.to_string());
                }
            }
        }

        for (alias, category) in &self.overrides {
            self.typedefs.insert(alias.clone(), *category);
        }
        Ok(())
    }

    fn entries(&self) -> Vec<ConfigEntry> {
        self.typedefs
            .iter()
            .filter(|(alias, _)| !alias.starts_with('_'))
            .map(|(alias, category)| ConfigEntry::new(format!("typedef.{}", alias), *category))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativeconf_core::EntryValue;
    use pretty_assertions::assert_eq;

    fn resolve_all(output: &str) -> TypedefResolver {
        let mut resolver = TypedefResolver::new(vec!["stdint.h".to_string()]);
        resolver.analyse(output).unwrap();
        resolver
    }

    #[test]
    fn test_source_is_includes_only() {
        let resolver = TypedefResolver::new(vec![
            "stdint.h".to_string(),
            "sys/types.h".to_string(),
        ]);
        assert_eq!(resolver.source(), "#include <stdint.h>\n#include <sys/types.h>\n");
        assert_eq!(resolver.mode(), ProbeMode::Preprocess);
    }

    #[test]
    fn test_parse_plain() {
        assert_eq!(
            parse_typedef("typedef unsigned long int __dev_t;"),
            Some(TypedefDecl {
                alias: "__dev_t".into(),
                base: "unsigned long int".into(),
                pointer_alias: false,
            })
        );
    }

    #[test]
    fn test_parse_machine_mode_attribute() {
        let decl = parse_typedef("typedef unsigned int u_int8_t __attribute__ ((__mode__ (__QI__)));")
            .unwrap();
        assert_eq!(decl.alias, "u_int8_t");
        assert_eq!(decl.base, "unsigned char");

        let decl = parse_typedef("typedef int register_t __attribute__ ((__mode__ (__word__)));")
            .unwrap();
        assert_eq!(decl.alias, "register_t");
        assert_eq!(decl.base, "long");
    }

    #[test]
    fn test_parse_pointer_alias() {
        let decl = parse_typedef("typedef char *caddr_t;").unwrap();
        assert_eq!(decl.alias, "caddr_t");
        assert_eq!(decl.base, "char *");
        assert!(decl.pointer_alias);
    }

    #[test]
    fn test_parse_rejects_multiline_start() {
        assert_eq!(parse_typedef("typedef unsigned long"), None);
        assert_eq!(parse_typedef("typedef ;"), None);
    }

    #[test]
    fn test_transitive_resolution() {
        let resolver = resolve_all(
            "typedef signed int __int32_t;\n\
             typedef __int32_t int32_t;\n\
             typedef int32_t my_int_t;\n",
        );
        assert_eq!(resolver.resolved("__int32_t"), Some(TypeCategory::Int));
        assert_eq!(resolver.resolved("int32_t"), Some(TypeCategory::Int));
        assert_eq!(resolver.resolved("my_int_t"), Some(TypeCategory::Int));
    }

    #[test]
    fn test_forward_reference_is_not_resolved() {
        let resolver = resolve_all("typedef later_t early_t;\ntypedef int later_t;\n");
        assert_eq!(resolver.resolved("early_t"), None);
        assert_eq!(resolver.resolved("later_t"), Some(TypeCategory::Int));
        assert_eq!(resolver.ignored().len(), 1);
    }

    #[test]
    fn test_pointer_alias_is_pointer() {
        let resolver = resolve_all(
            "typedef char *caddr_t;\n\
             typedef void *handle_t;\n\
             typedef struct opaque *opaque_ptr;\n\
             typedef unknown_t *unknown_ptr;\n",
        );
        assert_eq!(resolver.resolved("caddr_t"), Some(TypeCategory::Pointer));
        assert_eq!(resolver.resolved("handle_t"), Some(TypeCategory::Pointer));
        assert_eq!(resolver.resolved("unknown_ptr"), Some(TypeCategory::Pointer));
        // Lines naming struct/union/enum tags are skipped entirely
        assert_eq!(resolver.resolved("opaque_ptr"), None);
    }

    #[test]
    fn test_spaced_pointer_phrase() {
        let resolver = resolve_all("typedef char * label_t;\ntypedef foo_t * foo_ptr;\n");
        assert_eq!(resolver.resolved("label_t"), Some(TypeCategory::String));
        assert_eq!(resolver.resolved("foo_ptr"), Some(TypeCategory::Pointer));
    }

    #[test]
    fn test_unresolvable_lines_are_not_errors() {
        let resolver = resolve_all(
            "typedef __builtin_va_list __gnuc_va_list;\n\
             typedef void (*__sighandler_t) (int);\n\
             typedef float float_t;\n",
        );
        assert_eq!(resolver.ignored().len(), 3);
        assert!(resolver.entries().is_empty());
    }

    #[test]
    fn test_other_attributes_are_not_machine_modes() {
        assert_eq!(
            parse_typedef("typedef long long int64_al_t __attribute__ ((__aligned__ (8)));"),
            None
        );

        let resolver = resolve_all(
            "typedef long long int64_al_t __attribute__ ((__aligned__ (8)));\n\
             typedef int int32_t __attribute__ ((__mode__ (__SI__)));\n",
        );
        assert_eq!(resolver.ignored().len(), 1);
        assert!(resolver.ignored()[0].contains("__aligned__"));
        assert_eq!(
            resolver.entries(),
            vec![ConfigEntry::new("typedef.int32_t", EntryValue::Text("int".into()))]
        );
    }

    #[test]
    fn test_private_aliases_are_not_emitted() {
        let resolver = resolve_all(
            "# 1 \"/usr/include/bits/types.h\" 1 3 4\n\
             typedef unsigned int __uid_t;\n\
             typedef __uid_t uid_t;\n\
             extern int not_a_typedef;\n",
        );
        assert_eq!(
            resolver.entries(),
            vec![ConfigEntry::new("typedef.uid_t", EntryValue::Text("uint".into()))]
        );
    }

    #[test]
    fn test_darwin_override() {
        let mut resolver =
            TypedefResolver::for_platform(vec!["sys/types.h".to_string()], Platform::X86_64Darwin);
        resolver
            .analyse("typedef struct _opaque_pthread_t\n*__darwin_pthread_t;\n")
            .unwrap();
        assert_eq!(resolver.resolved("pthread_t"), Some(TypeCategory::Pointer));

        let linux =
            TypedefResolver::for_platform(vec!["sys/types.h".to_string()], Platform::X86_64Linux);
        assert!(linux.overrides.is_empty());
    }
}
