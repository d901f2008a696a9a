//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single discovered platform fact.
///
/// Every probe produces these and every sink consumes them; the key is
/// relative to the configured namespace prefix (e.g. `addrinfo.sizeof`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Dotted key without the namespace prefix
    pub key: String,
    /// Value, already classified into its literal form
    pub value: EntryValue,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<EntryValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Fully-qualified key under `prefix`
    pub fn qualified_key(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.key.clone()
        } else {
            format!("{}.{}", prefix, self.key)
        }
    }

    pub fn kind(&self) -> EmitKind {
        self.value.kind()
    }
}

/// Value of a [`ConfigEntry`], classified once when the probe output is
/// analysed.
///
/// Integer classification uses the signed 32/64-bit ranges only; the C
/// type the value came from is not consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryValue {
    /// Fits in a signed 32-bit integer
    Integer(i32),
    /// Fits in a signed 64-bit integer but not in 32 bits
    WideInteger(i64),
    /// Integer outside the signed 64-bit range, kept as its exact decimal text
    Bignum(String),
    Boolean(bool),
    Text(String),
}

/// Emission kind tag of an [`EntryValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitKind {
    Integer32,
    Integer64,
    Bignum,
    Boolean,
    String,
}

impl EntryValue {
    /// Classify a textual value printed by a probe.
    ///
    /// Text matching `-?[0-9]+` becomes an integer of the narrowest form
    /// that holds it, `true` becomes a boolean, anything else stays text.
    pub fn from_output(text: &str) -> Self {
        if is_integer_text(text) {
            if let Ok(v) = text.parse::<i32>() {
                return EntryValue::Integer(v);
            }
            if let Ok(v) = text.parse::<i64>() {
                return EntryValue::WideInteger(v);
            }
            return EntryValue::Bignum(text.to_string());
        }

        if text == "true" {
            return EntryValue::Boolean(true);
        }

        EntryValue::Text(text.to_string())
    }

    pub fn kind(&self) -> EmitKind {
        match self {
            EntryValue::Integer(_) => EmitKind::Integer32,
            EntryValue::WideInteger(_) => EmitKind::Integer64,
            EntryValue::Bignum(_) => EmitKind::Bignum,
            EntryValue::Boolean(_) => EmitKind::Boolean,
            EntryValue::Text(_) => EmitKind::String,
        }
    }
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl From<i64> for EntryValue {
    fn from(v: i64) -> Self {
        match i32::try_from(v) {
            Ok(narrow) => EntryValue::Integer(narrow),
            Err(_) => EntryValue::WideInteger(v),
        }
    }
}

impl From<u64> for EntryValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(signed) => EntryValue::from(signed),
            Err(_) => EntryValue::Bignum(v.to_string()),
        }
    }
}

impl From<TypeCategory> for EntryValue {
    fn from(category: TypeCategory) -> Self {
        EntryValue::Text(category.as_str().to_string())
    }
}

impl From<&str> for EntryValue {
    fn from(text: &str) -> Self {
        EntryValue::Text(text.to_string())
    }
}

impl From<String> for EntryValue {
    fn from(text: String) -> Self {
        EntryValue::Text(text)
    }
}

impl fmt::Display for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryValue::Integer(v) => write!(f, "{}", v),
            EntryValue::WideInteger(v) => write!(f, "{}", v),
            EntryValue::Bignum(digits) => f.write_str(digits),
            EntryValue::Boolean(b) => write!(f, "{}", b),
            EntryValue::Text(text) => f.write_str(text),
        }
    }
}

/// Canonical primitive category a C typedef resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Char,
    Uchar,
    Short,
    Ushort,
    Int,
    Uint,
    Long,
    Ulong,
    LongLong,
    UlongLong,
    String,
    Pointer,
}

impl TypeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::Char => "char",
            TypeCategory::Uchar => "uchar",
            TypeCategory::Short => "short",
            TypeCategory::Ushort => "ushort",
            TypeCategory::Int => "int",
            TypeCategory::Uint => "uint",
            TypeCategory::Long => "long",
            TypeCategory::Ulong => "ulong",
            TypeCategory::LongLong => "long_long",
            TypeCategory::UlongLong => "ulong_long",
            TypeCategory::String => "string",
            TypeCategory::Pointer => "pointer",
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
