//! Configuration types

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::platform::Platform;

/// Generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Namespace prefix prepended to every emitted key
    pub prefix: String,

    /// Compiler binary; `None` uses the platform default
    pub compiler: Option<String>,

    /// Environment variable that overrides `compiler` when set
    pub compiler_env: String,

    /// Flags appended after the platform's own flags
    pub extra_cflags: Vec<String>,

    /// Directory for generated probe sources and binaries (default: system temp dir)
    pub work_dir: Option<PathBuf>,

    /// Which sink receives the entries
    pub sink: SinkKind,

    /// Output path of the flat sink
    pub flat_output: PathBuf,

    /// Embedded-patch sink settings
    pub patch: PatchConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            prefix: "rbx.platform".to_string(),
            compiler: None,
            compiler_env: "CC".to_string(),
            extra_cflags: Vec::new(),
            work_dir: None,
            sink: SinkKind::Flat,
            flat_output: PathBuf::from("platform.conf"),
            patch: PatchConfig::default(),
        }
    }
}

/// Sink selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// `<prefix>.<key> = <value>` lines
    Flat,
    /// Rewrite the generated region of a runtime source file
    Embedded,
}

impl std::str::FromStr for SinkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(SinkKind::Flat),
            "embedded" | "patch" => Ok(SinkKind::Embedded),
            _ => Err(Error::Config(format!("unknown sink: {}", s))),
        }
    }
}

/// Embedded-patch sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// File to patch; `None` uses the platform default
    pub target: Option<PathBuf>,

    /// Exact statement opening the generated region (kept in the output)
    pub begin_marker: String,

    /// Exact sequence closing the generated region (kept in the output)
    pub end_marker: String,

    /// Indentation of generated statements
    pub indent: String,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            target: None,
            begin_marker:
                "public static void load(RubiniusConfiguration configuration, RubyContext context) {\n"
                    .to_string(),
            end_marker: "    }\n\n}".to_string(),
            indent: " ".repeat(8),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a YAML file; missing keys take defaults
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: GeneratorConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.compiler_env.is_empty() {
            return Err(Error::Config("compiler_env must not be empty".into()));
        }
        if self.patch.begin_marker.is_empty() || self.patch.end_marker.is_empty() {
            return Err(Error::Config("patch markers must not be empty".into()));
        }
        Ok(())
    }

    /// Compiler to invoke, honouring the environment override
    pub fn resolve_compiler(&self, platform: Platform) -> String {
        self.resolve_compiler_with(platform, |name| std::env::var(name).ok())
    }

    /// Same as [`resolve_compiler`](Self::resolve_compiler) with an explicit environment lookup
    pub fn resolve_compiler_with<F>(&self, platform: Platform, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(&self.compiler_env)
            .filter(|cc| !cc.trim().is_empty())
            .or_else(|| self.compiler.clone())
            .unwrap_or_else(|| platform.default_compiler().to_string())
    }

    /// Platform flags followed by the configured extra flags
    pub fn cflags(&self, platform: Platform) -> Vec<String> {
        let mut flags = platform.extra_cflags();
        flags.extend(self.extra_cflags.iter().cloned());
        flags
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn patch_target(&self, platform: Platform) -> PathBuf {
        self.patch
            .target
            .clone()
            .unwrap_or_else(|| PathBuf::from(platform.default_patch_target()))
    }
}
