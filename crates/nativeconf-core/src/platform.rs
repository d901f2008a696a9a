//! Build-host platform detection
//!
//! Only the host is ever probed; the platform decides which extra compiler
//! flags are needed and where the embedded configuration lives.

use crate::error::Error;

/// Supported build hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    X86_64Linux,
    Aarch64Linux,
    X86_64Darwin,
    Aarch64Darwin,
    SparcV9Solaris,
}

impl Platform {
    /// Detect the platform this binary was built for
    pub fn detect() -> Result<Self, Error> {
        let arch = std::env::consts::ARCH;
        let os = std::env::consts::OS;
        Self::from_parts(arch, os)
    }

    fn from_parts(arch: &str, os: &str) -> Result<Self, Error> {
        match (arch, os) {
            ("x86_64", "linux") => Ok(Platform::X86_64Linux),
            ("aarch64", "linux") => Ok(Platform::Aarch64Linux),
            ("x86_64", "macos") => Ok(Platform::X86_64Darwin),
            ("aarch64", "macos") => Ok(Platform::Aarch64Darwin),
            ("sparc64", "solaris") => Ok(Platform::SparcV9Solaris),
            _ => Err(Error::UnsupportedPlatform(format!("{}-{}", arch, os))),
        }
    }

    /// Platform identifier used in generated comments
    pub fn name(&self) -> &'static str {
        match self {
            Platform::X86_64Linux => "x86_64-linux",
            Platform::Aarch64Linux => "aarch64-linux",
            Platform::X86_64Darwin => "x86_64-darwin",
            Platform::Aarch64Darwin => "aarch64-darwin",
            Platform::SparcV9Solaris => "sparcv9-solaris",
        }
    }

    pub fn is_darwin(&self) -> bool {
        matches!(self, Platform::X86_64Darwin | Platform::Aarch64Darwin)
    }

    /// Compiler flags this platform needs on top of the strict defaults
    pub fn extra_cflags(&self) -> Vec<String> {
        match self {
            Platform::X86_64Linux | Platform::Aarch64Linux => vec!["-D_GNU_SOURCE".to_string()],
            Platform::X86_64Darwin | Platform::Aarch64Darwin => Vec::new(),
            // -m64 forces a 64-bit binary; the SUSv3 feature set needs gnu99
            Platform::SparcV9Solaris => vec![
                "-std=gnu99".to_string(),
                "-m64".to_string(),
                "-D_XOPEN_SOURCE=600".to_string(),
                "-D__EXTENSIONS__=1".to_string(),
            ],
        }
    }

    /// Compiler used when neither the config nor the environment names one
    pub fn default_compiler(&self) -> &'static str {
        match self {
            Platform::SparcV9Solaris => "gcc",
            _ => "cc",
        }
    }

    /// Runtime source file holding this platform's embedded configuration
    pub fn default_patch_target(&self) -> &'static str {
        match self {
            Platform::X86_64Linux | Platform::Aarch64Linux => {
                "src/main/java/org/truffleruby/platform/linux/LinuxRubiniusConfiguration.java"
            }
            Platform::X86_64Darwin | Platform::Aarch64Darwin => {
                "src/main/java/org/truffleruby/platform/darwin/DarwinRubiniusConfiguration.java"
            }
            Platform::SparcV9Solaris => {
                "src/main/java/org/truffleruby/platform/solaris/SolarisSparcV9RubiniusConfiguration.java"
            }
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64-linux" => Ok(Platform::X86_64Linux),
            "aarch64-linux" | "arm64-linux" => Ok(Platform::Aarch64Linux),
            "x86_64-darwin" | "x86_64-macos" => Ok(Platform::X86_64Darwin),
            "aarch64-darwin" | "arm64-darwin" | "aarch64-macos" => Ok(Platform::Aarch64Darwin),
            "sparcv9-solaris" => Ok(Platform::SparcV9Solaris),
            _ => Err(Error::UnsupportedPlatform(s.to_string())),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
