//! Host Compiler Integration
//!
//! Writes a probe's translation unit to a uniquely named temp file, runs the
//! host C compiler on it and either executes the result or returns the
//! preprocessor expansion. The generated source and binary are removed on
//! every exit path.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use nativeconf_core::{Error, GeneratorConfig, Platform, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Something that can turn C source into probe output.
pub trait Toolchain {
    /// Compile `source` with warnings as errors, run it, return its stdout
    fn run(&self, source: &str) -> Result<String>;

    /// Preprocess `source` and return the expanded text
    fn preprocess(&self, source: &str) -> Result<String>;
}

/// Host C compiler wrapper
#[derive(Debug, Clone)]
pub struct ProbeCompiler {
    /// Compiler executable
    compiler: String,
    /// Platform and user flags, appended after the strict defaults
    cflags: Vec<String>,
    /// Where sources and binaries are created
    work_dir: PathBuf,
}

/// Removes a compiler-produced binary when dropped
struct Artifact {
    path: PathBuf,
}

impl Artifact {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

impl ProbeCompiler {
    pub fn new(compiler: impl Into<String>, cflags: Vec<String>, work_dir: PathBuf) -> Self {
        Self {
            compiler: compiler.into(),
            cflags,
            work_dir,
        }
    }

    /// Build a compiler from the generator configuration for `platform`
    pub fn from_config(config: &GeneratorConfig, platform: Platform) -> Self {
        let compiler = config.resolve_compiler(platform);
        debug!("Using compiler {:?} for {}", compiler, platform);
        Self::new(compiler, config.cflags(platform), config.work_dir())
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    /// Arguments for compiling `source` into `target`
    fn compile_args(&self, source: &Path, target: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-xc".into(), "-Wall".into(), "-Werror".into()];
        args.extend(self.cflags.iter().map(OsString::from));
        args.push(source.as_os_str().to_owned());
        args.push("-o".into());
        args.push(target.as_os_str().to_owned());
        args
    }

    /// Arguments for preprocessing `source` to stdout
    fn preprocess_args(&self, source: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-E".into()];
        args.extend(self.cflags.iter().map(OsString::from));
        args.push(source.as_os_str().to_owned());
        args
    }

    /// Write `source` to a fresh `.c` file that is deleted when dropped
    fn write_source(&self, source: &str) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("nativeconf-")
            .suffix(".c")
            .tempfile_in(&self.work_dir)?;
        file.write_all(source.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

impl Toolchain for ProbeCompiler {
    fn run(&self, source: &str) -> Result<String> {
        let file = self.write_source(source)?;
        // The source name is unique, so the binary next to it is as well
        let artifact = Artifact {
            path: file.path().with_extension(""),
        };

        let mut compile = Command::new(&self.compiler);
        compile.args(self.compile_args(file.path(), artifact.path()));
        run_command(&mut compile)?;

        let mut execute = Command::new(artifact.path());
        run_command(&mut execute)
    }

    fn preprocess(&self, source: &str) -> Result<String> {
        let file = self.write_source(source)?;

        let mut preprocess = Command::new(&self.compiler);
        preprocess.args(self.preprocess_args(file.path()));
        run_command(&mut preprocess)
    }
}

/// Render a command line for logs and diagnostics
fn describe(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Run `cmd` to completion and return its stdout.
///
/// A command that cannot be started or exits unsuccessfully is an
/// [`Error::ExternalToolFailure`] carrying everything it printed.
fn run_command(cmd: &mut Command) -> Result<String> {
    let command = describe(cmd);
    info!("$ {}", command);

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| Error::ExternalToolFailure {
            command: command.clone(),
            output: format!("could not start process: {}", e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let mut combined = stdout;
        combined.push_str(&stderr);
        if combined.is_empty() {
            combined = format!("exited with {}", output.status);
        }
        return Err(Error::ExternalToolFailure {
            command,
            output: combined,
        });
    }

    if !stderr.is_empty() {
        debug!("{} wrote to stderr:\n{}", command, stderr);
    }

    Ok(stdout)
}
