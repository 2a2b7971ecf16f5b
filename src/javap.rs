use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::archive;
use crate::introspect::Introspect;

pub(crate) fn run_tool(bin: &Path, args: &[OsString]) -> Result<Output> {
    #[cfg(windows)]
    {
        let lower = bin.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".cmd") || lower.ends_with(".bat") {
            return Command::new("cmd")
                .arg("/C")
                .arg(bin)
                .args(args)
                .output()
                .with_context(|| format!("Failed to execute {}", bin.display()));
        }
    }

    Command::new(bin)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute {} (ensure a JDK is installed)", bin.display()))
}

/// The JDK class file disassembler as an [`Introspect`] capability.
#[derive(Debug, Clone)]
pub struct Javap {
    javap_bin: PathBuf,
}

impl Javap {
    pub fn new(javap_bin: PathBuf) -> Self {
        Self { javap_bin }
    }

    /// Runs javap over `class_names`.
    ///
    /// javap exits non-zero when any requested class is missing while still
    /// describing the others, so stdout is kept regardless of the exit code.
    pub fn describe(&self, classpath: &Path, class_names: &[String], verbose: bool) -> Result<String> {
        let mut args: Vec<OsString> = vec!["-classpath".into(), classpath.as_os_str().to_owned()];
        if verbose {
            args.push("-private".into());
            args.push("-v".into());
        }
        args.extend(class_names.iter().map(OsString::from));

        let output = run_tool(&self.javap_bin, &args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(
                "javap exited with {} for {}: {}",
                output.status,
                classpath.display(),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Introspect for Javap {
    fn list_archive_entries(&self, archive_path: &Path) -> Vec<String> {
        archive::list_entries(archive_path).unwrap_or_else(|err| {
            tracing::warn!("Skipping unreadable archive {}: {err:#}", archive_path.display());
            Vec::new()
        })
    }

    fn introspect_classes(&self, classpath: &Path, class_names: &[String], verbose: bool) -> String {
        if class_names.is_empty() {
            return String::new();
        }
        self.describe(classpath, class_names, verbose)
            .unwrap_or_else(|err| {
                tracing::warn!("Class introspection failed for {}: {err:#}", classpath.display());
                String::new()
            })
    }
}
