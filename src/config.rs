use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::introspect::DetailLevel;
use crate::scan::{ClasspathEntry, parse_classpath};

pub const JAVAP_ENV: &str = "CLASS_INDEX_JAVAP";
pub const JAVA_ENV: &str = "CLASS_INDEX_JAVA";

/// Tuning for a refresh run.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub basic_batch_size: usize,
    /// Verbose output is several times larger per class.
    pub verbose_batch_size: usize,
    pub ignore_inner_classes: bool,
    /// Use the verbose detail level for member loading.
    pub recover_parameter_names: bool,
    /// Only classes under these package prefixes are read from the system
    /// library. Empty means every class.
    pub system_package_prefixes: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            basic_batch_size: 50,
            verbose_batch_size: 20,
            ignore_inner_classes: true,
            recover_parameter_names: false,
            system_package_prefixes: vec!["java.".to_string()],
        }
    }
}

impl IndexConfig {
    /// Detail level used whenever members are requested.
    pub fn member_detail_level(&self) -> DetailLevel {
        if self.recover_parameter_names {
            DetailLevel::Verbose
        } else {
            DetailLevel::Basic
        }
    }

    pub fn accepts_system_class(&self, class_name: &str) -> bool {
        self.system_package_prefixes.is_empty()
            || self
                .system_package_prefixes
                .iter()
                .any(|prefix| class_name.starts_with(prefix.as_str()))
    }

    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            ignore_inner_classes: !cli.include_inner,
            recover_parameter_names: cli.parameter_names,
            ..Self::default()
        }
    }
}

pub fn java_home() -> Option<PathBuf> {
    env::var_os("JAVA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// `--javap`, then `$CLASS_INDEX_JAVAP`, then `$JAVA_HOME/bin/javap`, then
/// `javap` from `PATH`.
pub fn resolve_javap_path(cli: &Cli) -> PathBuf {
    if let Some(p) = cli.javap.clone() {
        return p;
    }
    resolve_jdk_tool(JAVAP_ENV, "javap")
}

pub fn resolve_java_path() -> PathBuf {
    resolve_jdk_tool(JAVA_ENV, "java")
}

fn resolve_jdk_tool(env_key: &str, name: &str) -> PathBuf {
    if let Some(p) = env::var_os(env_key).filter(|v| !v.is_empty()) {
        return PathBuf::from(p);
    }

    if let Some(home) = java_home() {
        let candidate = home.join("bin").join(executable_name(name));
        if candidate.is_file() {
            return candidate;
        }
    }

    PathBuf::from(name)
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

pub fn resolve_root(cli: &Cli) -> Result<PathBuf> {
    match cli.root.clone() {
        Some(root) => Ok(root),
        None => env::current_dir().context("Failed to resolve current directory"),
    }
}

/// `--classpath`, then `$CLASSPATH`. `None` when neither is set.
pub fn resolve_classpath(cli: &Cli, root: &Path) -> Option<Vec<ClasspathEntry>> {
    let raw = cli
        .classpath
        .clone()
        .or_else(|| env::var("CLASSPATH").ok())
        .filter(|raw| !raw.trim().is_empty())?;
    Some(parse_classpath(&raw, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn detail_level_follows_parameter_name_flag() {
        let mut config = IndexConfig::default();
        assert_eq!(config.member_detail_level(), DetailLevel::Basic);
        config.recover_parameter_names = true;
        assert_eq!(config.member_detail_level(), DetailLevel::Verbose);
    }

    #[test]
    fn system_prefix_filter() {
        let mut config = IndexConfig::default();
        assert!(config.accepts_system_class("java.util.List"));
        assert!(!config.accepts_system_class("sun.misc.Unsafe"));
        config.system_package_prefixes.clear();
        assert!(config.accepts_system_class("sun.misc.Unsafe"));
    }

    #[test]
    fn cli_flags_reach_config_and_classpath() {
        let cli = Cli::parse_from([
            "class-index",
            "--classpath",
            "bin",
            "--parameter-names",
            "--include-inner",
            "--javap",
            "/opt/jdk/bin/javap",
            "stats",
        ]);
        let config = IndexConfig::from_cli(&cli);
        assert!(config.recover_parameter_names);
        assert!(!config.ignore_inner_classes);
        assert_eq!(resolve_javap_path(&cli), PathBuf::from("/opt/jdk/bin/javap"));

        let entries = resolve_classpath(&cli, Path::new("/work")).unwrap();
        assert_eq!(entries, vec![ClasspathEntry::Directory(PathBuf::from("/work/bin"))]);
    }
}
