use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::java_home;
use crate::javap::run_tool;

/// Finds the platform core-library archive.
pub trait SystemLibraryLocator: Send + Sync {
    fn locate(&self) -> Option<PathBuf>;
}

/// Looks for `rt.jar` under `JAVA_HOME`, then asks the runtime which archive
/// it opens first.
#[derive(Debug, Clone)]
pub struct JavaRuntimeLocator {
    java_bin: PathBuf,
    java_home: Option<PathBuf>,
}

impl JavaRuntimeLocator {
    pub fn new(java_bin: PathBuf, java_home: Option<PathBuf>) -> Self {
        Self {
            java_bin,
            java_home,
        }
    }

    pub fn from_env(java_bin: PathBuf) -> Self {
        Self::new(java_bin, java_home())
    }

    fn from_java_home(&self) -> Option<PathBuf> {
        let home = self.java_home.as_deref()?;
        [home.join("jre/lib/rt.jar"), home.join("lib/rt.jar")]
            .into_iter()
            .find(|p| p.is_file())
    }

    fn from_runtime(&self) -> Option<PathBuf> {
        let args: Vec<OsString> = vec!["-verbose".into(), "-version".into()];
        let output = match run_tool(&self.java_bin, &args) {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!("Could not query java runtime: {err:#}");
                return None;
            }
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.lines().find_map(opened_archive).filter(|p| p.is_file())
    }
}

impl SystemLibraryLocator for JavaRuntimeLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.from_java_home().or_else(|| self.from_runtime())
    }
}

/// A fixed answer, for callers that already know the archive.
#[derive(Debug, Clone, Default)]
pub struct FixedLocator(pub Option<PathBuf>);

impl SystemLibraryLocator for FixedLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

/// Parses `[Opened /usr/lib/jvm/.../rt.jar]` as printed by `java -verbose`.
fn opened_archive(line: &str) -> Option<PathBuf> {
    let path = line.trim().strip_prefix("[Opened ")?.strip_suffix(']')?;
    let path = Path::new(path.trim());
    crate::archive::is_archive(path).then(|| path.to_path_buf())
}
