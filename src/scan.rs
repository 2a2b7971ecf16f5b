use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::archive::is_archive;
use crate::introspect::Introspect;
use crate::model::Origin;

/// One element of a classpath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ClasspathEntry {
    /// A class output directory, walked recursively.
    Directory(PathBuf),
    /// A single jar or zip.
    Archive(PathBuf),
    /// `dir/*`: every archive directly inside `dir`.
    ArchiveDirectory(PathBuf),
}

impl ClasspathEntry {
    /// Classifies one raw classpath element. Relative paths resolve against
    /// `root` and a leading `~/` against the home directory.
    pub fn parse(raw: &str, root: &Path) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(dir) = raw.strip_suffix('*') {
            let dir = if dir.is_empty() { "." } else { dir };
            return Some(ClasspathEntry::ArchiveDirectory(resolve_path(dir, root)));
        }

        let path = resolve_path(raw, root);
        if is_archive(&path) {
            Some(ClasspathEntry::Archive(path))
        } else {
            Some(ClasspathEntry::Directory(path))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::Directory(p)
            | ClasspathEntry::Archive(p)
            | ClasspathEntry::ArchiveDirectory(p) => p,
        }
    }

    pub fn origin_kind(&self) -> Origin {
        match self {
            ClasspathEntry::Directory(_) => Origin::ProjectDirectory,
            ClasspathEntry::Archive(_) | ClasspathEntry::ArchiveDirectory(_) => {
                Origin::ProjectArchive
            }
        }
    }

    /// The form accepted by `javap -classpath`.
    pub fn to_classpath_element(&self) -> PathBuf {
        match self {
            ClasspathEntry::ArchiveDirectory(dir) => dir.join("*"),
            other => other.path().to_path_buf(),
        }
    }
}

/// Splits a platform classpath string (`:` on unix, `;` on windows).
pub fn parse_classpath(raw: &str, root: &Path) -> Vec<ClasspathEntry> {
    std::env::split_paths(raw)
        .filter_map(|p| ClasspathEntry::parse(&p.to_string_lossy(), root))
        .collect()
}

fn resolve_path(raw: &str, root: &Path) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Class files found under one classpath origin (a directory or a single
/// archive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedOrigin {
    pub origin: PathBuf,
    pub kind: Origin,
    /// Paths relative to the origin, `/`-separated, ending in `.class`.
    pub class_files: Vec<String>,
}

impl ScannedOrigin {
    pub fn class_names(&self) -> Vec<String> {
        self.class_files
            .iter()
            .map(|f| class_file_to_class_name(f))
            .collect()
    }
}

pub fn class_file_to_class_name(class_file: &str) -> String {
    class_file
        .trim_end_matches(".class")
        .replace(['/', '\\'], ".")
}

pub fn class_name_to_class_file(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

pub struct ClasspathScanner<'a> {
    tool: &'a dyn Introspect,
    ignore_inner_classes: bool,
}

impl<'a> ClasspathScanner<'a> {
    pub fn new(tool: &'a dyn Introspect, ignore_inner_classes: bool) -> Self {
        Self {
            tool,
            ignore_inner_classes,
        }
    }

    /// Enumerates one classpath entry. Unreadable locations are logged and
    /// yield nothing.
    pub fn scan(&self, entry: &ClasspathEntry) -> Vec<ScannedOrigin> {
        match entry {
            ClasspathEntry::Directory(dir) => self.scan_directory(dir).into_iter().collect(),
            ClasspathEntry::Archive(path) => self
                .scan_archive(path, Origin::ProjectArchive)
                .into_iter()
                .collect(),
            ClasspathEntry::ArchiveDirectory(dir) => list_archives(dir)
                .iter()
                .filter_map(|path| self.scan_archive(path, Origin::ProjectArchive))
                .collect(),
        }
    }

    pub fn scan_directory(&self, dir: &Path) -> Option<ScannedOrigin> {
        if !dir.is_dir() {
            tracing::warn!("Skipping unreadable class directory {}", dir.display());
            return None;
        }

        let walker = WalkBuilder::new(dir)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut class_files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Error walking {}: {err}", dir.display());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if self.accepts(&relative) {
                class_files.push(relative);
            }
        }

        Some(ScannedOrigin {
            origin: dir.to_path_buf(),
            kind: Origin::ProjectDirectory,
            class_files,
        })
    }

    pub fn scan_archive(&self, path: &Path, kind: Origin) -> Option<ScannedOrigin> {
        if !path.is_file() {
            tracing::warn!("Skipping missing archive {}", path.display());
            return None;
        }
        let class_files = self
            .tool
            .list_archive_entries(path)
            .into_iter()
            .filter(|name| self.accepts(name))
            .collect();

        Some(ScannedOrigin {
            origin: path.to_path_buf(),
            kind,
            class_files,
        })
    }

    fn accepts(&self, file_name: &str) -> bool {
        if !file_name.ends_with(".class") {
            return false;
        }
        let base = file_name.rsplit('/').next().unwrap_or(file_name);
        if base == "module-info.class" || base == "package-info.class" {
            return false;
        }
        !(self.ignore_inner_classes && file_name.contains('$'))
    }
}

fn list_archives(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!("Skipping unreadable archive directory {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut archives: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_archive(p))
        .collect();
    archives.sort();
    archives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{temp_path, write_jar};
    use crate::introspect::tests::FakeTool;
    use crate::javap::Javap;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn parse_classifies_entries() {
        let root = Path::new("/project");
        assert_eq!(
            ClasspathEntry::parse("bin", root),
            Some(ClasspathEntry::Directory(PathBuf::from("/project/bin")))
        );
        assert_eq!(
            ClasspathEntry::parse("/opt/lib/a.jar", root),
            Some(ClasspathEntry::Archive(PathBuf::from("/opt/lib/a.jar")))
        );
        assert_eq!(
            ClasspathEntry::parse("lib/*", root),
            Some(ClasspathEntry::ArchiveDirectory(PathBuf::from("/project/lib/")))
        );
        assert_eq!(ClasspathEntry::parse("  ", root), None);
    }

    #[cfg(unix)]
    #[test]
    fn parse_classpath_skips_empty_elements() {
        let entries = parse_classpath("bin::lib/a.jar:", Path::new("/p"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].origin_kind(), Origin::ProjectArchive);
        assert_eq!(entries[0].origin_kind(), Origin::ProjectDirectory);
    }

    #[test]
    fn directory_scan_drops_inner_classes_when_asked() {
        let dir = temp_path("classes");
        touch(&dir.join("a/B.class"));
        touch(&dir.join("a/B$Inner.class"));
        touch(&dir.join("a/package-info.class"));
        touch(&dir.join("a/notes.txt"));

        let tool = FakeTool::default();
        let scanned = ClasspathScanner::new(&tool, true).scan(&ClasspathEntry::Directory(dir.clone()));
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].kind, Origin::ProjectDirectory);
        assert_eq!(scanned[0].class_names(), vec!["a.B"]);

        let scanned = ClasspathScanner::new(&tool, false).scan(&ClasspathEntry::Directory(dir.clone()));
        assert_eq!(scanned[0].class_names(), vec!["a.B$Inner", "a.B"]);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unreadable_entries_contribute_nothing() {
        let tool = FakeTool::default();
        let scanner = ClasspathScanner::new(&tool, true);
        let missing = temp_path("missing");
        assert!(scanner.scan(&ClasspathEntry::Directory(missing.clone())).is_empty());
        assert!(scanner.scan(&ClasspathEntry::Archive(missing.join("a.jar"))).is_empty());
        assert!(scanner.scan(&ClasspathEntry::ArchiveDirectory(missing)).is_empty());
    }

    #[test]
    fn wildcard_scans_each_archive_in_the_directory() -> anyhow::Result<()> {
        let lib = temp_path("lib");
        write_jar(&lib.join("b.jar"), &[("x/Y.class", b""), ("x/Y$1.class", b"")])?;
        write_jar(&lib.join("a.jar"), &[("p/Q.class", b""), ("META-INF/MANIFEST.MF", b"")])?;
        fs::write(lib.join("readme.txt"), b"")?;
        write_jar(&lib.join("nested/c.jar"), &[("z/Z.class", b"")])?;

        let javap = Javap::new(PathBuf::from("javap"));
        let scanner = ClasspathScanner::new(&javap, true);
        let scanned = scanner.scan(&ClasspathEntry::ArchiveDirectory(lib.clone()));

        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].origin, lib.join("a.jar"));
        assert_eq!(scanned[0].class_names(), vec!["p.Q"]);
        assert_eq!(scanned[1].class_names(), vec!["x.Y"]);
        assert!(scanned.iter().all(|s| s.kind == Origin::ProjectArchive));

        let _ = fs::remove_dir_all(lib);
        Ok(())
    }

    #[test]
    fn class_name_conversions() {
        assert_eq!(class_file_to_class_name("a/b/C.class"), "a.b.C");
        assert_eq!(class_name_to_class_file("a.b.C"), "a/b/C.class");
    }
}
