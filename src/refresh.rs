//! Sequencing of classpath scans into the [`ClassIndex`].
//!
//! A full refresh clears the index, then indexes every project entry (names
//! first, members second) before the system library. An incremental refresh
//! rescans the project entries, dropping project classes that are no longer
//! found, and never touches the system library. Only
//! one full refresh may run at a time; a second one is rejected rather than
//! queued.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::config::IndexConfig;
use crate::index::ClassIndex;
use crate::introspect::{ClassIntrospector, DetailLevel, Introspect};
use crate::locate::SystemLibraryLocator;
use crate::model::{ClassDescriptor, Origin};
use crate::scan::{
    ClasspathEntry, ClasspathScanner, ScannedOrigin, class_file_to_class_name,
    class_name_to_class_file, parse_classpath,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("A full refresh is already in progress")]
    FullRefreshInProgress,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub full_refresh: bool,
    pub scanned_origins: usize,
    /// Class descriptors produced by the names pass.
    pub classes_indexed: usize,
    pub members_indexed: usize,
    /// Project classes dropped by an incremental refresh.
    pub classes_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_library: Option<PathBuf>,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// The classpath could not be determined; nothing was scanned.
    Declined,
}

/// Supplies the classpath to refresh from.
pub trait ClasspathSource {
    /// `None` when the classpath cannot be determined.
    fn entries(&self) -> Option<Vec<ClasspathEntry>>;

    fn load_members(&self) -> bool;
}

/// A classpath known up front.
#[derive(Debug, Clone)]
pub struct StaticClasspath {
    entries: Option<Vec<ClasspathEntry>>,
    load_members: bool,
}

impl StaticClasspath {
    pub fn new(entries: Option<Vec<ClasspathEntry>>, load_members: bool) -> Self {
        Self {
            entries,
            load_members,
        }
    }

    /// Parses a platform classpath string relative to `root`.
    pub fn parse(raw: &str, root: &Path, load_members: bool) -> Self {
        Self::new(Some(parse_classpath(raw, root)), load_members)
    }
}

impl ClasspathSource for StaticClasspath {
    fn entries(&self) -> Option<Vec<ClasspathEntry>> {
        self.entries.clone()
    }

    fn load_members(&self) -> bool {
        self.load_members
    }
}

#[derive(Debug, Default)]
struct FullRefreshGate(AtomicBool);

impl FullRefreshGate {
    fn try_enter(&self) -> Option<FullRefreshGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| FullRefreshGuard(&self.0))
    }

    fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the full-refresh flag on drop, including on unwind.
struct FullRefreshGuard<'a>(&'a AtomicBool);

impl Drop for FullRefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RefreshCoordinator {
    index: Arc<ClassIndex>,
    tool: Arc<dyn Introspect>,
    locator: Arc<dyn SystemLibraryLocator>,
    config: IndexConfig,
    gate: FullRefreshGate,
    locator_failure_reported: AtomicBool,
}

impl RefreshCoordinator {
    pub fn new(
        index: Arc<ClassIndex>,
        tool: Arc<dyn Introspect>,
        locator: Arc<dyn SystemLibraryLocator>,
        config: IndexConfig,
    ) -> Self {
        Self {
            index,
            tool,
            locator,
            config,
            gate: FullRefreshGate::default(),
            locator_failure_reported: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> &Arc<ClassIndex> {
        &self.index
    }

    pub fn is_full_refresh_in_progress(&self) -> bool {
        self.gate.is_held()
    }

    /// Scans `entries` into the index.
    ///
    /// With `full_refresh` the index is cleared first and the system library
    /// is indexed after every project entry. Without it, project classes the
    /// scan no longer finds are removed. A full refresh requested while
    /// another is running fails with [`RefreshError::FullRefreshInProgress`]
    /// and leaves the index untouched.
    pub fn load_classes(
        &self,
        entries: &[ClasspathEntry],
        load_members: bool,
        full_refresh: bool,
    ) -> Result<RefreshReport, RefreshError> {
        let started = Instant::now();
        let _guard = if full_refresh {
            match self.gate.try_enter() {
                Some(guard) => Some(guard),
                None => {
                    tracing::warn!("Rejecting full refresh: another one is still running");
                    return Err(RefreshError::FullRefreshInProgress);
                }
            }
        } else {
            None
        };

        tracing::info!(
            "Refreshing {} classpath entries (full: {full_refresh}, members: {load_members})",
            entries.len()
        );
        if full_refresh {
            self.index.clear();
        }

        let scanner = ClasspathScanner::new(self.tool.as_ref(), self.config.ignore_inner_classes);
        let origins: Vec<ScannedOrigin> = entries.iter().flat_map(|e| scanner.scan(e)).collect();

        let mut report = RefreshReport {
            full_refresh,
            scanned_origins: origins.len(),
            ..RefreshReport::default()
        };
        self.index_origins(&origins, load_members, &mut report);

        if !full_refresh {
            let found: HashSet<String> = origins.iter().flat_map(|o| o.class_names()).collect();
            report.classes_removed = self.index.retain_classes(|c| {
                c.origin == Origin::SystemArchive || found.contains(&c.class_name)
            });
            if report.classes_removed > 0 {
                tracing::debug!("Dropped {} vanished project classes", report.classes_removed);
            }
        }

        if full_refresh && let Some(system) = self.scan_system_library(&scanner) {
            report.scanned_origins += 1;
            report.system_library = Some(system.origin.clone());
            self.index_origins(std::slice::from_ref(&system), load_members, &mut report);
        }

        report.duration_ms = started.elapsed().as_millis();
        tracing::info!(
            "Indexed {} classes and {} members from {} origins in {}ms",
            report.classes_indexed,
            report.members_indexed,
            report.scanned_origins,
            report.duration_ms
        );
        Ok(report)
    }

    /// Refreshes from whatever `source` reports. An undetermined classpath
    /// declines the refresh without touching the index.
    pub fn refresh_from(
        &self,
        source: &dyn ClasspathSource,
        full_refresh: bool,
    ) -> Result<RefreshOutcome, RefreshError> {
        let Some(entries) = source.entries() else {
            tracing::info!("Classpath could not be determined; skipping refresh");
            return Ok(RefreshOutcome::Declined);
        };
        self.load_classes(&entries, source.load_members(), full_refresh)
            .map(RefreshOutcome::Completed)
    }

    /// Re-introspects one class and replaces its descriptor and member
    /// category. The first classpath entry providing the class wins. When
    /// the class cannot be described the index is left as it was.
    pub fn load_class(
        &self,
        class_name: &str,
        entries: &[ClasspathEntry],
        load_members: bool,
    ) -> Option<Arc<ClassDescriptor>> {
        let classpath = match std::env::join_paths(entries.iter().map(|e| e.to_classpath_element())) {
            Ok(joined) => PathBuf::from(joined),
            Err(err) => {
                tracing::warn!("Cannot build classpath to reload {class_name}: {err}");
                return None;
            }
        };

        let level = if load_members {
            self.config.member_detail_level()
        } else {
            DetailLevel::NamesOnly
        };
        let origin_kind = reload_origin_kind(class_name, entries);
        let names = [class_name.to_string()];

        let mut reloaded = None;
        ClassIntrospector::new(self.tool.as_ref(), &self.config).describe(
            &classpath,
            origin_kind,
            &names,
            level,
            |class| {
                if reloaded.is_none() && class.class_name == class_name {
                    reloaded = Some(class);
                }
            },
        );

        match reloaded {
            Some(class) => Some(self.index.replace_class(class)),
            None => {
                tracing::debug!("No description for {class_name}; keeping indexed entry");
                None
            }
        }
    }

    /// Runs [`RefreshCoordinator::load_classes`] on a background thread.
    pub fn spawn_load_classes(
        self: &Arc<Self>,
        entries: Vec<ClasspathEntry>,
        load_members: bool,
        full_refresh: bool,
    ) -> JoinHandle<Result<RefreshReport, RefreshError>> {
        let coordinator = Arc::clone(self);
        std::thread::spawn(move || coordinator.load_classes(&entries, load_members, full_refresh))
    }

    fn index_origins(&self, origins: &[ScannedOrigin], load_members: bool, report: &mut RefreshReport) {
        let introspector = ClassIntrospector::new(self.tool.as_ref(), &self.config);

        for origin in origins {
            report.classes_indexed += introspector.describe(
                &origin.origin,
                origin.kind,
                &origin.class_names(),
                DetailLevel::NamesOnly,
                |class| {
                    self.index.add_class(class);
                },
            );
        }

        if !load_members {
            return;
        }
        let level = self.config.member_detail_level();
        for origin in origins {
            introspector.describe(
                &origin.origin,
                origin.kind,
                &origin.class_names(),
                level,
                |class| {
                    report.members_indexed += class.all_members().count();
                    self.index.add_class(class);
                },
            );
        }
    }

    fn scan_system_library(&self, scanner: &ClasspathScanner<'_>) -> Option<ScannedOrigin> {
        let Some(path) = self.locator.locate() else {
            if !self.locator_failure_reported.swap(true, Ordering::Relaxed) {
                tracing::warn!("Java system library not found; core classes will not be indexed");
            }
            return None;
        };

        let mut scanned = scanner.scan_archive(&path, Origin::SystemArchive)?;
        scanned
            .class_files
            .retain(|f| self.config.accepts_system_class(&class_file_to_class_name(f)));
        Some(scanned)
    }
}

fn reload_origin_kind(class_name: &str, entries: &[ClasspathEntry]) -> Origin {
    let class_file = class_name_to_class_file(class_name);
    let in_directory = entries.iter().any(|e| match e {
        ClasspathEntry::Directory(dir) => dir.join(&class_file).is_file(),
        _ => false,
    });
    if in_directory {
        Origin::ProjectDirectory
    } else {
        Origin::ProjectArchive
    }
}
