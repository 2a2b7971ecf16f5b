//! Batched invocation of the class-introspection capability.

use std::path::Path;

use crate::config::IndexConfig;
use crate::model::{ClassDescriptor, Origin};
use crate::parse::{parse_basic, parse_verbose, split_chunks};

/// External facility able to list archives and describe classes.
///
/// Implementations never fail outward: problems are logged and surface as
/// empty results.
pub trait Introspect: Send + Sync {
    fn list_archive_entries(&self, archive: &Path) -> Vec<String>;

    /// Describes `class_names` as found on `classpath`. `verbose` requests the
    /// private/verbose detail level that includes parameter tables.
    fn introspect_classes(&self, classpath: &Path, class_names: &[String], verbose: bool)
    -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// Class names only; the tool is not invoked.
    NamesOnly,
    Basic,
    /// Includes private members and recovered parameter names.
    Verbose,
}

pub struct ClassIntrospector<'a> {
    tool: &'a dyn Introspect,
    config: &'a IndexConfig,
}

impl<'a> ClassIntrospector<'a> {
    pub fn new(tool: &'a dyn Introspect, config: &'a IndexConfig) -> Self {
        Self { tool, config }
    }

    pub fn batch_size(&self, level: DetailLevel) -> usize {
        match level {
            DetailLevel::NamesOnly => usize::MAX,
            DetailLevel::Basic => self.config.basic_batch_size.max(1),
            DetailLevel::Verbose => self.config.verbose_batch_size.max(1),
        }
    }

    /// Describes `class_names` from `origin` and hands each descriptor to
    /// `sink` as soon as its batch is parsed. Batches are issued one at a
    /// time. Returns the number of descriptors produced.
    pub fn describe(
        &self,
        origin: &Path,
        origin_kind: Origin,
        class_names: &[String],
        level: DetailLevel,
        mut sink: impl FnMut(ClassDescriptor),
    ) -> usize {
        if level == DetailLevel::NamesOnly {
            for name in class_names {
                sink(ClassDescriptor::new(name, origin_kind));
            }
            return class_names.len();
        }

        let verbose = level == DetailLevel::Verbose;
        let mut produced = 0usize;
        for batch in class_names.chunks(self.batch_size(level)) {
            let output = self.tool.introspect_classes(origin, batch, verbose);
            let chunks = split_chunks(&output);
            if chunks.len() < batch.len() {
                tracing::debug!(
                    "{} of {} classes from {} produced no description",
                    batch.len() - chunks.len(),
                    batch.len(),
                    origin.display()
                );
            }

            for chunk in chunks {
                let parsed = if verbose {
                    parse_verbose(&chunk, origin_kind)
                } else {
                    parse_basic(&chunk, origin_kind)
                };
                match parsed {
                    Some(class) => {
                        produced += 1;
                        sink(class);
                    }
                    None => tracing::warn!(
                        "Unrecognized class description from {}",
                        origin.display()
                    ),
                }
            }
        }
        produced
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Canned tool: archive listings by path and one basic/verbose
    /// description per class name.
    #[derive(Default)]
    pub(crate) struct FakeTool {
        pub archives: HashMap<PathBuf, Vec<String>>,
        pub classes: HashMap<String, String>,
        pub calls: Mutex<Vec<(PathBuf, Vec<String>, bool)>>,
    }

    impl FakeTool {
        pub fn with_class(mut self, class_name: &str, description: &str) -> Self {
            self.classes
                .insert(class_name.to_string(), description.to_string());
            self
        }

        pub fn with_archive(mut self, path: &Path, entries: &[&str]) -> Self {
            self.archives.insert(
                path.to_path_buf(),
                entries.iter().map(|e| e.to_string()).collect(),
            );
            self
        }

        pub fn calls(&self) -> Vec<(PathBuf, Vec<String>, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Introspect for FakeTool {
        fn list_archive_entries(&self, archive: &Path) -> Vec<String> {
            self.archives.get(archive).cloned().unwrap_or_default()
        }

        fn introspect_classes(
            &self,
            classpath: &Path,
            class_names: &[String],
            verbose: bool,
        ) -> String {
            self.calls.lock().unwrap().push((
                classpath.to_path_buf(),
                class_names.to_vec(),
                verbose,
            ));
            class_names
                .iter()
                .filter_map(|name| self.classes.get(name))
                .map(String::as_str)
                .collect()
        }
    }

    fn simple_class(name: &str) -> String {
        format!("Compiled from \"X.java\"\npublic class {name} {{\n  public void run();\n}}\n")
    }

    #[test]
    fn names_only_skips_the_tool() {
        let tool = FakeTool::default();
        let config = IndexConfig::default();
        let introspector = ClassIntrospector::new(&tool, &config);

        let mut seen = Vec::new();
        let names = vec!["a.A".to_string(), "a.B".to_string()];
        let produced = introspector.describe(
            Path::new("classes"),
            Origin::ProjectDirectory,
            &names,
            DetailLevel::NamesOnly,
            |c| seen.push(c),
        );

        assert_eq!(produced, 2);
        assert!(tool.calls().is_empty());
        assert!(seen.iter().all(|c| !c.members_loaded && c.members.is_empty()));
    }

    #[test]
    fn full_detail_is_batched_and_missing_classes_are_absent() {
        let names: Vec<String> = (0..45).map(|i| format!("a.C{i}")).collect();
        let mut tool = FakeTool::default();
        for name in names.iter().filter(|n| *n != "a.C7") {
            tool = tool.with_class(name, &simple_class(name));
        }
        let config = IndexConfig::default();
        let introspector = ClassIntrospector::new(&tool, &config);

        let mut seen = Vec::new();
        let produced = introspector.describe(
            Path::new("lib/a.jar"),
            Origin::ProjectArchive,
            &names,
            DetailLevel::Verbose,
            |c| seen.push(c.class_name),
        );

        assert_eq!(produced, 44);
        assert!(!seen.contains(&"a.C7".to_string()));
        let batch_sizes: Vec<usize> = tool.calls().iter().map(|(_, b, _)| b.len()).collect();
        assert_eq!(batch_sizes, vec![20, 20, 5]);
        assert!(tool.calls().iter().all(|(_, _, verbose)| *verbose));
    }

    #[test]
    fn basic_detail_uses_larger_batches() {
        let names: Vec<String> = (0..60).map(|i| format!("a.C{i}")).collect();
        let tool = FakeTool::default();
        let config = IndexConfig::default();
        let introspector = ClassIntrospector::new(&tool, &config);

        let produced = introspector.describe(
            Path::new("classes"),
            Origin::ProjectDirectory,
            &names,
            DetailLevel::Basic,
            |_| {},
        );

        assert_eq!(produced, 0);
        let batch_sizes: Vec<usize> = tool.calls().iter().map(|(_, b, _)| b.len()).collect();
        assert_eq!(batch_sizes, vec![50, 10]);
    }
}
