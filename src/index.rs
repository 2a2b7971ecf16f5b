//! Category-keyed collection of prefix tries.
//!
//! The [`CLASS_CATEGORY`] trie holds one entry per class under its
//! fully-qualified name and another under its inverse name. Every other
//! category is named after a fully-qualified class and holds that class's
//! constructors, methods and properties keyed by [`MemberDescriptor::key`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{ClassDescriptor, Descriptor, MemberDescriptor, Origin, inverse_name};
use crate::trie::{PrefixTrie, Ranked};

pub const CLASS_CATEGORY: &str = "class";

impl Ranked for Descriptor {
    fn rank(&self) -> u64 {
        self.last_used().get()
    }
}

type Tries = HashMap<String, PrefixTrie<Descriptor>>;

#[derive(Debug)]
pub struct ClassIndex {
    tries: RwLock<Tries>,
    clock: AtomicU64,
}

impl Default for ClassIndex {
    fn default() -> Self {
        Self {
            tries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(Origin::MAX_SEED),
        }
    }
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tries> {
        self.tries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tries> {
        self.tries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, category: &str, key: &str, descriptor: Descriptor) {
        self.observe(descriptor.rank());
        self.write()
            .entry(category.to_string())
            .or_default()
            .insert(key, descriptor);
    }

    /// Entries of `category` whose key starts with `prefix`. An unknown
    /// category yields nothing.
    pub fn find(&self, category: &str, prefix: &str) -> Vec<Descriptor> {
        self.read()
            .get(category)
            .map(|trie| trie.find(prefix).into_iter().map(|(_, d)| d).collect())
            .unwrap_or_default()
    }

    pub fn remove(&self, category: &str, key: &str) {
        let mut tries = self.write();
        if let Some(trie) = tries.get_mut(category) {
            trie.remove(key);
            if trie.is_empty() {
                tries.remove(category);
            }
        }
    }

    pub fn remove_category(&self, category: &str) {
        self.write().remove(category);
    }

    /// Keeps the touch clock ahead of every rank stored in the index.
    fn observe(&self, rank: u64) {
        self.clock.fetch_max(rank, Ordering::Relaxed);
    }

    /// Moves `descriptor` to the front of its result lists.
    pub fn touch(&self, descriptor: &Descriptor) -> u64 {
        let now = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        descriptor.last_used().bump_to(now)
    }

    /// Touches the class entry for `class_name`. Returns false when the class
    /// is not indexed.
    pub fn touch_class(&self, class_name: &str) -> bool {
        match self.get_class(class_name) {
            Some(class) => {
                self.touch(&Descriptor::Class(class));
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn get_class(&self, class_name: &str) -> Option<Arc<ClassDescriptor>> {
        match self.read().get(CLASS_CATEGORY)?.get(class_name)? {
            Descriptor::Class(class) => Some(Arc::clone(class)),
            Descriptor::Member(_) => None,
        }
    }

    /// Classes matching `prefix` by fully-qualified or inverse name, one
    /// result per class.
    pub fn find_class(&self, prefix: &str) -> Vec<Arc<ClassDescriptor>> {
        let mut seen = HashSet::new();
        self.find(CLASS_CATEGORY, prefix)
            .into_iter()
            .filter_map(|d| match d {
                Descriptor::Class(class) => Some(class),
                Descriptor::Member(_) => None,
            })
            .filter(|class| seen.insert(class.class_name.clone()))
            .collect()
    }

    pub fn find_class_member(&self, class_name: &str, prefix: &str) -> Vec<Arc<MemberDescriptor>> {
        self.find(class_name, prefix)
            .into_iter()
            .filter_map(|d| match d {
                Descriptor::Member(member) => Some(member),
                Descriptor::Class(_) => None,
            })
            .collect()
    }

    pub fn find_superclass_name(&self, class_name: &str) -> Option<String> {
        self.get_class(class_name)?.superclass_name.clone()
    }

    /// Merges a freshly scanned class.
    ///
    /// A names-only descriptor never displaces one that already carries
    /// members; anything else goes through [`ClassIndex::replace_class`].
    pub fn add_class(&self, class: ClassDescriptor) -> Arc<ClassDescriptor> {
        if !class.members_loaded
            && let Some(existing) = self.get_class(&class.class_name)
            && existing.members_loaded
        {
            return existing;
        }
        self.replace_class(class)
    }

    /// Overwrites the class entry and rebuilds its member category from
    /// scratch. Ranks already earned by the class and by members that
    /// survive the rescan are carried over.
    pub fn replace_class(&self, class: ClassDescriptor) -> Arc<ClassDescriptor> {
        let mut tries = self.write();

        let class_trie = tries.entry(CLASS_CATEGORY.to_string()).or_default();
        if let Some(previous) = class_trie.get(&class.class_name) {
            class.last_used.raise_to(previous.rank());
        }
        self.observe(class.last_used.get());
        let class = Arc::new(class);
        let entry = Descriptor::Class(Arc::clone(&class));
        class_trie.insert(&class.class_name, entry.clone());
        class_trie.insert(&inverse_name(&class.class_name), entry);

        let previous_members = tries.remove(&class.class_name);
        let mut members = PrefixTrie::new();
        for member in class.all_members() {
            let key = member.key();
            if let Some(previous) = previous_members.as_ref().and_then(|t| t.get(&key)) {
                member.last_used.raise_to(previous.rank());
            }
            self.observe(member.last_used.get());
            members.insert(&key, Descriptor::Member(Arc::clone(member)));
        }
        if !members.is_empty() {
            tries.insert(class.class_name.clone(), members);
        }

        class
    }

    /// Drops every class `keep` rejects, along with its member category.
    /// Returns the number of classes dropped.
    pub fn retain_classes(&self, mut keep: impl FnMut(&ClassDescriptor) -> bool) -> usize {
        let mut tries = self.write();
        let Some(class_trie) = tries.get_mut(CLASS_CATEGORY) else {
            return 0;
        };

        let stale: Vec<String> = class_trie
            .find("")
            .into_iter()
            .filter_map(|(key, d)| match d {
                Descriptor::Class(class)
                    if key == class.class_name && !keep(class.as_ref()) =>
                {
                    Some(key)
                }
                _ => None,
            })
            .collect();

        for class_name in &stale {
            class_trie.remove(class_name);
            let inverse = inverse_name(class_name);
            let same_class = matches!(
                class_trie.get(&inverse),
                Some(Descriptor::Class(c)) if &c.class_name == class_name
            );
            if same_class {
                class_trie.remove(&inverse);
            }
        }
        if class_trie.is_empty() {
            tries.remove(CLASS_CATEGORY);
        }
        for class_name in &stale {
            tries.remove(class_name);
        }
        stale.len()
    }

    pub fn class_count(&self) -> usize {
        self.find_class("").len()
    }

    pub fn category_count(&self) -> usize {
        self.read().len()
    }
}
