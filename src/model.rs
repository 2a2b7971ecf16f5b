//! Class and member descriptors stored in the [`ClassIndex`](crate::index::ClassIndex).
//!
//! Every descriptor carries a [`Recency`] rank. The rank has exactly two
//! write sources:
//!
//! - the origin seed assigned when the descriptor is created during a scan
//!   ([`Origin::seed_rank`]), so unused project classes already outrank
//!   same-prefix classes from lower-priority origins;
//! - later [`touch`](crate::index::ClassIndex::touch) calls made by consumers
//!   recording usage, which draw from a clock that starts above every seed.
//!
//! Neither source ever lowers a rank.

use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where a class was found. Determines the initial rank of its descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    ProjectDirectory,
    ProjectArchive,
    SystemArchive,
}

impl Origin {
    /// Highest rank any origin seeds. Touches always land above it.
    pub const MAX_SEED: u64 = 2;

    pub fn seed_rank(self) -> u64 {
        match self {
            Origin::ProjectDirectory => 2,
            Origin::ProjectArchive => 0,
            Origin::SystemArchive => 1,
        }
    }
}

/// Monotonic usage rank shared by every index entry pointing at a descriptor.
#[derive(Debug, Default)]
pub struct Recency(AtomicU64);

impl Recency {
    pub fn new(rank: u64) -> Self {
        Self(AtomicU64::new(rank))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Raises the rank to at least `rank`. Never lowers it.
    pub fn raise_to(&self, rank: u64) {
        self.0.fetch_max(rank, Ordering::Relaxed);
    }

    /// Moves the rank to `now`, or one past its current value if that is
    /// already higher, and returns the new rank.
    pub(crate) fn bump_to(&self, now: u64) -> u64 {
        let previous = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some(now.max(cur.saturating_add(1)))
            })
            .unwrap_or_else(|cur| cur);
        now.max(previous.saturating_add(1))
    }
}

impl Clone for Recency {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Serialize for Recency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Constructor,
    Method,
    Property,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Package,
}

impl Visibility {
    pub fn from_modifier(token: &str) -> Self {
        match token {
            "public" => Visibility::Public,
            "protected" => Visibility::Protected,
            "private" => Visibility::Private,
            _ => Visibility::Package,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberDescriptor {
    pub kind: MemberKind,
    pub name: String,
    pub class_name: String,
    pub simple_class_name: String,
    pub return_type: String,
    pub visibility: Visibility,
    /// `None` for properties, `Some(vec![])` for zero-argument methods.
    pub parameter_types: Option<Vec<String>>,
    /// Declaration text as printed by the tool, with recovered parameter
    /// names interleaved when they were available.
    pub signature: String,
    pub last_used: Recency,
}

impl MemberDescriptor {
    /// Identity of the member within its declaring class: `name` for
    /// properties, `name(T1,T2)` for methods and constructors.
    pub fn key(&self) -> String {
        match &self.parameter_types {
            None => self.name.clone(),
            Some(types) => format!("{}({})", self.name, types.join(",")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDescriptor {
    pub class_name: String,
    pub simple_name: String,
    pub package_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass_name: Option<String>,
    pub origin: Origin,
    pub last_used: Recency,
    /// False for descriptors produced by a names-only scan.
    pub members_loaded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constructors: Vec<Arc<MemberDescriptor>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Arc<MemberDescriptor>>,
}

impl ClassDescriptor {
    /// A bare descriptor with no member information.
    pub fn new(class_name: &str, origin: Origin) -> Self {
        Self {
            class_name: class_name.to_string(),
            simple_name: simple_name(class_name).to_string(),
            package_name: package_name(class_name).to_string(),
            superclass_name: None,
            origin,
            last_used: Recency::new(origin.seed_rank()),
            members_loaded: false,
            constructors: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn all_members(&self) -> impl Iterator<Item = &Arc<MemberDescriptor>> {
        self.constructors.iter().chain(self.members.iter())
    }
}

/// Value stored in an index category.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Descriptor {
    Class(Arc<ClassDescriptor>),
    Member(Arc<MemberDescriptor>),
}

impl Descriptor {
    pub fn last_used(&self) -> &Recency {
        match self {
            Descriptor::Class(c) => &c.last_used,
            Descriptor::Member(m) => &m.last_used,
        }
    }
}

pub fn simple_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

pub fn package_name(class_name: &str) -> &str {
    class_name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
}

/// `org.example.Foo` becomes `Foo.example.org`, so a simple-name prefix
/// reaches the class in a prefix trie.
pub fn inverse_name(class_name: &str) -> String {
    class_name.rsplit('.').collect::<Vec<_>>().join(".")
}
