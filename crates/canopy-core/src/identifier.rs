//! Element identifiers backed by string interning.
//!
//! This module provides the [`Id`] type used for elements and semantic nodes,
//! and [`IdGenerator`] for minting fresh ids while editing.

use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for identifier storage.
///
/// # Thread Safety
///
/// This uses `Mutex` for thread-safe access to the string interner.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock")
}

/// Identifier of a diagram element or semantic node.
///
/// Ids are interned, so copying, hashing and comparing them is cheap. The
/// string form is what import payloads and events carry.
///
/// # Examples
///
/// ```
/// use canopy_core::identifier::Id;
///
/// let task = Id::new("Task_1");
/// let same: Id = "Task_1".into();
///
/// assert_eq!(task, same);
/// assert_eq!(task, "Task_1");
/// assert_eq!(task.with_suffix("label"), "Task_1_label");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from &str.
    ///
    /// # Arguments
    ///
    /// * `name` - The string representation of the identifier
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Creates a derived id by appending `_<suffix>` to this id.
    ///
    /// Labels use this to get a stable id from the element they annotate.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let mut interner = interner();
        let base = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        let derived = format!("{base}_{suffix}");
        Self(interner.get_or_intern(&derived))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = interner();
        let str_value = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        write!(f, "{str_value}")
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl std::str::FromStr for Id {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    /// Allows direct comparison with string slices: `id == "string"`
    fn eq(&self, other: &str) -> bool {
        let interner = interner();
        let self_str = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        self_str == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}

/// Mints fresh ids of the form `<Prefix>_<n>`.
///
/// Counters are kept per prefix. The caller supplies a predicate telling which
/// ids are already taken, so imported ids such as `Task_1` are never reused.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counters: HashMap<String, usize>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next free id for `prefix`.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Id prefix, usually derived from the element type.
    /// * `taken` - Returns `true` for ids that are already in use.
    pub fn next(&mut self, prefix: &str, taken: impl Fn(Id) -> bool) -> Id {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = Id::new(&format!("{prefix}_{counter}"));
            if !taken(candidate) {
                return candidate;
            }
        }
    }

    /// Forgets every counter, used when a new diagram is imported.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}

/// Derives an id prefix from an element type such as `bpmn:SequenceFlow`.
///
/// The namespace before the last `:` is dropped.
pub fn prefix_for_type(element_type: &str) -> &str {
    element_type
        .rsplit_once(':')
        .map_or(element_type, |(_, local)| local)
}
