//! Keyed entity registry
//!
//! An `EntityTable` maps integer ids to entities. Ids are handed out from a
//! monotonically increasing counter and are never reused for the lifetime of
//! the table, not even after the entity holding them has been removed.
//!
//! Iteration follows id order, but callers that care about presentation order
//! (creation time, rating, ...) sort explicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by table bookkeeping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// An entity tried to claim an id that is already occupied
    #[error("id {0} is already registered")]
    DuplicateId(u64),

    /// The id is the last one the key type can hold, so no id could follow it
    #[error("id {0} is out of range")]
    IdOutOfRange(u64),
}

/// A strongly typed table key backed by a `u64`
pub trait TableKey: Copy + Ord + Hash + fmt::Debug {
    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;
}

/// Anything stored in an [`EntityTable`]
pub trait Entity {
    type Key: TableKey;

    /// The id the entity was registered under (or intends to claim)
    fn id(&self) -> Self::Key;
}

macro_rules! table_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl TableKey for $name {
            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

table_key!(
    /// Id of a registered user
    UserId
);
table_key!(
    /// Id of a question in the global question table
    QuestionId
);
table_key!(
    /// Id of an answer, unique within its question
    AnswerId
);
table_key!(
    /// Id of a comment, unique within its parent
    CommentId
);
table_key!(
    /// Id of a tag in the tag index
    TagId
);
table_key!(
    /// Id of a notification in the global notification table
    NotificationId
);

/// Registry of entities addressed by integer id
#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = "T: Serialize, T::Key: Serialize"))]
pub struct EntityTable<T: Entity> {
    entries: BTreeMap<T::Key, T>,
    next: u64,
}

impl<T: Entity> Default for EntityTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityTable<T> {
    /// Create an empty table whose first id is 1
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next: 1,
        }
    }

    /// The id the next auto-assigned entity will receive
    ///
    /// Does not reserve anything.
    pub fn next_id(&self) -> T::Key {
        T::Key::from_raw(self.next)
    }

    /// Store an entity under the id it carries
    ///
    /// Fails if that id is occupied. Claiming an id beyond the counter moves
    /// the counter past it, so the id can never be handed out again.
    pub fn add(&mut self, entity: T) -> Result<T::Key, TableError> {
        let id = entity.id();
        if self.entries.contains_key(&id) {
            return Err(TableError::DuplicateId(id.raw()));
        }
        let following = id
            .raw()
            .checked_add(1)
            .ok_or(TableError::IdOutOfRange(id.raw()))?;
        self.next = self.next.max(following);
        self.entries.insert(id, entity);
        Ok(id)
    }

    /// Store an entity built around a freshly assigned id
    pub fn add_new(&mut self, build: impl FnOnce(T::Key) -> T) -> T::Key {
        let id = self.next_id();
        self.next += 1;
        self.entries.insert(id, build(id));
        id
    }

    pub fn get(&self, id: T::Key) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: T::Key) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    /// Remove an entity, returning it if it was present
    pub fn remove(&mut self, id: T::Key) -> Option<T> {
        self.entries.remove(&id)
    }

    /// Whether this exact entity (by id) is registered here
    pub fn contains(&self, entity: &T) -> bool {
        self.entries.contains_key(&entity.id())
    }

    pub fn contains_id(&self, id: T::Key) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = T::Key> + '_ {
        self.entries.keys().copied()
    }

    /// Number of live entries
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empty the table and hand back everything it held
    ///
    /// The id counter is kept, so drained ids stay retired.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}
