//! # Entity and member identifiers.
//!
//! An [`Entity`] is the unit of ownership: an opaque, comparable
//! `(kind, id)` key. Entities are never created or destroyed by this crate;
//! they come into existence the first time a candidate registers for them and
//! become orphaned (no owner) when the last candidate is removed.
//!
//! A [`MemberId`] names one cluster member. The empty string is never a valid
//! member id — "no owner" is `Option<MemberId>` in every API, and only the
//! store layer translates that into the empty-string register sentinel.
//!
//! ## External paths
//! Callers outside the cluster address entities as `kind/id` strings.
//! [`Entity::parse`] is the decoding half of that codec and [`Display`] the
//! encoding half:
//!
//! ```rust
//! use ownervisor::Entity;
//!
//! let e = Entity::parse("topology/flow:1").unwrap();
//! assert_eq!(e.kind(), "topology");
//! assert_eq!(e.id(), "flow:1");
//! assert_eq!(e.to_string(), "topology/flow:1");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::EntityPathError;

/// The unit of ownership: an opaque `(kind, id)` key.
///
/// Cheap to clone (`Arc<str>` fields); ordered and hashable so it can key
/// both `HashMap`s and `BTreeSet`s.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    kind: Arc<str>,
    id: Arc<str>,
}

impl Entity {
    /// Creates an entity key from its kind and identifier.
    pub fn new(kind: impl Into<Arc<str>>, id: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Entity kind (e.g. `"topology"`).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Entity identifier within its kind.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Decodes an external `kind/id` path into an entity key.
    ///
    /// The first `/` separates kind from id; the id itself may contain
    /// further slashes (structured paths).
    pub fn parse(path: &str) -> Result<Self, EntityPathError> {
        match path.split_once('/') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(EntityPathError {
                path: path.to_string(),
            }),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Identifier of one cluster member.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(Arc<str>);

impl MemberId {
    /// Creates a member id. Callers must not pass an empty string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The member id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
