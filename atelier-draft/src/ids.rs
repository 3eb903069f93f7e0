//! Entity identifiers
//!
//! Every section, lesson and content version is addressed by an [`EntityId`]
//! that is either locally invented (not yet persisted) or server-assigned.
//! Call sites that branch on "is this persisted yet" match on the variant,
//! so the compiler checks the branch instead of a string-prefix test.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a draft entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    /// Invented client-side for an entity the persistence service has never
    /// seen. Safe to discard without a network call; never sent on the wire.
    Local(Uuid),
    /// Assigned by the persistence service upon successful creation.
    Remote(String),
}

impl EntityId {
    /// Mint a fresh local identifier.
    pub fn fresh_local() -> Self {
        EntityId::Local(Uuid::new_v4())
    }

    /// Wrap a server-assigned identifier.
    pub fn remote(id: impl Into<String>) -> Self {
        EntityId::Remote(id.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, EntityId::Local(_))
    }

    /// The wire identifier, if this entity has one.
    pub fn as_remote(&self) -> Option<&str> {
        match self {
            EntityId::Local(_) => None,
            EntityId::Remote(id) => Some(id.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Local(token) => write!(f, "local:{token}"),
            EntityId::Remote(id) => f.write_str(id),
        }
    }
}
