//! Pending change ledger
//!
//! Records every create/update/delete not yet committed, partitioned by
//! entity kind. The ledger is the single source of truth for "pending"
//! state: an entity is locally-created iff it sits in a `created` bucket.
//!
//! Merge rules (write deduplication, last write wins, same discipline as
//! a write buffer batching by key):
//! - editing a locally-created entity refreshes its `created` entry, it is
//!   never duplicated into `updated`;
//! - editing a remote entity upserts into `updated` by id;
//! - deleting a locally-created entity cancels its `created` entry, nothing
//!   reaches `deleted` (there is nothing remote to delete);
//! - deleting a remote entity purges any pending `updated` entry and
//!   appends its id to `deleted`.

use std::collections::HashMap;

use crate::content::LessonContent;
use crate::ids::EntityId;
use crate::tree::{Lesson, Section};

/// Anything the ledger can bucket.
pub(crate) trait LedgerEntity {
    fn entity_id(&self) -> &EntityId;
}

impl LedgerEntity for Section {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }
}

impl LedgerEntity for Lesson {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }
}

/// Pending changes for one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChanges<T> {
    /// Locally-created entities, carrying their latest field values.
    pub created: Vec<T>,
    /// Modified remote entities, deduplicated by id, last patch wins.
    pub updated: Vec<T>,
    /// Remote identifiers awaiting a delete call.
    pub deleted: Vec<EntityId>,
}

// Manual impl: `#[derive(Default)]` would needlessly bound `T: Default`.
impl<T> Default for EntityChanges<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

impl<T: LedgerEntity + Clone> EntityChanges<T> {
    pub(crate) fn record_created(&mut self, entity: T) {
        self.created.push(entity);
    }

    /// Fold an edit into the ledger under the merge rules.
    pub(crate) fn record_updated(&mut self, entity: T) {
        let id = entity.entity_id().clone();
        if id.is_local() {
            if let Some(slot) = self.created.iter_mut().find(|e| *e.entity_id() == id) {
                *slot = entity;
            } else {
                // A local entity outside `created` means the ledger was
                // cleared underneath it; re-registering keeps it saveable.
                self.created.push(entity);
            }
            return;
        }
        if let Some(slot) = self.updated.iter_mut().find(|e| *e.entity_id() == id) {
            *slot = entity;
        } else {
            self.updated.push(entity);
        }
    }

    /// Fold a deletion into the ledger under the local-vs-remote rule.
    pub(crate) fn record_deleted(&mut self, id: &EntityId) {
        if id.is_local() {
            self.created.retain(|e| e.entity_id() != id);
            return;
        }
        self.updated.retain(|e| e.entity_id() != id);
        if !self.deleted.contains(id) {
            self.deleted.push(id.clone());
        }
    }

    pub(crate) fn is_created(&self, id: &EntityId) -> bool {
        self.created.iter().any(|e| e.entity_id() == id)
    }
}

impl<T> EntityChanges<T> {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    fn clear(&mut self) {
        self.created.clear();
        self.updated.clear();
        self.deleted.clear();
    }
}

/// The full pending ledger: sections, lessons, modified lesson content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLedger {
    pub sections: EntityChanges<Section>,
    pub lessons: EntityChanges<Lesson>,
    /// Lesson id → latest modified content body.
    pub content_modified: HashMap<EntityId, LessonContent>,
}

impl ChangeLedger {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.lessons.is_empty() && self.content_modified.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.sections.clear();
        self.lessons.clear();
        self.content_modified.clear();
    }

    /// Drop every trace of a lesson that no longer exists locally.
    pub(crate) fn forget_lesson_content(&mut self, lesson_id: &EntityId) {
        self.content_modified.remove(lesson_id);
    }
}
