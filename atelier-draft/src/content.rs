//! Lazy lesson content cache
//!
//! The editable body of a lesson (layout + blocks + metadata) is fetched
//! only when that lesson becomes active, then memoized: at most one entry
//! per lesson id, exactly one lesson active at a time. Local lessons get a
//! synthesized empty shell instead of a fetch, since they can have no remote
//! content yet.

use std::collections::HashMap;

use atelier_api::{BlockRecord, ContentRecord};
use serde_json::Value as JsonValue;

use crate::ids::EntityId;

/// Cached editable body of one lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonContent {
    /// Content version identifier; local until the first commit learns the
    /// server-assigned one.
    pub version_id: EntityId,
    /// Mirrors the owning lesson's layout tag.
    pub layout: String,
    pub blocks: Vec<BlockRecord>,
    pub metadata: serde_json::Map<String, JsonValue>,
    /// Set on edit, cleared when content is committed.
    pub modified: bool,
}

impl LessonContent {
    pub(crate) fn from_record(record: ContentRecord) -> Self {
        Self {
            version_id: EntityId::remote(record.version_id),
            layout: record.layout,
            blocks: record.blocks,
            metadata: record.metadata,
            modified: false,
        }
    }

    /// Empty shell for a lesson the service has never seen.
    pub(crate) fn empty_shell(layout: &str) -> Self {
        Self {
            version_id: EntityId::fresh_local(),
            layout: layout.to_string(),
            blocks: Vec::new(),
            metadata: serde_json::Map::new(),
            modified: false,
        }
    }
}

/// Memoized lesson bodies plus the active-lesson pointer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentCache {
    entries: HashMap<EntityId, LessonContent>,
    active: Option<EntityId>,
}

impl ContentCache {
    pub fn get(&self, lesson_id: &EntityId) -> Option<&LessonContent> {
        self.entries.get(lesson_id)
    }

    pub fn contains(&self, lesson_id: &EntityId) -> bool {
        self.entries.contains_key(lesson_id)
    }

    pub fn active_lesson(&self) -> Option<&EntityId> {
        self.active.as_ref()
    }

    /// The active lesson's content, mutable. Only this entry may be edited.
    pub(crate) fn active_content_mut(&mut self) -> Option<(EntityId, &mut LessonContent)> {
        let active = self.active.clone()?;
        let content = self.entries.get_mut(&active)?;
        Some((active, content))
    }

    pub(crate) fn insert(&mut self, lesson_id: EntityId, content: LessonContent) {
        self.entries.insert(lesson_id, content);
    }

    pub(crate) fn set_active(&mut self, lesson_id: EntityId) {
        self.active = Some(lesson_id);
    }

    /// Evict a deleted lesson; clears the active pointer if it pointed there.
    pub(crate) fn evict(&mut self, lesson_id: &EntityId) {
        self.entries.remove(lesson_id);
        if self.active.as_ref() == Some(lesson_id) {
            self.active = None;
        }
    }

    /// Rewrite a reconciled lesson id in keys and the active pointer.
    pub(crate) fn rewrite_id(&mut self, from: &EntityId, to: &EntityId) {
        if let Some(content) = self.entries.remove(from) {
            self.entries.insert(to.clone(), content);
        }
        if self.active.as_ref() == Some(from) {
            self.active = Some(to.clone());
        }
    }

    pub(crate) fn entry_mut(&mut self, lesson_id: &EntityId) -> Option<&mut LessonContent> {
        self.entries.get_mut(lesson_id)
    }

    /// Any cache key still local?
    pub fn has_local_ids(&self) -> bool {
        self.entries.keys().any(EntityId::is_local)
    }
}
