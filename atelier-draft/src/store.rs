//! Draft store: the owned state object and its mutation API
//!
//! All edits to the draft tree go through this store; every mutation
//! synchronously updates the tree, folds an entry into the change ledger,
//! marks the draft dirty and re-arms the autosave debounce. Interested
//! parties observe the store through a broadcast subscription rather than
//! any UI-framework hook.

use std::sync::Arc;
use std::time::Duration;

use atelier_api::{BlockRecord, CoursePersistence};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::autosave::Autosave;
use crate::content::{ContentCache, LessonContent};
use crate::error::{DraftError, Result};
use crate::ids::EntityId;
use crate::ledger::ChangeLedger;
use crate::tree::{CourseInfo, DraftTree, Lesson, Section};

/// Layout assigned to lessons created in the editor before the author picks one.
pub const DEFAULT_LESSON_LAYOUT: &str = "single_column";

/// Store configuration
#[derive(Debug, Clone)]
pub struct DraftConfig {
    /// Debounce window between the last mutation and the autosave trigger.
    pub autosave_delay: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            autosave_delay: Duration::from_secs(60),
            event_capacity: 64,
        }
    }
}

/// Notifications emitted by the store.
#[derive(Debug, Clone)]
pub enum DraftEvent {
    /// The tree, ledger or content cache changed.
    Changed,
    /// The autosave window elapsed; the caller should invoke `save()`.
    AutosaveDue,
    /// A batch committed and reconciled.
    Saved,
    /// A batch failed; local state was rolled back, dirty stays set.
    SaveFailed {
        message: String,
        /// Some calls of the aborted batch had already succeeded remotely.
        partially_applied: bool,
    },
}

/// Field patch for a section. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct SectionPatch {
    pub title: Option<String>,
}

/// Field patch for a lesson. Outer `None` leaves the field untouched; the
/// nested `Option` clears an optional field.
///
/// Only fields the lesson update contract carries are patchable here, plus
/// `layout`, which is a local editing concern mirrored into the cached
/// content body. A lesson's duration and status are hydrated from the
/// service and read-only in the draft.
#[derive(Debug, Clone, Default)]
pub struct LessonPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub layout: Option<String>,
}

/// The complete local editing state: the single shared mutable resource.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DraftState {
    pub course: CourseInfo,
    pub tree: DraftTree,
    pub ledger: ChangeLedger,
    pub cache: ContentCache,
    pub dirty: bool,
}

/// Client-side draft store for one course.
///
/// Mutations are synchronous; only persistence calls (`select_lesson` on a
/// cache miss, `save`) are async. The store is `Send + Sync` and is meant
/// to be shared behind an `Arc`.
pub struct DraftStore {
    pub(crate) state: Mutex<DraftState>,
    pub(crate) api: Arc<dyn CoursePersistence>,
    pub(crate) autosave: Autosave,
    pub(crate) events: broadcast::Sender<DraftEvent>,
    /// Token of the most recently started save; stale batches compare
    /// against it and discard their results.
    pub(crate) latest_save: Mutex<Option<Uuid>>,
}

impl DraftStore {
    /// Create a store over an already-hydrated tree.
    ///
    /// Fetching the course outline is the caller's concern; pass
    /// `DraftTree::default()` for a course with no sections yet.
    pub fn new(
        course: CourseInfo,
        tree: DraftTree,
        api: Arc<dyn CoursePersistence>,
        config: DraftConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            state: Mutex::new(DraftState {
                course,
                tree,
                ledger: ChangeLedger::default(),
                cache: ContentCache::default(),
                dirty: false,
            }),
            api,
            autosave: Autosave::new(config.autosave_delay, events.clone()),
            events,
            latest_save: Mutex::new(None),
        }
    }

    /// Subscribe to store notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<DraftEvent> {
        self.events.subscribe()
    }

    // ==================== Section operations ====================

    /// Create a section at the end of the course. Returns its local id.
    pub fn add_section(&self, title: impl Into<String>) -> EntityId {
        let id = EntityId::fresh_local();
        {
            let mut state = self.state.lock();
            let section = Section {
                id: id.clone(),
                title: title.into(),
                order_index: state.tree.section_count() as i32,
                lesson_ids: Vec::new(),
            };
            state.tree.insert_section(section.clone());
            // insert_section reindexes; record the settled values.
            let settled = state
                .tree
                .section(&id)
                .cloned()
                .unwrap_or(section);
            state.ledger.sections.record_created(settled);
            state.dirty = true;
        }
        debug!(section_id = %id, "section created locally");
        self.after_mutation();
        id
    }

    pub fn update_section(&self, id: &EntityId, patch: SectionPatch) -> Result<()> {
        {
            let mut state = self.state.lock();
            let section = state
                .tree
                .section_mut(id)
                .ok_or_else(|| DraftError::validation(format!("unknown section: {id}")))?;
            if let Some(title) = patch.title {
                section.title = title;
            }
            let updated = section.clone();
            state.ledger.sections.record_updated(updated);
            state.dirty = true;
        }
        self.after_mutation();
        Ok(())
    }

    /// Delete a section and, cascading, all of its lessons.
    ///
    /// Locally-created entities are cancelled out of the ledger; remote ones
    /// are queued for deletion. The tree is updated immediately either way.
    pub fn delete_section(&self, id: &EntityId) -> Result<()> {
        {
            let mut state = self.state.lock();
            let (section, lessons) = state
                .tree
                .remove_section(id)
                .ok_or_else(|| DraftError::validation(format!("unknown section: {id}")))?;
            for lesson in &lessons {
                state.ledger.lessons.record_deleted(&lesson.id);
                state.ledger.forget_lesson_content(&lesson.id);
                state.cache.evict(&lesson.id);
            }
            state.ledger.sections.record_deleted(&section.id);
            state.dirty = true;
        }
        debug!(section_id = %id, "section deleted locally");
        self.after_mutation();
        Ok(())
    }

    /// Replace the section display order. `order` must be a permutation of
    /// the current section ids.
    pub fn reorder_sections(&self, order: &[EntityId]) -> Result<()> {
        {
            let mut state = self.state.lock();
            validate_permutation(order, state.tree.section_ids_in_order())?;
            let before: Vec<(EntityId, i32)> = state
                .tree
                .sections_in_order()
                .iter()
                .map(|s| (s.id.clone(), s.order_index))
                .collect();
            state.tree.set_section_order(order.to_vec());
            for (id, old_index) in before {
                let section = match state.tree.section(&id) {
                    Some(s) => s.clone(),
                    None => continue,
                };
                if section.order_index != old_index {
                    state.ledger.sections.record_updated(section);
                }
            }
            state.dirty = true;
        }
        self.after_mutation();
        Ok(())
    }

    // ==================== Lesson operations ====================

    /// Create a lesson at the end of a section. Returns its local id.
    pub fn add_lesson(&self, section_id: &EntityId, title: impl Into<String>) -> Result<EntityId> {
        let id = EntityId::fresh_local();
        {
            let mut state = self.state.lock();
            let order_index = state
                .tree
                .section(section_id)
                .ok_or_else(|| DraftError::validation(format!("unknown section: {section_id}")))?
                .lesson_ids
                .len() as i32;
            let lesson = Lesson {
                id: id.clone(),
                section_id: section_id.clone(),
                title: title.into(),
                description: None,
                order_index,
                layout: DEFAULT_LESSON_LAYOUT.to_string(),
                duration_minutes: None,
                status: None,
            };
            state.tree.insert_lesson(lesson.clone());
            state.ledger.lessons.record_created(lesson);
            state.dirty = true;
        }
        debug!(lesson_id = %id, section_id = %section_id, "lesson created locally");
        self.after_mutation();
        Ok(id)
    }

    pub fn update_lesson(&self, id: &EntityId, patch: LessonPatch) -> Result<()> {
        {
            let mut state = self.state.lock();
            let lesson = state
                .tree
                .lesson_mut(id)
                .ok_or_else(|| DraftError::validation(format!("unknown lesson: {id}")))?;
            if let Some(title) = patch.title {
                lesson.title = title;
            }
            if let Some(description) = patch.description {
                lesson.description = description;
            }
            let mut layout_changed = None;
            if let Some(layout) = patch.layout {
                if lesson.layout != layout {
                    layout_changed = Some(layout.clone());
                }
                lesson.layout = layout;
            }
            let updated = lesson.clone();
            // The cached content mirrors the lesson's layout tag.
            if let Some(layout) = layout_changed {
                if let Some(content) = state.cache.entry_mut(id) {
                    content.layout = layout;
                }
            }
            state.ledger.lessons.record_updated(updated);
            state.dirty = true;
        }
        self.after_mutation();
        Ok(())
    }

    pub fn delete_lesson(&self, id: &EntityId) -> Result<()> {
        {
            let mut state = self.state.lock();
            let lesson = state
                .tree
                .remove_lesson(id)
                .ok_or_else(|| DraftError::validation(format!("unknown lesson: {id}")))?;
            state.ledger.lessons.record_deleted(&lesson.id);
            state.ledger.forget_lesson_content(&lesson.id);
            state.cache.evict(&lesson.id);
            state.dirty = true;
        }
        debug!(lesson_id = %id, "lesson deleted locally");
        self.after_mutation();
        Ok(())
    }

    /// Replace one section's lesson display order. `order` must be a
    /// permutation of that section's current lesson ids.
    pub fn reorder_lessons(&self, section_id: &EntityId, order: &[EntityId]) -> Result<()> {
        {
            let mut state = self.state.lock();
            let current = state
                .tree
                .section(section_id)
                .ok_or_else(|| DraftError::validation(format!("unknown section: {section_id}")))?
                .lesson_ids
                .clone();
            validate_permutation(order, &current)?;
            let before: Vec<(EntityId, i32)> = state
                .tree
                .lessons_of(section_id)
                .iter()
                .map(|l| (l.id.clone(), l.order_index))
                .collect();
            state.tree.set_lesson_order(section_id, order.to_vec());
            for (id, old_index) in before {
                let lesson = match state.tree.lesson(&id) {
                    Some(l) => l.clone(),
                    None => continue,
                };
                if lesson.order_index != old_index {
                    state.ledger.lessons.record_updated(lesson);
                }
            }
            state.dirty = true;
        }
        self.after_mutation();
        Ok(())
    }

    /// Move a lesson into another section at `position` (clamped to the
    /// target's length). Both scopes are reindexed densely.
    pub fn move_lesson(
        &self,
        lesson_id: &EntityId,
        target_section_id: &EntityId,
        position: usize,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            let source_section_id = state
                .tree
                .lesson(lesson_id)
                .ok_or_else(|| DraftError::validation(format!("unknown lesson: {lesson_id}")))?
                .section_id
                .clone();
            if state.tree.section(target_section_id).is_none() {
                return Err(DraftError::validation(format!(
                    "unknown section: {target_section_id}"
                )));
            }
            let affected: Vec<(EntityId, EntityId, i32)> = state
                .tree
                .lessons_of(&source_section_id)
                .iter()
                .chain(state.tree.lessons_of(target_section_id).iter())
                .map(|l| (l.id.clone(), l.section_id.clone(), l.order_index))
                .collect();
            state.tree.move_lesson(lesson_id, target_section_id, position);
            for (id, old_section, old_index) in affected {
                let lesson = match state.tree.lesson(&id) {
                    Some(l) => l.clone(),
                    None => continue,
                };
                if lesson.section_id != old_section || lesson.order_index != old_index {
                    state.ledger.lessons.record_updated(lesson);
                }
            }
            state.dirty = true;
        }
        self.after_mutation();
        Ok(())
    }

    // ==================== Content operations ====================

    /// Make a lesson active, lazily loading its content.
    ///
    /// Cached content is reused unless `force_refresh` is set. A local
    /// lesson gets a synthesized empty shell, since it can have no remote
    /// content yet. Only a cache miss reaches the persistence service.
    pub async fn select_lesson(
        &self,
        id: &EntityId,
        force_refresh: bool,
    ) -> Result<LessonContent> {
        let remote_id = {
            let mut state = self.state.lock();
            let lesson = state
                .tree
                .lesson(id)
                .ok_or_else(|| DraftError::validation(format!("unknown lesson: {id}")))?
                .clone();

            if state.cache.contains(id) && !force_refresh {
                state.cache.set_active(id.clone());
                return Ok(state.cache.get(id).cloned().unwrap_or_else(|| {
                    LessonContent::empty_shell(&lesson.layout)
                }));
            }

            match &lesson.id {
                EntityId::Local(_) => {
                    // Never fetched, never fetchable: synthesize. A cached
                    // shell is reused even under force_refresh, since there
                    // is no remote copy to refresh from.
                    if !state.cache.contains(id) {
                        state
                            .cache
                            .insert(id.clone(), LessonContent::empty_shell(&lesson.layout));
                    }
                    state.cache.set_active(id.clone());
                    let content = state
                        .cache
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| LessonContent::empty_shell(&lesson.layout));
                    return Ok(content);
                }
                EntityId::Remote(remote) => remote.clone(),
            }
        };

        debug!(lesson_id = %id, force_refresh, "fetching lesson content");
        let record = self
            .api
            .fetch_lesson_content(&remote_id)
            .await
            .map_err(DraftError::remote)?;

        let content = LessonContent::from_record(record);
        let mut state = self.state.lock();
        // The lesson may have been deleted while the fetch was in flight;
        // its cache entry was already evicted and must not be resurrected.
        if state.tree.lesson(id).is_none() {
            return Err(DraftError::validation(format!("unknown lesson: {id}")));
        }
        state.cache.insert(id.clone(), content.clone());
        state.cache.set_active(id.clone());
        Ok(content)
    }

    /// Replace the active lesson's block list.
    pub fn update_blocks(&self, blocks: Vec<BlockRecord>) -> Result<()> {
        {
            let mut state = self.state.lock();
            let (active_id, content) = state
                .cache
                .active_content_mut()
                .ok_or_else(|| DraftError::validation("no active lesson"))?;
            content.blocks = blocks;
            content.modified = true;
            let snapshot = content.clone();
            state.ledger.content_modified.insert(active_id, snapshot);
            state.dirty = true;
        }
        self.after_mutation();
        Ok(())
    }

    /// Set one metadata entry on the active lesson's content.
    pub fn update_content_metadata(&self, key: impl Into<String>, value: JsonValue) -> Result<()> {
        {
            let mut state = self.state.lock();
            let (active_id, content) = state
                .cache
                .active_content_mut()
                .ok_or_else(|| DraftError::validation("no active lesson"))?;
            content.metadata.insert(key.into(), value);
            content.modified = true;
            let snapshot = content.clone();
            state.ledger.content_modified.insert(active_id, snapshot);
            state.dirty = true;
        }
        self.after_mutation();
        Ok(())
    }

    // ==================== Reads ====================

    pub fn course(&self) -> CourseInfo {
        self.state.lock().course.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Sections in display order.
    pub fn sections(&self) -> Vec<Section> {
        self.state
            .lock()
            .tree
            .sections_in_order()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn lesson(&self, id: &EntityId) -> Option<Lesson> {
        self.state.lock().tree.lesson(id).cloned()
    }

    /// Lessons of one section in display order.
    pub fn lessons_of(&self, section_id: &EntityId) -> Vec<Lesson> {
        self.state
            .lock()
            .tree
            .lessons_of(section_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn active_lesson(&self) -> Option<EntityId> {
        self.state.lock().cache.active_lesson().cloned()
    }

    pub fn cached_content(&self, lesson_id: &EntityId) -> Option<LessonContent> {
        self.state.lock().cache.get(lesson_id).cloned()
    }

    /// The not-yet-committed change set.
    pub fn pending_changes(&self) -> ChangeLedger {
        self.state.lock().ledger.clone()
    }

    #[cfg(test)]
    pub(crate) fn state_snapshot(&self) -> DraftState {
        self.state.lock().clone()
    }

    fn after_mutation(&self) {
        self.autosave.rearm();
        let _ = self.events.send(DraftEvent::Changed);
    }
}

/// `order` must contain exactly the ids of `current`, each once.
fn validate_permutation(order: &[EntityId], current: &[EntityId]) -> Result<()> {
    if order.len() != current.len() {
        return Err(DraftError::validation(format!(
            "reorder set has {} ids, scope has {}",
            order.len(),
            current.len()
        )));
    }
    for id in order {
        if !current.contains(id) {
            return Err(DraftError::validation(format!(
                "reorder set contains foreign id: {id}"
            )));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for id in order {
        if !seen.insert(id) {
            return Err(DraftError::validation(format!("duplicate id in reorder set: {id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockApi;

    fn store_with(api: Arc<MockApi>) -> DraftStore {
        DraftStore::new(
            CourseInfo {
                id: "course-1".into(),
                title: "Rust for sailors".into(),
                status: "draft".into(),
            },
            DraftTree::default(),
            api,
            DraftConfig::default(),
        )
    }

    fn remote_store_with(api: Arc<MockApi>) -> DraftStore {
        use atelier_api::{LessonRecord, SectionRecord};
        let tree = DraftTree::from_records(
            vec![SectionRecord {
                id: "s1".into(),
                course_id: "course-1".into(),
                title: "Basics".into(),
                order_index: 0,
            }],
            vec![LessonRecord {
                id: "l1".into(),
                section_id: "s1".into(),
                title: "Knots".into(),
                description: None,
                order_index: 0,
                layout: None,
                duration_minutes: None,
                status: None,
            }],
        );
        DraftStore::new(
            CourseInfo {
                id: "course-1".into(),
                title: "Rust for sailors".into(),
                status: "draft".into(),
            },
            tree,
            api,
            DraftConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_add_section_marks_dirty_and_ledgers_create() {
        let store = store_with(MockApi::arc());
        assert!(!store.is_dirty());

        let id = store.add_section("Intro");
        assert!(id.is_local());
        assert!(store.is_dirty());

        let pending = store.pending_changes();
        assert_eq!(pending.sections.created.len(), 1);
        assert_eq!(pending.sections.created[0].title, "Intro");
    }

    #[tokio::test]
    async fn test_update_of_local_section_folds_into_created() {
        let store = store_with(MockApi::arc());
        let id = store.add_section("Intro");
        store
            .update_section(&id, SectionPatch { title: Some("Welcome".into()) })
            .unwrap();

        let pending = store.pending_changes();
        assert_eq!(pending.sections.created.len(), 1);
        assert_eq!(pending.sections.created[0].title, "Welcome");
        assert!(pending.sections.updated.is_empty());
    }

    #[tokio::test]
    async fn test_add_then_delete_local_lesson_leaves_no_trace() {
        let store = remote_store_with(MockApi::arc());
        let section = EntityId::remote("s1");
        let lesson = store.add_lesson(&section, "Splices").unwrap();
        store.delete_lesson(&lesson).unwrap();

        let pending = store.pending_changes();
        assert!(pending.lessons.is_empty());
        assert!(store.lesson(&lesson).is_none());
    }

    #[tokio::test]
    async fn test_delete_remote_lesson_queues_delete_and_purges_update() {
        let store = remote_store_with(MockApi::arc());
        let lesson = EntityId::remote("l1");
        store
            .update_lesson(&lesson, LessonPatch { title: Some("Hitches".into()), ..Default::default() })
            .unwrap();
        store.delete_lesson(&lesson).unwrap();

        let pending = store.pending_changes();
        assert!(pending.lessons.updated.is_empty());
        assert_eq!(pending.lessons.deleted, vec![lesson]);
    }

    #[tokio::test]
    async fn test_delete_local_section_cascades_without_delete_entries() {
        let store = store_with(MockApi::arc());
        let section = store.add_section("Scrap");
        let lesson = store.add_lesson(&section, "Draft lesson").unwrap();
        store.delete_section(&section).unwrap();

        let pending = store.pending_changes();
        assert!(pending.is_empty());
        assert!(store.lesson(&lesson).is_none());
        assert!(store.sections().is_empty());
    }

    #[tokio::test]
    async fn test_add_lesson_to_unknown_section_is_validation_error() {
        let store = store_with(MockApi::arc());
        let err = store.add_lesson(&EntityId::remote("ghost"), "Lost").unwrap_err();
        assert!(matches!(err, DraftError::Validation(_)));
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_reorder_sections_rejects_foreign_and_short_sets() {
        let store = store_with(MockApi::arc());
        let a = store.add_section("A");
        let _b = store.add_section("B");

        let err = store.reorder_sections(&[a.clone()]).unwrap_err();
        assert!(matches!(err, DraftError::Validation(_)));

        let err = store
            .reorder_sections(&[a, EntityId::remote("ghost")])
            .unwrap_err();
        assert!(matches!(err, DraftError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reorder_sections_reindexes_and_ledgers_remote_moves() {
        let api = MockApi::arc();
        let store = remote_store_with(api);
        let local = store.add_section("New last");
        let s1 = EntityId::remote("s1");

        store.reorder_sections(&[local.clone(), s1.clone()]).unwrap();

        let sections = store.sections();
        assert_eq!(sections[0].id, local);
        assert_eq!(sections[0].order_index, 0);
        assert_eq!(sections[1].id, s1);
        assert_eq!(sections[1].order_index, 1);

        let pending = store.pending_changes();
        // The remote section moved, so it is queued for update; the local
        // one only refreshes its created entry.
        assert_eq!(pending.sections.updated.len(), 1);
        assert_eq!(pending.sections.updated[0].id, EntityId::remote("s1"));
        assert_eq!(pending.sections.created.len(), 1);
        assert_eq!(pending.sections.created[0].order_index, 0);
    }

    #[tokio::test]
    async fn test_select_local_lesson_synthesizes_shell_without_fetch() {
        let api = MockApi::arc();
        let store = remote_store_with(api.clone());
        let lesson = store.add_lesson(&EntityId::remote("s1"), "Draft").unwrap();

        let content = store.select_lesson(&lesson, false).await.unwrap();
        assert!(content.version_id.is_local());
        assert!(content.blocks.is_empty());
        assert_eq!(store.active_lesson(), Some(lesson));
        assert!(api.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_select_remote_lesson_fetches_once() {
        let api = MockApi::arc();
        let store = remote_store_with(api.clone());
        let lesson = EntityId::remote("l1");

        store.select_lesson(&lesson, false).await.unwrap();
        store.select_lesson(&lesson, false).await.unwrap();

        let fetches = api
            .calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("fetch_lesson_content"))
            .count();
        assert_eq!(fetches, 1);
        assert_eq!(store.active_lesson(), Some(lesson));
    }

    #[tokio::test]
    async fn test_force_refresh_refetches() {
        let api = MockApi::arc();
        let store = remote_store_with(api.clone());
        let lesson = EntityId::remote("l1");

        store.select_lesson(&lesson, false).await.unwrap();
        store.select_lesson(&lesson, true).await.unwrap();

        let fetches = api
            .calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("fetch_lesson_content"))
            .count();
        assert_eq!(fetches, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delete_during_fetch_does_not_resurrect_cache_entry() {
        let api = MockApi::arc();
        let store = Arc::new(remote_store_with(api.clone()));
        let lesson = EntityId::remote("l1");

        // Stall the content fetch mid-flight.
        let release = api.gate_fetch_content();
        let store_bg = store.clone();
        let fetched = {
            let lesson = lesson.clone();
            tokio::spawn(async move { store_bg.select_lesson(&lesson, false).await })
        };
        while api
            .calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("fetch_lesson_content"))
            .count()
            == 0
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        store.delete_lesson(&lesson).unwrap();
        release.send(()).unwrap();

        // The late-arriving record is dropped, not cached or activated.
        let err = fetched.await.unwrap().unwrap_err();
        assert!(matches!(err, DraftError::Validation(_)));
        assert!(store.cached_content(&lesson).is_none());
        assert!(store.active_lesson().is_none());
        assert!(store.lesson(&lesson).is_none());
    }

    #[tokio::test]
    async fn test_update_blocks_requires_active_lesson() {
        let store = remote_store_with(MockApi::arc());
        let err = store.update_blocks(Vec::new()).unwrap_err();
        assert!(matches!(err, DraftError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_blocks_mirrors_into_ledger() {
        let api = MockApi::arc();
        let store = remote_store_with(api);
        let lesson = EntityId::remote("l1");
        store.select_lesson(&lesson, false).await.unwrap();

        let block = BlockRecord {
            id: "b1".into(),
            slot_id: "main".into(),
            block_type: "rich_text".into(),
            order_index: 0,
            content: serde_json::json!({"text": "Ahoy"}),
            settings: serde_json::Value::Null,
        };
        store.update_blocks(vec![block.clone()]).unwrap();

        let cached = store.cached_content(&lesson).unwrap();
        assert!(cached.modified);
        assert_eq!(cached.blocks, vec![block]);

        let pending = store.pending_changes();
        assert!(pending.content_modified.contains_key(&lesson));
        assert!(store.is_dirty());
    }

    #[tokio::test]
    async fn test_layout_change_mirrors_into_cached_content() {
        let api = MockApi::arc();
        let store = remote_store_with(api);
        let lesson = EntityId::remote("l1");
        store.select_lesson(&lesson, false).await.unwrap();

        store
            .update_lesson(
                &lesson,
                LessonPatch { layout: Some("two_column".into()), ..Default::default() },
            )
            .unwrap();

        assert_eq!(store.cached_content(&lesson).unwrap().layout, "two_column");
    }

    #[tokio::test]
    async fn test_reorder_lessons_reindexes_densely() {
        let api = MockApi::arc();
        let store = remote_store_with(api);
        let s1 = EntityId::remote("s1");
        let l1 = EntityId::remote("l1");
        let l2 = store.add_lesson(&s1, "Second").unwrap();

        store.reorder_lessons(&s1, &[l2.clone(), l1.clone()]).unwrap();

        let lessons = store.lessons_of(&s1);
        assert_eq!(lessons[0].id, l2);
        assert_eq!(lessons[0].order_index, 0);
        assert_eq!(lessons[1].id, l1);
        assert_eq!(lessons[1].order_index, 1);

        let pending = store.pending_changes();
        assert_eq!(pending.lessons.updated.len(), 1);
        assert_eq!(pending.lessons.updated[0].id, l1);

        let err = store
            .reorder_lessons(&s1, &[l1.clone(), l1])
            .unwrap_err();
        assert!(matches!(err, DraftError::Validation(_)));
    }

    #[tokio::test]
    async fn test_move_lesson_across_sections_updates_ledger() {
        let api = MockApi::arc();
        let store = remote_store_with(api);
        let target = store.add_section("Advanced");
        let lesson = EntityId::remote("l1");

        store.move_lesson(&lesson, &target, 0).unwrap();

        let moved = store.lesson(&lesson).unwrap();
        assert_eq!(moved.section_id, target);
        let pending = store.pending_changes();
        assert_eq!(pending.lessons.updated.len(), 1);
        assert_eq!(pending.lessons.updated[0].section_id, target);
    }
}
