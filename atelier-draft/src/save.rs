//! Batch save orchestrator
//!
//! Commits the accumulated ledger to the persistence service in one
//! coordinated batch, in a fixed dependency order: parents strictly before
//! children, because a lesson created remotely needs its section's real
//! identifier. Calls run sequentially, never fanned out.
//!
//! ```text
//! snapshot
//!   → delete sections → create sections → update sections
//!   → delete lessons  → create lessons  → update lessons
//!   → commit content
//!   → reconcile local ids → real ids, clear ledger
//! ```
//!
//! Any remote failure aborts the remaining steps and restores the snapshot:
//! all-or-nothing at the local level. Calls that already succeeded are not
//! compensated remotely; the error says so via `partially_applied`.
//!
//! Each invocation is tagged with a request token at start. If a second
//! save starts before the first resolves, the first discards its
//! reconciliation on completion: last-started wins, not last-finished.

use std::collections::HashMap;

use atelier_api::{
    ApiError, CreateLessonRequest, CreateSectionRequest, UpdateContentRequest,
    UpdateLessonRequest, UpdateSectionRequest,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DraftError, Result};
use crate::ids::EntityId;
use crate::ledger::ChangeLedger;
use crate::store::{DraftEvent, DraftState, DraftStore};

/// Outcome of one save invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The dirty flag was clear: no network calls, state untouched.
    Clean,
    /// The batch committed and local identifiers were reconciled.
    Saved(SaveReport),
    /// A later-started save superseded this one; its results were discarded.
    /// The superseding batch carries the full ledger, so nothing is lost.
    Stale,
}

/// What a committed batch did, by operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub sections_created: usize,
    pub sections_updated: usize,
    pub sections_deleted: usize,
    pub lessons_created: usize,
    pub lessons_updated: usize,
    pub lessons_deleted: usize,
    pub content_committed: usize,
}

/// Temp→real identifier map, built fresh during each save.
type IdMap = HashMap<EntityId, String>;

struct CommitResult {
    section_map: IdMap,
    lesson_map: IdMap,
    /// Ledger lesson id → server-assigned content version id.
    content_versions: HashMap<EntityId, String>,
    report: SaveReport,
}

impl DraftStore {
    /// Commit the pending ledger to the persistence service.
    ///
    /// No-op while clean. On success every local identifier in the tree and
    /// content cache is rewritten to its server-assigned counterpart and the
    /// ledger is cleared. On failure local state is restored to the
    /// pre-batch snapshot and the dirty flag stays set for a manual retry.
    pub async fn save(&self) -> Result<SaveOutcome> {
        let token = Uuid::new_v4();
        let (snapshot, ledger, course_id) = {
            let state = self.state.lock();
            if !state.dirty {
                debug!("save requested while clean; nothing to do");
                return Ok(SaveOutcome::Clean);
            }
            // Unresolvable references abort before any network call.
            validate_batch(&state.ledger)?;
            *self.latest_save.lock() = Some(token);
            (state.clone(), state.ledger.clone(), state.course.id.clone())
        };

        info!(%token, course_id = %course_id, "starting batch save");
        match self.commit_batch(&course_id, &ledger).await {
            Ok(result) => {
                let mut state = self.state.lock();
                if *self.latest_save.lock() != Some(token) {
                    info!(%token, "batch superseded; discarding reconciliation");
                    return Ok(SaveOutcome::Stale);
                }
                reconcile(&mut state, &result);
                drop(state);
                self.autosave.cancel();
                let _ = self.events.send(DraftEvent::Saved);
                info!(
                    sections_created = result.report.sections_created,
                    lessons_created = result.report.lessons_created,
                    content_committed = result.report.content_committed,
                    "batch save committed"
                );
                Ok(SaveOutcome::Saved(result.report))
            }
            Err((source, partially_applied)) => {
                {
                    let mut state = self.state.lock();
                    if *self.latest_save.lock() == Some(token) {
                        // Snapshot restore; the snapshot was taken dirty, so
                        // the flag survives for a manual retry.
                        *state = snapshot;
                    } else {
                        // A newer batch owns the state now; leave it alone.
                        warn!(%token, "stale batch failed; skipping rollback");
                    }
                }
                warn!(
                    error = %source,
                    partially_applied,
                    "batch save failed; local state rolled back"
                );
                let _ = self.events.send(DraftEvent::SaveFailed {
                    message: source.to_string(),
                    partially_applied,
                });
                Err(DraftError::Remote { source, partially_applied })
            }
        }
    }

    /// Steps 2–8: the sequential wire conversation.
    ///
    /// The error side carries whether any call had already succeeded, so the
    /// caller can report remote divergence honestly.
    async fn commit_batch(
        &self,
        course_id: &str,
        ledger: &ChangeLedger,
    ) -> std::result::Result<CommitResult, (ApiError, bool)> {
        let mut report = SaveReport::default();
        let mut succeeded = 0usize;
        let mut section_map = IdMap::new();
        let mut lesson_map = IdMap::new();
        let mut content_versions = HashMap::new();

        // Step 2: delete sections. "Record not found" is already-satisfied.
        for id in &ledger.sections.deleted {
            let Some(wire_id) = id.as_remote() else { continue };
            match self.api.delete_section(wire_id).await {
                Ok(existed) => {
                    if !existed {
                        debug!(section_id = %id, "section already absent remotely");
                    }
                    succeeded += 1;
                    report.sections_deleted += 1;
                }
                Err(e) => return Err((e, succeeded > 0)),
            }
        }

        // Step 3: create sections, building the temp→real map.
        let mut created_sections = ledger.sections.created.clone();
        created_sections.sort_by_key(|s| s.order_index);
        for section in &created_sections {
            let input = CreateSectionRequest {
                course_id: course_id.to_string(),
                title: section.title.clone(),
                order_index: section.order_index,
            };
            match self.api.create_section(input).await {
                Ok(record) => {
                    debug!(local_id = %section.id, real_id = %record.id, "section created");
                    section_map.insert(section.id.clone(), record.id);
                    succeeded += 1;
                    report.sections_created += 1;
                }
                Err(e) => return Err((e, succeeded > 0)),
            }
        }

        // Step 4: update sections.
        for section in &ledger.sections.updated {
            let Some(wire_id) = section.id.as_remote() else { continue };
            let input = UpdateSectionRequest {
                title: section.title.clone(),
                order_index: section.order_index,
            };
            match self.api.update_section(wire_id, input).await {
                Ok(()) => {
                    succeeded += 1;
                    report.sections_updated += 1;
                }
                Err(e) => return Err((e, succeeded > 0)),
            }
        }

        // Step 5: delete lessons.
        for id in &ledger.lessons.deleted {
            let Some(wire_id) = id.as_remote() else { continue };
            match self.api.delete_lesson(wire_id).await {
                Ok(existed) => {
                    if !existed {
                        debug!(lesson_id = %id, "lesson already absent remotely");
                    }
                    succeeded += 1;
                    report.lessons_deleted += 1;
                }
                Err(e) => return Err((e, succeeded > 0)),
            }
        }

        // Step 6: create lessons. The parent reference must be the real
        // section id when the section was created in this same batch; a
        // local identifier must never cross the wire.
        let mut created_lessons = ledger.lessons.created.clone();
        created_lessons.sort_by(|a, b| {
            (a.section_id.to_string(), a.order_index)
                .cmp(&(b.section_id.to_string(), b.order_index))
        });
        for lesson in &created_lessons {
            let input = CreateLessonRequest {
                course_id: course_id.to_string(),
                section_id: resolve_wire_id(&lesson.section_id, &section_map),
                title: lesson.title.clone(),
                description: lesson.description.clone(),
                order_index: lesson.order_index,
            };
            match self.api.create_lesson(input).await {
                Ok(record) => {
                    debug!(local_id = %lesson.id, real_id = %record.id, "lesson created");
                    lesson_map.insert(lesson.id.clone(), record.id);
                    succeeded += 1;
                    report.lessons_created += 1;
                }
                Err(e) => return Err((e, succeeded > 0)),
            }
        }

        // Step 7: update lessons, with the same section resolution; a
        // lesson may have moved into a section created in this batch.
        for lesson in &ledger.lessons.updated {
            let Some(wire_id) = lesson.id.as_remote() else { continue };
            let input = UpdateLessonRequest {
                section_id: resolve_wire_id(&lesson.section_id, &section_map),
                title: lesson.title.clone(),
                description: lesson.description.clone(),
                order_index: lesson.order_index,
            };
            match self.api.update_lesson(wire_id, input).await {
                Ok(()) => {
                    succeeded += 1;
                    report.lessons_updated += 1;
                }
                Err(e) => return Err((e, succeeded > 0)),
            }
        }

        // Step 8: commit modified content, resolving lesson ids through the
        // map built in step 6.
        let mut modified: Vec<(&EntityId, &crate::content::LessonContent)> =
            ledger.content_modified.iter().collect();
        modified.sort_by(|a, b| a.0.cmp(b.0));
        for (lesson_id, content) in modified {
            let wire_lesson_id = resolve_wire_id(lesson_id, &lesson_map);
            let version_id = match &content.version_id {
                EntityId::Remote(version) => version.clone(),
                EntityId::Local(_) => {
                    // The lesson was created in this batch; its content
                    // version exists remotely but we have never seen it.
                    match self.api.fetch_lesson_content(&wire_lesson_id).await {
                        Ok(record) => {
                            succeeded += 1;
                            record.version_id
                        }
                        Err(e) => return Err((e, succeeded > 0)),
                    }
                }
            };
            let input = UpdateContentRequest {
                metadata: content.metadata.clone(),
                blocks: Some(content.blocks.clone()),
            };
            match self.api.update_lesson_content(&version_id, input).await {
                Ok(()) => {
                    content_versions.insert(lesson_id.clone(), version_id);
                    succeeded += 1;
                    report.content_committed += 1;
                }
                Err(e) => return Err((e, succeeded > 0)),
            }
        }

        Ok(CommitResult {
            section_map,
            lesson_map,
            content_versions,
            report,
        })
    }
}

/// Resolve an identifier for the wire: a local id goes through the map
/// built earlier in the batch, anything else passes through unchanged.
fn resolve_wire_id(id: &EntityId, map: &IdMap) -> String {
    match id {
        EntityId::Remote(remote) => remote.clone(),
        EntityId::Local(_) => map.get(id).cloned().unwrap_or_else(|| id.to_string()),
    }
}

/// Reject batches with unresolvable parent references before any call.
fn validate_batch(ledger: &ChangeLedger) -> Result<()> {
    for lesson in ledger
        .lessons
        .created
        .iter()
        .chain(ledger.lessons.updated.iter())
    {
        if lesson.section_id.is_local() && !ledger.sections.is_created(&lesson.section_id) {
            return Err(DraftError::validation(format!(
                "lesson {} references section {} which is neither persisted nor queued for creation",
                lesson.id, lesson.section_id
            )));
        }
    }
    Ok(())
}

/// Step 9: rewrite every local identifier to its real counterpart, then
/// clear the ledger and the dirty flag.
fn reconcile(state: &mut DraftState, result: &CommitResult) {
    for (local, real) in &result.section_map {
        state.tree.rewrite_id(local, &EntityId::remote(real.clone()));
    }
    for (local, real) in &result.lesson_map {
        let real = EntityId::remote(real.clone());
        state.tree.rewrite_id(local, &real);
        state.cache.rewrite_id(local, &real);
    }
    for (lesson_id, version) in &result.content_versions {
        let cache_key = match result.lesson_map.get(lesson_id) {
            Some(real) => EntityId::remote(real.clone()),
            None => lesson_id.clone(),
        };
        if let Some(entry) = state.cache.entry_mut(&cache_key) {
            entry.version_id = EntityId::remote(version.clone());
            entry.modified = false;
        }
    }
    state.ledger.clear();
    state.dirty = false;
}
