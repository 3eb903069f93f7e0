//! Normalized draft tree
//!
//! Sections and lessons live in flat maps keyed by [`EntityId`]; ordering is
//! carried by the section id list and each section's lesson id list, with
//! dense zero-based order indices per scope. Parent→children lookup is O(1).

use std::collections::HashMap;

use atelier_api::{LessonRecord, SectionRecord};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Read-mostly context for the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub id: String,
    pub title: String,
    pub status: String,
}

/// A course section: an ordered grouping of lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: EntityId,
    pub title: String,
    /// Dense, zero-based, unique within the course.
    pub order_index: i32,
    /// Child lessons in display order.
    pub lesson_ids: Vec<EntityId>,
}

/// A lesson within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: EntityId,
    pub section_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    /// Dense, zero-based within the owning section.
    pub order_index: i32,
    pub layout: String,
    pub duration_minutes: Option<u32>,
    pub status: Option<String>,
}

/// Normalized tree of one course's sections and lessons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftTree {
    sections: HashMap<EntityId, Section>,
    lessons: HashMap<EntityId, Lesson>,
    section_order: Vec<EntityId>,
}

impl DraftTree {
    /// Build a normalized tree from persistence records.
    ///
    /// Records arrive in arbitrary order; scopes are sorted by their stored
    /// order index and reindexed to the dense zero-based invariant.
    pub fn from_records(sections: Vec<SectionRecord>, lessons: Vec<LessonRecord>) -> Self {
        let mut tree = DraftTree::default();

        let mut sections = sections;
        sections.sort_by_key(|s| s.order_index);
        for record in sections {
            let id = EntityId::remote(record.id);
            tree.section_order.push(id.clone());
            tree.sections.insert(
                id.clone(),
                Section {
                    id,
                    title: record.title,
                    order_index: 0,
                    lesson_ids: Vec::new(),
                },
            );
        }

        let mut lessons = lessons;
        lessons.sort_by_key(|l| l.order_index);
        for record in lessons {
            let section_id = EntityId::remote(record.section_id);
            let Some(section) = tree.sections.get_mut(&section_id) else {
                // Orphaned lesson record; the invariant requires a present
                // parent, so it is dropped at hydration.
                continue;
            };
            let id = EntityId::remote(record.id);
            section.lesson_ids.push(id.clone());
            tree.lessons.insert(
                id.clone(),
                Lesson {
                    id,
                    section_id,
                    title: record.title,
                    description: record.description,
                    order_index: 0,
                    layout: record.layout.unwrap_or_else(|| "single_column".to_string()),
                    duration_minutes: record.duration_minutes,
                    status: record.status,
                },
            );
        }

        tree.reindex_sections();
        let section_ids: Vec<EntityId> = tree.section_order.clone();
        for id in section_ids {
            tree.reindex_lessons(&id);
        }
        tree
    }

    // ==================== Lookup ====================

    pub fn section(&self, id: &EntityId) -> Option<&Section> {
        self.sections.get(id)
    }

    pub fn lesson(&self, id: &EntityId) -> Option<&Lesson> {
        self.lessons.get(id)
    }

    pub(crate) fn section_mut(&mut self, id: &EntityId) -> Option<&mut Section> {
        self.sections.get_mut(id)
    }

    pub(crate) fn lesson_mut(&mut self, id: &EntityId) -> Option<&mut Lesson> {
        self.lessons.get_mut(id)
    }

    /// Sections in display order.
    pub fn sections_in_order(&self) -> Vec<&Section> {
        self.section_order
            .iter()
            .filter_map(|id| self.sections.get(id))
            .collect()
    }

    /// Lessons of one section in display order.
    pub fn lessons_of(&self, section_id: &EntityId) -> Vec<&Lesson> {
        self.sections
            .get(section_id)
            .map(|section| {
                section
                    .lesson_ids
                    .iter()
                    .filter_map(|id| self.lessons.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }

    pub(crate) fn section_ids_in_order(&self) -> &[EntityId] {
        &self.section_order
    }

    // ==================== Mutation ====================

    pub(crate) fn insert_section(&mut self, section: Section) {
        self.section_order.push(section.id.clone());
        self.sections.insert(section.id.clone(), section);
        self.reindex_sections();
    }

    /// Remove a section and all of its lessons.
    ///
    /// Returns the removed section and its lessons so the caller can apply
    /// the local-vs-remote ledger rule to each.
    pub(crate) fn remove_section(&mut self, id: &EntityId) -> Option<(Section, Vec<Lesson>)> {
        let section = self.sections.remove(id)?;
        self.section_order.retain(|s| s != id);
        let removed_lessons = section
            .lesson_ids
            .iter()
            .filter_map(|lesson_id| self.lessons.remove(lesson_id))
            .collect();
        self.reindex_sections();
        Some((section, removed_lessons))
    }

    /// Replace the section display order. Caller validates the id set.
    pub(crate) fn set_section_order(&mut self, order: Vec<EntityId>) {
        self.section_order = order;
        self.reindex_sections();
    }

    pub(crate) fn insert_lesson(&mut self, lesson: Lesson) -> bool {
        let Some(section) = self.sections.get_mut(&lesson.section_id) else {
            return false;
        };
        section.lesson_ids.push(lesson.id.clone());
        let section_id = lesson.section_id.clone();
        self.lessons.insert(lesson.id.clone(), lesson);
        self.reindex_lessons(&section_id);
        true
    }

    pub(crate) fn remove_lesson(&mut self, id: &EntityId) -> Option<Lesson> {
        let lesson = self.lessons.remove(id)?;
        if let Some(section) = self.sections.get_mut(&lesson.section_id) {
            section.lesson_ids.retain(|l| l != id);
        }
        self.reindex_lessons(&lesson.section_id.clone());
        Some(lesson)
    }

    /// Replace one section's lesson display order. Caller validates the id set.
    pub(crate) fn set_lesson_order(&mut self, section_id: &EntityId, order: Vec<EntityId>) {
        if let Some(section) = self.sections.get_mut(section_id) {
            section.lesson_ids = order;
        }
        self.reindex_lessons(section_id);
    }

    /// Move a lesson into another section at the given position (clamped).
    pub(crate) fn move_lesson(
        &mut self,
        lesson_id: &EntityId,
        target_section_id: &EntityId,
        position: usize,
    ) -> bool {
        if !self.sections.contains_key(target_section_id) {
            return false;
        }
        let Some(lesson) = self.lessons.get(lesson_id) else {
            return false;
        };
        let source_section_id = lesson.section_id.clone();
        if let Some(source) = self.sections.get_mut(&source_section_id) {
            source.lesson_ids.retain(|l| l != lesson_id);
        }
        let Some(target) = self.sections.get_mut(target_section_id) else {
            return false;
        };
        let position = position.min(target.lesson_ids.len());
        target.lesson_ids.insert(position, lesson_id.clone());
        if let Some(lesson) = self.lessons.get_mut(lesson_id) {
            lesson.section_id = target_section_id.clone();
        }
        self.reindex_lessons(&source_section_id);
        self.reindex_lessons(target_section_id);
        true
    }

    // ==================== Reindexing ====================

    fn reindex_sections(&mut self) {
        for (index, id) in self.section_order.iter().enumerate() {
            if let Some(section) = self.sections.get_mut(id) {
                section.order_index = index as i32;
            }
        }
    }

    fn reindex_lessons(&mut self, section_id: &EntityId) {
        let Some(section) = self.sections.get(section_id) else {
            return;
        };
        let ids = section.lesson_ids.clone();
        for (index, id) in ids.iter().enumerate() {
            if let Some(lesson) = self.lessons.get_mut(id) {
                lesson.order_index = index as i32;
            }
        }
    }

    // ==================== Reconciliation ====================

    /// Rewrite every occurrence of `from` with `to`.
    ///
    /// Covers map keys, the section order list, each section's lesson list,
    /// and lessons' owning-section references.
    pub(crate) fn rewrite_id(&mut self, from: &EntityId, to: &EntityId) {
        if let Some(mut section) = self.sections.remove(from) {
            section.id = to.clone();
            for slot in self.section_order.iter_mut() {
                if slot == from {
                    *slot = to.clone();
                }
            }
            for lesson_id in &section.lesson_ids {
                if let Some(lesson) = self.lessons.get_mut(lesson_id) {
                    lesson.section_id = to.clone();
                }
            }
            self.sections.insert(to.clone(), section);
        } else if let Some(mut lesson) = self.lessons.remove(from) {
            lesson.id = to.clone();
            if let Some(section) = self.sections.get_mut(&lesson.section_id) {
                for slot in section.lesson_ids.iter_mut() {
                    if slot == from {
                        *slot = to.clone();
                    }
                }
            }
            self.lessons.insert(to.clone(), lesson);
        }
    }

    /// Any identifier in the tree still local?
    pub fn has_local_ids(&self) -> bool {
        self.sections.keys().any(EntityId::is_local) || self.lessons.keys().any(EntityId::is_local)
    }
}
