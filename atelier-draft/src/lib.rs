//! Client-side draft engine for course authoring
//!
//! Lets an author edit a course tree (sections → lessons → content blocks)
//! entirely in local memory (optimistic creates, deletes and reorders)
//! and later commit the accumulated edits to the persistence service in one
//! coordinated batch.
//!
//! # Architecture
//!
//! ```text
//! UI / caller
//!     │  mutation API (synchronous)
//!     ▼
//! ┌─────────────────────────────────────────────┐
//! │ DraftStore                                  │
//! │   DraftTree     normalized sections/lessons │
//! │   ChangeLedger  pending creates/updates/    │
//! │                 deletes + modified content  │
//! │   ContentCache  lazy lesson bodies,         │
//! │                 one active lesson           │
//! │   Autosave      debounce → AutosaveDue      │
//! └──────────────┬──────────────────────────────┘
//!                │ save(): sequential batch, fixed
//!                │ parent-before-child order
//!                ▼
//!       CoursePersistence (atelier-api)
//! ```
//!
//! Entities created locally carry [`EntityId::Local`] identifiers; a
//! successful save reconciles every one of them into the server-assigned
//! [`EntityId::Remote`] form. A failed save restores the pre-batch snapshot
//! and leaves the dirty flag set: all-or-nothing locally, with honest
//! reporting when the remote side had already partially applied.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use atelier_api::{ApiConfig, HttpCoursePersistence};
//! use atelier_draft::{CourseInfo, DraftConfig, DraftStore, DraftTree};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(HttpCoursePersistence::new(ApiConfig::default()));
//! let store = DraftStore::new(
//!     CourseInfo { id: "course-7".into(), title: "Sailing 101".into(), status: "draft".into() },
//!     DraftTree::default(),
//!     api,
//!     DraftConfig::default(),
//! );
//!
//! let section = store.add_section("Getting started");
//! let lesson = store.add_lesson(&section, "Welcome aboard")?;
//! store.select_lesson(&lesson, false).await?;
//!
//! let outcome = store.save().await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod content;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod save;
pub mod store;
pub mod tree;

mod autosave;

#[cfg(test)]
mod testutil;

// Re-export main types
pub use content::{ContentCache, LessonContent};
pub use error::{DraftError, Result};
pub use ids::EntityId;
pub use ledger::{ChangeLedger, EntityChanges};
pub use save::{SaveOutcome, SaveReport};
pub use store::{
    DraftConfig, DraftEvent, DraftStore, LessonPatch, SectionPatch, DEFAULT_LESSON_LAYOUT,
};
pub use tree::{CourseInfo, DraftTree, Lesson, Section};
