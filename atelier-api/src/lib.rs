//! Typed HTTP client for the course persistence service
//!
//! Covers the minimal call contract the draft engine needs: section and
//! lesson CRUD plus lesson content fetch/patch. Response envelopes are
//! normalized (payloads may arrive under a `data` key or bare), and the
//! service's loose "not found" signaling is folded into a structured error.
//!
//! # Example
//!
//! ```rust,no_run
//! use atelier_api::{ApiConfig, CoursePersistence, CreateSectionRequest, HttpCoursePersistence};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpCoursePersistence::new(ApiConfig {
//!     base_url: "https://api.example.com".into(),
//!     ..Default::default()
//! });
//!
//! let section = api
//!     .create_section(CreateSectionRequest {
//!         course_id: "course-7".into(),
//!         title: "Getting started".into(),
//!         order_index: 0,
//!     })
//!     .await?;
//!
//! // Deletes are idempotent: already-gone records answer Ok(false).
//! let existed = api.delete_section(&section.id).await?;
//! # let _ = existed;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod envelope;
pub mod error;
pub mod types;

// Re-export main types
pub use client::{CoursePersistence, HttpCoursePersistence};
pub use envelope::Envelope;
pub use error::{ApiError, Result};
pub use types::*;
