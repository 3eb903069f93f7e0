//! Wire types for the course persistence service

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL for the persistence service HTTP API
    pub base_url: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Section record as stored by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRecord {
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub order_index: i32,
}

/// Input for creating a section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSectionRequest {
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub order_index: i32,
}

/// Input for updating a section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSectionRequest {
    pub title: String,
    #[serde(default)]
    pub order_index: i32,
}

// ============================================================================
// Lessons
// ============================================================================

/// Lesson record as stored by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: String,
    pub section_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Input for creating a lesson
///
/// `section_id` must already be a server-assigned identifier; resolving
/// locally-invented parent identifiers is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLessonRequest {
    pub course_id: String,
    pub section_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: i32,
}

/// Input for updating a lesson
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLessonRequest {
    pub section_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: i32,
}

// ============================================================================
// Lesson content
// ============================================================================

/// A content block within a lesson layout slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockRecord {
    pub id: String,
    pub slot_id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub order_index: i32,
    /// Opaque block content payload
    #[serde(default)]
    pub content: JsonValue,
    /// Opaque block settings payload
    #[serde(default)]
    pub settings: JsonValue,
}

/// Editable lesson body: layout, blocks, metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub version_id: String,
    pub layout: String,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, JsonValue>,
}

/// Input for patching lesson content by version id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateContentRequest {
    #[serde(default)]
    pub metadata: serde_json::Map<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lesson_omits_absent_description() {
        let input = CreateLessonRequest {
            course_id: "c1".into(),
            section_id: "42".into(),
            title: "Intro".into(),
            description: None,
            order_index: 0,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("description").is_none());
        assert_eq!(json["section_id"], "42");
    }

    #[test]
    fn test_block_type_wire_name() {
        let json = r#"{"id": "b1", "slot_id": "main", "type": "rich_text"}"#;
        let block: BlockRecord = serde_json::from_str(json).unwrap();
        assert_eq!(block.block_type, "rich_text");
        assert!(block.content.is_null());
    }
}
