//! HTTP client for the course persistence service

use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;

use crate::envelope::{decode_body, decode_empty};
use crate::error::Result;
use crate::types::*;

/// Call contract the draft engine commits batches against.
///
/// Deletes return `Ok(false)` when the record was already gone; the engine
/// treats that as satisfied rather than as a failure.
#[async_trait]
pub trait CoursePersistence: Send + Sync {
    async fn create_section(&self, input: CreateSectionRequest) -> Result<SectionRecord>;
    async fn update_section(&self, id: &str, input: UpdateSectionRequest) -> Result<()>;
    async fn delete_section(&self, id: &str) -> Result<bool>;

    async fn create_lesson(&self, input: CreateLessonRequest) -> Result<LessonRecord>;
    async fn update_lesson(&self, id: &str, input: UpdateLessonRequest) -> Result<()>;
    async fn delete_lesson(&self, id: &str) -> Result<bool>;

    async fn fetch_lesson_content(&self, lesson_id: &str) -> Result<ContentRecord>;
    async fn update_lesson_content(&self, version_id: &str, input: UpdateContentRequest)
        -> Result<()>;
}

/// HTTP implementation of [`CoursePersistence`]
///
/// # Example
///
/// ```rust,no_run
/// use atelier_api::{ApiConfig, HttpCoursePersistence};
///
/// let api = HttpCoursePersistence::new(ApiConfig {
///     base_url: "https://api.example.com".into(),
///     ..Default::default()
/// });
/// ```
pub struct HttpCoursePersistence {
    config: ApiConfig,
    client: Client,
}

impl HttpCoursePersistence {
    /// Create a new client
    pub fn new(config: ApiConfig) -> Self {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .expect("Invalid API key"),
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/authoring/v1/{}", self.config.base_url, path)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_body(status, &body)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl serde::Serialize,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_body(status, &body)
    }

    async fn patch(&self, path: &str, payload: &impl serde::Serialize) -> Result<()> {
        let response = self
            .client
            .patch(self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_empty(status, &body)
    }

    /// Delete, treating "record not found" as already satisfied.
    async fn delete(&self, path: &str) -> Result<bool> {
        let response = self.client.delete(self.url(path)).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        match decode_empty(status, &body) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CoursePersistence for HttpCoursePersistence {
    async fn create_section(&self, input: CreateSectionRequest) -> Result<SectionRecord> {
        debug!(course_id = %input.course_id, title = %input.title, "creating section");
        self.post("sections", &input).await
    }

    async fn update_section(&self, id: &str, input: UpdateSectionRequest) -> Result<()> {
        self.patch(&format!("sections/{}", urlencoding::encode(id)), &input)
            .await
    }

    async fn delete_section(&self, id: &str) -> Result<bool> {
        self.delete(&format!("sections/{}", urlencoding::encode(id)))
            .await
    }

    async fn create_lesson(&self, input: CreateLessonRequest) -> Result<LessonRecord> {
        debug!(section_id = %input.section_id, title = %input.title, "creating lesson");
        self.post("lessons", &input).await
    }

    async fn update_lesson(&self, id: &str, input: UpdateLessonRequest) -> Result<()> {
        self.patch(&format!("lessons/{}", urlencoding::encode(id)), &input)
            .await
    }

    async fn delete_lesson(&self, id: &str) -> Result<bool> {
        self.delete(&format!("lessons/{}", urlencoding::encode(id)))
            .await
    }

    async fn fetch_lesson_content(&self, lesson_id: &str) -> Result<ContentRecord> {
        self.get(&format!("lessons/{}/content", urlencoding::encode(lesson_id)))
            .await
    }

    async fn update_lesson_content(
        &self,
        version_id: &str,
        input: UpdateContentRequest,
    ) -> Result<()> {
        self.patch(&format!("content/{}", urlencoding::encode(version_id)), &input)
            .await
    }
}
