//! Recording fake of the persistence service for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use atelier_api::{
    ApiError, ContentRecord, CoursePersistence, CreateLessonRequest, CreateSectionRequest,
    LessonRecord, Result, SectionRecord, UpdateContentRequest, UpdateLessonRequest,
    UpdateSectionRequest,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// In-memory [`CoursePersistence`] that records every call in order,
/// assigns identifiers from optional queues (falling back to counters),
/// and can be told to fail a named operation or stall on a gate.
pub(crate) struct MockApi {
    /// Ordered call trace, e.g. `"create_section Basics"`.
    pub calls: Mutex<Vec<String>>,
    /// Identifiers to hand out for created sections (fallback `sec-N`).
    pub section_ids: Mutex<VecDeque<String>>,
    /// Identifiers to hand out for created lessons (fallback `les-N`).
    pub lesson_ids: Mutex<VecDeque<String>>,
    /// Operation name that should fail with a server error.
    pub fail_on: Mutex<Option<String>>,
    /// Delete targets that answer "record not found".
    pub gone: Mutex<Vec<String>>,
    /// Canned lesson content, keyed by lesson id.
    pub content: Mutex<HashMap<String, ContentRecord>>,
    /// Taken by the first `create_lesson` call, which then waits on it.
    pub gate: Mutex<Option<oneshot::Receiver<()>>>,
    /// Taken by the first `fetch_lesson_content` call, which then waits on it.
    pub fetch_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub created_sections: Mutex<Vec<CreateSectionRequest>>,
    pub created_lessons: Mutex<Vec<CreateLessonRequest>>,
    pub updated_sections: Mutex<Vec<(String, UpdateSectionRequest)>>,
    pub updated_lessons: Mutex<Vec<(String, UpdateLessonRequest)>>,
    pub content_patches: Mutex<Vec<(String, UpdateContentRequest)>>,
    counter: AtomicU64,
}

impl MockApi {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            section_ids: Mutex::new(VecDeque::new()),
            lesson_ids: Mutex::new(VecDeque::new()),
            fail_on: Mutex::new(None),
            gone: Mutex::new(Vec::new()),
            content: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
            fetch_gate: Mutex::new(None),
            created_sections: Mutex::new(Vec::new()),
            created_lessons: Mutex::new(Vec::new()),
            updated_sections: Mutex::new(Vec::new()),
            updated_lessons: Mutex::new(Vec::new()),
            content_patches: Mutex::new(Vec::new()),
            counter: AtomicU64::new(1),
        })
    }

    pub fn fail_on(&self, op: &str) {
        *self.fail_on.lock() = Some(op.to_string());
    }

    pub fn queue_section_id(&self, id: &str) {
        self.section_ids.lock().push_back(id.to_string());
    }

    pub fn queue_lesson_id(&self, id: &str) {
        self.lesson_ids.lock().push_back(id.to_string());
    }

    /// Stall the next `create_lesson` call until the returned sender fires.
    pub fn gate_create_lesson(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock() = Some(rx);
        tx
    }

    /// Stall the next `fetch_lesson_content` call until the returned sender fires.
    pub fn gate_fetch_content(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.fetch_gate.lock() = Some(rx);
        tx
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.fail_on.lock().as_deref() == Some(op) {
            return Err(ApiError::Server {
                status: 500,
                message: format!("{op} rejected by mock"),
            });
        }
        Ok(())
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl CoursePersistence for MockApi {
    async fn create_section(&self, input: CreateSectionRequest) -> Result<SectionRecord> {
        self.record(format!("create_section {}", input.title));
        self.check("create_section")?;
        let id = self
            .section_ids
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.next("sec"));
        self.created_sections.lock().push(input.clone());
        Ok(SectionRecord {
            id,
            course_id: input.course_id,
            title: input.title,
            order_index: input.order_index,
        })
    }

    async fn update_section(&self, id: &str, input: UpdateSectionRequest) -> Result<()> {
        self.record(format!("update_section {id}"));
        self.check("update_section")?;
        self.updated_sections.lock().push((id.to_string(), input));
        Ok(())
    }

    async fn delete_section(&self, id: &str) -> Result<bool> {
        self.record(format!("delete_section {id}"));
        self.check("delete_section")?;
        Ok(!self.gone.lock().iter().any(|g| g == id))
    }

    async fn create_lesson(&self, input: CreateLessonRequest) -> Result<LessonRecord> {
        // Record before gating so tests can observe that the call started.
        self.record(format!("create_lesson {}", input.title));
        let gate = self.gate.lock().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        self.check("create_lesson")?;
        let id = self
            .lesson_ids
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.next("les"));
        self.created_lessons.lock().push(input.clone());
        Ok(LessonRecord {
            id,
            section_id: input.section_id,
            title: input.title,
            description: input.description,
            order_index: input.order_index,
            layout: None,
            duration_minutes: None,
            status: None,
        })
    }

    async fn update_lesson(&self, id: &str, input: UpdateLessonRequest) -> Result<()> {
        self.record(format!("update_lesson {id}"));
        self.check("update_lesson")?;
        self.updated_lessons.lock().push((id.to_string(), input));
        Ok(())
    }

    async fn delete_lesson(&self, id: &str) -> Result<bool> {
        self.record(format!("delete_lesson {id}"));
        self.check("delete_lesson")?;
        Ok(!self.gone.lock().iter().any(|g| g == id))
    }

    async fn fetch_lesson_content(&self, lesson_id: &str) -> Result<ContentRecord> {
        // Record before gating so tests can observe that the call started.
        self.record(format!("fetch_lesson_content {lesson_id}"));
        let gate = self.fetch_gate.lock().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        self.check("fetch_lesson_content")?;
        Ok(self
            .content
            .lock()
            .get(lesson_id)
            .cloned()
            .unwrap_or_else(|| ContentRecord {
                version_id: format!("v-{lesson_id}"),
                layout: "single_column".to_string(),
                blocks: Vec::new(),
                metadata: serde_json::Map::new(),
            }))
    }

    async fn update_lesson_content(
        &self,
        version_id: &str,
        input: UpdateContentRequest,
    ) -> Result<()> {
        self.record(format!("update_lesson_content {version_id}"));
        self.check("update_lesson_content")?;
        self.content_patches
            .lock()
            .push((version_id.to_string(), input));
        Ok(())
    }
}
