//! The collaborator seam: everything the annotator needs from the backend.

use async_trait::async_trait;
use mercury_core::{LabelNode, LabelRecord, LabelRequest, SelectionRequest, Span, Task};

use crate::ClientError;

/// Annotation backend: task store, alignment service and label persistence.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Number of tasks available.
    async fn task_count(&self) -> Result<usize, ClientError>;

    async fn task(&self, index: usize) -> Result<Task, ClientError>;

    /// Candidate spans in the buffer opposite `request`'s origin, sorted.
    async fn candidates(
        &self,
        index: usize,
        request: &SelectionRequest,
    ) -> Result<Vec<Span>, ClientError>;

    async fn submit_label(&self, index: usize, request: &LabelRequest) -> Result<(), ClientError>;

    /// The current user's records for one task.
    async fn history(&self, index: usize) -> Result<Vec<LabelRecord>, ClientError>;

    /// All of the current user's records.
    async fn export(&self) -> Result<Vec<LabelRecord>, ClientError>;

    async fn delete_record(&self, record_id: &str) -> Result<(), ClientError>;

    async fn taxonomy(&self) -> Result<Vec<LabelNode>, ClientError>;
}
