use anyhow::*;
use async_trait::async_trait;

use crate::{
    models::{
        BatchDocumentsResponse, BatchType, Document, DocumentType, EntityDocumentExtractor,
        EntityTextExtractor, File, Job, JobResults, RawPayload, Response, ResultsSearch, Search,
        SearchDocument, SearchParameters, StatusDocument, UploadResult,
    },
    upload::RetryPolicy,
};

/// The top-level API of this project: one method per integrator endpoint.
#[async_trait]
pub trait IntegratorApi: Send + Sync {
    /// Extracts the entities described by `schema` from free text.
    async fn extract_from_text(&self, data: &EntityTextExtractor) -> Result<RawPayload>;

    /// Extracts entities from an already processed document.
    async fn extract_from_document(
        &self,
        uuid: &str,
        data: &EntityDocumentExtractor,
    ) -> Result<RawPayload>;

    async fn search_in_document(&self, search: &Search) -> Result<SearchDocument>;

    async fn set_document_status(&self, uuid: &str, status: StatusDocument) -> Result<bool>;

    async fn get_document_by_uuid(&self, uuid: &str) -> Result<Document>;

    async fn get_documents_by_status(
        &self,
        status: StatusDocument,
        page: u32,
        limit: u32,
    ) -> Result<BatchDocumentsResponse>;

    async fn get_documents_by_status_and_batch_type(
        &self,
        status: StatusDocument,
        batch_type: BatchType,
        page: u32,
        limit: u32,
    ) -> Result<BatchDocumentsResponse>;

    async fn get_documents_by_batch(
        &self,
        batch_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<BatchDocumentsResponse>;

    /// Resets a document so the server processes it again.
    async fn clear_document_by_uuid(&self, uuid: &str) -> Result<bool>;

    async fn delete_batch(&self, batch_id: &str) -> Result<bool>;

    async fn delete_document_from_batch(&self, uuid: &str) -> Result<bool>;

    async fn get_document_types(&self) -> Result<Vec<DocumentType>>;

    /// Creates a batch. On success the payload holds the new batch id.
    async fn create_batch(&self, name: &str, batch_type: BatchType) -> Result<Response>;

    /// Semantic or literal search over a brain. A `status: false` reply is an empty result.
    async fn search_in_brain(&self, params: &SearchParameters) -> Result<ResultsSearch>;

    /// Runs the QA pipeline over every document of a batch.
    async fn run_qa_on_batch(&self, batch_id: &str) -> Result<bool>;

    /// Uploads one file into a batch, retrying per `retry`.
    ///
    /// Upload failures come back as an unsuccessful [`UploadResult`]; only a malformed
    /// server reply is an error.
    async fn upload_file(
        &self,
        file: &File,
        batch_id: &str,
        retry: RetryPolicy,
    ) -> Result<UploadResult>;

    /// Uploads every file of `job` in order, splitting the outcomes into successful and
    /// failed uploads. Stops at the first upload that errors.
    async fn append_job(
        &self,
        job: &Job,
        batch_id: &str,
        retry: RetryPolicy,
    ) -> Result<JobResults> {
        let mut results = JobResults::default();
        for file in &job.files {
            let result = self
                .upload_file(file, batch_id, retry)
                .await
                .with_context(|| format!("failed to upload {}", file.filename))?;
            results.push(result);
        }
        Ok(results)
    }
}
