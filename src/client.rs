use std::fmt;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Method, RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::{
    api::IntegratorApi,
    config::ClientConfig,
    models::{
        BatchDocumentsResponse, BatchType, Document, DocumentType, EntityDocumentExtractor,
        EntityTextExtractor, Envelope, File, RawPayload, Response, ResultsSearch, Search,
        SearchDocument, SearchParameters, StatusDocument, UploadResult,
    },
    upload::{build_form, RetryPolicy},
};

const KEY_HEADER: &str = "key";
const SECRET_HEADER: &str = "secret";

/// Message of an upload that the server kept refusing.
pub const MAX_RETRIES_REACHED: &str = "max retries reached";

/// HTTP client for the integrator API. Clones share the underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    key: String,
    secret: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct CreateBatch<'a> {
    batch_name: &'a str,
    batch_type: BatchType,
}

impl ApiClient {
    pub fn new(key: impl Into<String>, secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_http_client(key, secret, base_url, reqwest::Client::new())
    }

    /// Uses a caller-built transport, e.g. one with a timeout or proxy configured.
    pub fn with_http_client(
        key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            base_url: base_url.into(),
            http,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.key, &config.secret, &config.base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(KEY_HEADER, &self.key)
            .header(SECRET_HEADER, &self.secret)
    }

    /// Sends the request and returns the body of a 200 response.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let resp = request
            .send()
            .await
            .context("failed to send request to the integrator api")?;

        let status = resp.status();
        if status != StatusCode::OK {
            bail!("API request failed with status code: {}", status.as_u16());
        }

        let body = resp
            .bytes()
            .await
            .context("failed to read integrator api response")?;
        Ok(body.to_vec())
    }

    async fn call<T: DeserializeOwned + Default>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).context("failed to decode integrator api response")
    }

    async fn get<T: DeserializeOwned + Default>(&self, path: &str) -> Result<Envelope<T>> {
        self.call(self.request(Method::GET, &self.url(path))).await
    }

    async fn delete<T: DeserializeOwned + Default>(&self, path: &str) -> Result<Envelope<T>> {
        self.call(self.request(Method::DELETE, &self.url(path))).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>> {
        let body = serde_json::to_vec(body).context("failed to encode request body")?;
        self.call(self.request(Method::POST, &self.url(path)).body(body))
            .await
    }

    async fn send_upload(&self, url: &str, file: &File) -> reqwest::Result<Vec<u8>> {
        self.http
            .post(url)
            .header(KEY_HEADER, &self.key)
            .header(SECRET_HEADER, &self.secret)
            .multipart(build_form(file)?)
            .send()
            .await?
            .bytes()
            .await
            .map(|body| body.to_vec())
    }
}

fn page_query(page: u32, limit: u32) -> String {
    format!("?page={page}&limit={limit}")
}

#[async_trait]
impl IntegratorApi for ApiClient {
    #[instrument(skip_all)]
    async fn extract_from_text(&self, data: &EntityTextExtractor) -> Result<RawPayload> {
        let envelope: Envelope<RawPayload> =
            self.post("/integrator/extractor/from/text", data).await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all, fields(uuid = %uuid))]
    async fn extract_from_document(
        &self,
        uuid: &str,
        data: &EntityDocumentExtractor,
    ) -> Result<RawPayload> {
        let envelope: Envelope<RawPayload> = self
            .post(&format!("/integrator/extractor/from/document/{uuid}"), data)
            .await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all)]
    async fn search_in_document(&self, search: &Search) -> Result<SearchDocument> {
        let envelope: Envelope<SearchDocument> =
            self.post("/integrator/document/search", search).await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all, fields(uuid = %uuid, status = %status))]
    async fn set_document_status(&self, uuid: &str, status: StatusDocument) -> Result<bool> {
        let envelope: Envelope<Value> = self
            .get(&format!("/integrator/documents/set/status/{uuid}/{status}"))
            .await?;
        Ok(envelope.status)
    }

    #[instrument(skip_all, fields(uuid = %uuid))]
    async fn get_document_by_uuid(&self, uuid: &str) -> Result<Document> {
        let envelope: Envelope<Document> = self
            .get(&format!("/integrator/document/get/by/uuid/{uuid}"))
            .await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all, fields(status = %status))]
    async fn get_documents_by_status(
        &self,
        status: StatusDocument,
        page: u32,
        limit: u32,
    ) -> Result<BatchDocumentsResponse> {
        let envelope: Envelope<BatchDocumentsResponse> = self
            .get(&format!(
                "/integrator/documents/by/status/{status}{}",
                page_query(page, limit)
            ))
            .await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all, fields(status = %status, batch_type = %batch_type))]
    async fn get_documents_by_status_and_batch_type(
        &self,
        status: StatusDocument,
        batch_type: BatchType,
        page: u32,
        limit: u32,
    ) -> Result<BatchDocumentsResponse> {
        let envelope: Envelope<BatchDocumentsResponse> = self
            .get(&format!(
                "/integrator/documents/by/{batch_type}/status/{status}{}",
                page_query(page, limit)
            ))
            .await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all, fields(batch_id = %batch_id))]
    async fn get_documents_by_batch(
        &self,
        batch_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<BatchDocumentsResponse> {
        let envelope: Envelope<BatchDocumentsResponse> = self
            .get(&format!(
                "/integrator/documents/by/id/batch/{batch_id}{}",
                page_query(page, limit)
            ))
            .await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all, fields(uuid = %uuid))]
    async fn clear_document_by_uuid(&self, uuid: &str) -> Result<bool> {
        let envelope: Envelope<Value> = self
            .get(&format!("/integrator/clear/document/{uuid}"))
            .await?;
        Ok(envelope.status)
    }

    #[instrument(skip_all, fields(batch_id = %batch_id))]
    async fn delete_batch(&self, batch_id: &str) -> Result<bool> {
        let envelope: Envelope<Value> = self
            .delete(&format!("/integrator/delete/batch/{batch_id}"))
            .await?;
        Ok(envelope.status)
    }

    #[instrument(skip_all, fields(uuid = %uuid))]
    async fn delete_document_from_batch(&self, uuid: &str) -> Result<bool> {
        let envelope: Envelope<Value> = self
            .delete(&format!("/integrator/delete/by/uuid/{uuid}"))
            .await?;
        Ok(envelope.status)
    }

    #[instrument(skip_all)]
    async fn get_document_types(&self) -> Result<Vec<DocumentType>> {
        let envelope: Envelope<Vec<DocumentType>> =
            self.get("/integrator/documents/type/all/user").await?;
        Ok(envelope.payload)
    }

    #[instrument(skip_all, fields(name = %name, batch_type = %batch_type))]
    async fn create_batch(&self, name: &str, batch_type: BatchType) -> Result<Response> {
        let body = CreateBatch {
            batch_name: name,
            batch_type,
        };
        self.post("/integrator/create/batch", &body).await
    }

    #[instrument(skip_all)]
    async fn search_in_brain(&self, params: &SearchParameters) -> Result<ResultsSearch> {
        let envelope: Envelope<Value> = self.post("/integrator/search/brain", params).await?;
        if !envelope.status || envelope.payload.is_null() {
            debug!("brain search reported no results");
            return Ok(ResultsSearch::default());
        }
        serde_json::from_value(envelope.payload).context("failed to decode brain search results")
    }

    #[instrument(skip_all, fields(batch_id = %batch_id))]
    async fn run_qa_on_batch(&self, batch_id: &str) -> Result<bool> {
        let url = self.url(&format!("/integrator/run/qa/batch/all/{batch_id}"));
        let envelope: Envelope<Value> = self.call(self.request(Method::POST, &url)).await?;
        Ok(envelope.status)
    }

    #[instrument(skip_all, fields(file = %file.filename, batch_id = %batch_id))]
    async fn upload_file(
        &self,
        file: &File,
        batch_id: &str,
        retry: RetryPolicy,
    ) -> Result<UploadResult> {
        let url = self.url(&format!("/integrator/append/to/batch/{batch_id}"));

        for attempt in 0..retry.max_retries {
            let body = match self.send_upload(&url, file).await {
                Ok(body) => body,
                Err(err) => {
                    warn!(attempt = attempt + 1, error = %err, "upload attempt failed");
                    if retry.is_last_attempt(attempt) {
                        return Ok(UploadResult::failed(&file.filename, err.to_string()));
                    }
                    sleep(retry.retry_delay).await;
                    continue;
                }
            };

            let envelope: Envelope<Value> =
                serde_json::from_slice(&body).context("failed to decode upload response")?;

            if envelope.status {
                let uuids: Vec<String> = serde_json::from_value(envelope.payload)
                    .context("upload response payload is not a list of document uuids")?;
                let uuid = uuids
                    .into_iter()
                    .next()
                    .context("upload response carried no document uuid")?;
                debug!(uuid = %uuid, "file uploaded");
                return Ok(UploadResult::succeeded(&file.filename, uuid));
            }

            warn!(attempt = attempt + 1, "server rejected upload");
            if retry.is_last_attempt(attempt) {
                break;
            }
            sleep(retry.retry_delay).await;
        }

        Ok(UploadResult::failed(&file.filename, MAX_RETRIES_REACHED))
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
