//! Value types exchanged with the integrator API.
//!
//! Response types decode leniently: a field the server leaves out or sends as `null` takes
//! its zero value, the same way the server's own clients read them.

use std::{fmt, path::Path, str::FromStr};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Seconds between the unix epoch and `0001-01-01T00:00:00Z`.
const ZERO_INSTANT_SECS: i64 = -62_135_596_800;

/// The instant the server uses for a timestamp that was never set.
pub fn zero_time() -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_timestamp(ZERO_INSTANT_SECS, 0)
        .unwrap_or_default()
        .into()
}

/// Reads `null` as the type's zero value.
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// RFC 3339 timestamps that keep their offset and print `Z` for UTC. `null` reads as
/// [`zero_time`].
mod timestamp {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        Ok(Option::<DateTime<FixedOffset>>::deserialize(deserializer)?
            .unwrap_or_else(super::zero_time))
    }
}

/// The `{status, payload}` wrapper around every response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct Envelope<T> {
    #[serde(default, deserialize_with = "null_default")]
    pub status: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub payload: T,
}

/// An envelope whose payload is left for the caller to interpret.
pub type Response = Envelope<Value>;

/// The untyped payload returned by the extractor endpoints.
pub type RawPayload = Map<String, Value>;

/// Purpose a batch is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    #[default]
    Execution,
    Testing,
}

impl BatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchType::Execution => "execution",
            BatchType::Testing => "testing",
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "execution" => Ok(BatchType::Execution),
            "testing" => Ok(BatchType::Testing),
            other => bail!("unknown batch type `{other}` (expected execution or testing)"),
        }
    }
}

/// Processing state of a document. Transitions are driven by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusDocument {
    #[default]
    WaitingProcess,
    WorkingExtractor,
    Processed,
    Complete,
    ErrorDownloadLink,
    ErrorOnExtraction,
    Assigned,
    WaitingQa,
    WorkingQa,
    CompleteQa,
    NoPipelineDefined,
    Rejected,
    InReview,
    Reviewed,
    WithErrorOnAssign,
}

impl StatusDocument {
    pub const ALL: [StatusDocument; 15] = [
        StatusDocument::WaitingProcess,
        StatusDocument::WorkingExtractor,
        StatusDocument::Processed,
        StatusDocument::Complete,
        StatusDocument::ErrorDownloadLink,
        StatusDocument::ErrorOnExtraction,
        StatusDocument::Assigned,
        StatusDocument::WaitingQa,
        StatusDocument::WorkingQa,
        StatusDocument::CompleteQa,
        StatusDocument::NoPipelineDefined,
        StatusDocument::Rejected,
        StatusDocument::InReview,
        StatusDocument::Reviewed,
        StatusDocument::WithErrorOnAssign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusDocument::WaitingProcess => "waiting_process",
            StatusDocument::WorkingExtractor => "working_extractor",
            StatusDocument::Processed => "processed",
            StatusDocument::Complete => "complete",
            StatusDocument::ErrorDownloadLink => "error_download_link",
            StatusDocument::ErrorOnExtraction => "error_on_extraction",
            StatusDocument::Assigned => "assigned",
            StatusDocument::WaitingQa => "waiting_qa",
            StatusDocument::WorkingQa => "working_qa",
            StatusDocument::CompleteQa => "complete_qa",
            StatusDocument::NoPipelineDefined => "no_pipeline_defined",
            StatusDocument::Rejected => "rejected",
            StatusDocument::InReview => "in_review",
            StatusDocument::Reviewed => "reviewed",
            StatusDocument::WithErrorOnAssign => "with_error_on_assign",
        }
    }
}

impl fmt::Display for StatusDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusDocument {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match StatusDocument::ALL.iter().find(|status| status.as_str() == s) {
            Some(status) => Ok(*status),
            None => bail!("unknown document status `{s}`"),
        }
    }
}

/// What gets uploaded: the file itself or a link the server downloads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    RemoteUrl(String),
}

/// A single upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub content: FileContent,
    pub type_document: String,
    pub filename: String,
}

impl File {
    pub fn from_bytes(
        bytes: impl Into<Vec<u8>>,
        filename: impl Into<String>,
        type_document: impl Into<String>,
    ) -> Self {
        Self {
            content: FileContent::Bytes(bytes.into()),
            type_document: type_document.into(),
            filename: filename.into(),
        }
    }

    pub fn from_url(
        url: impl Into<String>,
        filename: impl Into<String>,
        type_document: impl Into<String>,
    ) -> Self {
        Self {
            content: FileContent::RemoteUrl(url.into()),
            type_document: type_document.into(),
            filename: filename.into(),
        }
    }

    /// Reads a local file, naming the upload after the last path component.
    pub async fn from_path(path: impl AsRef<Path>, type_document: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("{} has no usable file name", path.display()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        Ok(Self::from_bytes(bytes, filename, type_document))
    }
}

/// Files submitted together against one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    pub files: Vec<File>,
}

impl Job {
    pub fn new(files: Vec<File>) -> Self {
        Self { files }
    }
}

/// Outcome of uploading one file. A failed upload is reported here, not as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl UploadResult {
    pub fn succeeded(file_name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            success: true,
            file_name: file_name.into(),
            uuid: Some(uuid.into()),
            error_message: None,
        }
    }

    pub fn failed(file_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            file_name: file_name.into(),
            uuid: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Per-file outcomes of a job, in submission order within each list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResults {
    pub successful: Vec<UploadResult>,
    pub failed: Vec<UploadResult>,
}

impl JobResults {
    pub fn push(&mut self, result: UploadResult) {
        if result.success {
            self.successful.push(result);
        } else {
            self.failed.push(result);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentType {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub user: String,
    #[serde(deserialize_with = "null_default")]
    pub key: String,
    #[serde(deserialize_with = "null_default")]
    pub id_type_document: String,
    #[serde(deserialize_with = "null_default")]
    pub created: String,
}

/// A key/value pair extracted from a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub key: String,
    #[serde(deserialize_with = "null_default")]
    pub value: String,
    #[serde(deserialize_with = "null_default")]
    pub page: i64,
    #[serde(deserialize_with = "null_default")]
    pub id_core: String,
    #[serde(deserialize_with = "null_default")]
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub batch_id: String,
    #[serde(deserialize_with = "null_default")]
    pub user: String,
    #[serde(deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub url: String,
    #[serde(deserialize_with = "null_default")]
    pub file_name: String,
    #[serde(deserialize_with = "null_default")]
    pub type_document: String,
    /// Raw status as sent by the server; see [`Document::status`].
    #[serde(deserialize_with = "null_default")]
    pub status_document: String,
    #[serde(with = "timestamp")]
    pub uploaded: DateTime<FixedOffset>,
    #[serde(with = "timestamp")]
    pub reviewed_at: DateTime<FixedOffset>,
    #[serde(deserialize_with = "null_default")]
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
}

impl Document {
    /// The status, if it is one this client knows about.
    pub fn status(&self) -> Option<StatusDocument> {
        self.status_document.parse().ok()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self {
            id: String::new(),
            batch_id: String::new(),
            user: String::new(),
            uuid: String::new(),
            url: String::new(),
            file_name: String::new(),
            type_document: String::new(),
            status_document: String::new(),
            uploaded: zero_time(),
            reviewed_at: zero_time(),
            source_type: String::new(),
            entities: None,
        }
    }
}

/// One page of a document listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchDocumentsResponse {
    #[serde(deserialize_with = "null_default")]
    pub documents: Vec<Document>,
    #[serde(deserialize_with = "null_default")]
    pub total: i64,
}

/// Body of a free-text search inside one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    pub matches: String,
    pub uuid: String,
    pub max_results: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Semantic,
    Literal,
}

impl FromStr for SearchType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "semantic" => Ok(SearchType::Semantic),
            "literal" => Ok(SearchType::Literal),
            other => bail!("unknown search type `{other}` (expected semantic or literal)"),
        }
    }
}

/// Body of a brain search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub batch: String,
    pub param: String,
    pub k: i64,
    pub type_search: SearchType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTextExtractor {
    pub text: String,
    /// Either a plain description or an object whose keys name the entities to extract.
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocumentExtractor {
    pub matches: String,
    pub schema: Value,
}

/// Where a brain search result came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultSource {
    Page(i64),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    #[serde(deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source: Option<ResultSource>,
    #[serde(deserialize_with = "null_default")]
    pub coincidences: i64,
    #[serde(deserialize_with = "null_default")]
    pub score: f64,
}

/// Results of a brain search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsSearch {
    #[serde(deserialize_with = "null_default")]
    pub results: Vec<SearchResult>,
}

impl fmt::Display for ResultsSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self.results).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub source: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Formatted {
    #[serde(deserialize_with = "null_default")]
    pub content: String,
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub meta: Meta,
}

/// A match of a document search, with highlighted content under `_formatted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hit {
    #[serde(rename = "_formatted", deserialize_with = "null_default")]
    pub formatted: Formatted,
    #[serde(deserialize_with = "null_default")]
    pub content: String,
    #[serde(deserialize_with = "null_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub meta: Meta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchDocument {
    #[serde(deserialize_with = "null_default")]
    pub hits: Vec<Hit>,
    #[serde(deserialize_with = "null_default")]
    pub estimated_total_hits: i64,
    #[serde(deserialize_with = "null_default")]
    pub limit: i64,
    #[serde(deserialize_with = "null_default")]
    pub processing_time_ms: i64,
    #[serde(deserialize_with = "null_default")]
    pub query: String,
}
