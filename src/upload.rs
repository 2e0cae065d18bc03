use std::time::Duration;

use reqwest::multipart::{Form, Part};

use crate::models::{File, FileContent};

/// How many times an upload is attempted and how long to wait between attempts.
///
/// The delay is fixed; there is no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Whether `attempt` (zero based) is the last one allowed.
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Field names of the append-to-batch form.
pub mod fields {
    pub const FILE: &str = "file";
    pub const FILE_URL: &str = "file_url";
    pub const FILE_NAME: &str = "file_name";
    pub const TYPE_DOCUMENT: &str = "type_document";
}

/// Content type of the `file` part.
pub const FILE_MIME: &str = "application/octet-stream";

/// Builds the multipart body for one upload attempt.
///
/// Raw bytes go in a `file` part carrying the filename; a remote URL is sent as the
/// `file_url`/`file_name` text fields so the server fetches it itself.
pub fn build_form(file: &File) -> reqwest::Result<Form> {
    let form = match &file.content {
        FileContent::Bytes(bytes) => Form::new().part(
            fields::FILE,
            Part::bytes(bytes.clone())
                .file_name(file.filename.clone())
                .mime_str(FILE_MIME)?,
        ),
        FileContent::RemoteUrl(url) => Form::new()
            .text(fields::FILE_URL, url.clone())
            .text(fields::FILE_NAME, file.filename.clone()),
    };

    Ok(form.text(fields::TYPE_DOCUMENT, file.type_document.clone()))
}
