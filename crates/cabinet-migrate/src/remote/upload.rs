//! Single-attempt document upload.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{DocumentUploader, Outcome, RemoteSession};
use crate::config::RemoteConfig;
use crate::staging::{is_bookkeeping_key, StagingRecord};

/// One index field in the upload metadata part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexField {
    #[serde(rename = "FieldName")]
    pub name: String,
    #[serde(rename = "Item")]
    pub value: String,
    #[serde(rename = "ItemElementName")]
    pub kind: &'static str,
}

impl IndexField {
    fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: "String",
        }
    }
}

#[derive(Serialize)]
struct DocumentMetadata<'a> {
    #[serde(rename = "Fields")]
    fields: &'a [IndexField],
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "Id", default)]
    id: i64,
}

/// Build the index field list for `record`.
///
/// Bookkeeping columns and any entry named like `object_id_field` are
/// dropped; the object id is then appended exactly once, last.
pub fn build_index_fields(record: &StagingRecord, object_id_field: &str) -> Vec<IndexField> {
    let mut fields: Vec<IndexField> = record
        .index_fields
        .iter()
        .filter(|(name, _)| {
            !is_bookkeeping_key(name) && !name.eq_ignore_ascii_case(object_id_field)
        })
        .map(|(name, value)| IndexField::string(name.as_str(), value.as_str()))
        .collect();

    fields.push(IndexField::string(object_id_field, record.object_id.as_str()));
    fields
}

/// MIME type of the payload, guessed from its extension.
pub fn content_type_for(source_path: &str) -> String {
    mime_guess::from_path(source_path)
        .first_or_octet_stream()
        .to_string()
}

/// Map a non-success HTTP status to an outcome. Returns `None` for 2xx.
pub fn classify_status(status: StatusCode) -> Option<Outcome> {
    if status.is_success() {
        return None;
    }
    let outcome = match status {
        StatusCode::UNAUTHORIZED => Outcome::AuthExpired,
        StatusCode::CONFLICT => Outcome::SkippedDuplicate,
        StatusCode::PAYLOAD_TOO_LARGE => Outcome::rejected("too_large"),
        s if s.is_client_error() || s.is_server_error() => {
            Outcome::rejected(format!("http_{}", s.as_u16()))
        }
        s => Outcome::general(format!("unexpected status {}", s.as_u16())),
    };
    Some(outcome)
}

/// Uploads documents through a shared [`RemoteSession`].
pub struct RemoteUploader {
    session: Arc<RemoteSession>,
    object_id_field: String,
    timeout: Duration,
}

impl RemoteUploader {
    pub fn new(session: Arc<RemoteSession>, config: &RemoteConfig) -> Self {
        Self {
            session,
            object_id_field: config.object_id_field.clone(),
            timeout: config.upload_timeout(),
        }
    }

    fn build_form(&self, record: &StagingRecord, contents: Vec<u8>) -> Result<Form, String> {
        let fields = build_index_fields(record, &self.object_id_field);
        let metadata = serde_json::to_string(&DocumentMetadata { fields: &fields })
            .map_err(|e| format!("metadata serialization failed: {}", e))?;

        let metadata_part = Part::text(metadata)
            .mime_str("application/json")
            .map_err(|e| format!("invalid metadata part: {}", e))?;

        let file_name = Path::new(&record.source_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.object_id.clone());
        let file_part = Part::bytes(contents)
            .file_name(file_name)
            .mime_str(&content_type_for(&record.source_path))
            .map_err(|e| format!("invalid file part: {}", e))?;

        Ok(Form::new()
            .part("document", metadata_part)
            .part("file[]", file_part))
    }
}

#[async_trait]
impl DocumentUploader for RemoteUploader {
    async fn upload(&self, record: &StagingRecord) -> Outcome {
        let contents = match tokio::fs::read(&record.source_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Outcome::rejected("file_not_found");
            }
            Err(e) => return Outcome::general(format!("reading {}: {}", record.source_path, e)),
        };

        let form = match self.build_form(record, contents) {
            Ok(form) => form,
            Err(reason) => return Outcome::general(reason),
        };

        let url = format!(
            "{}/FileCabinets/{}/Documents",
            self.session.base(),
            record.destination_cabinet_id
        );
        debug!("{}: POST {}", record.object_id, url);

        let response = match self
            .session
            .client()
            .post(&url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Outcome::general(e.to_string()),
        };

        if let Some(outcome) = classify_status(response.status()) {
            if outcome == Outcome::AuthExpired {
                self.session.mark_expired();
            }
            return outcome;
        }

        match response.json::<UploadResponse>().await {
            Ok(body) if body.id != 0 => Outcome::Success { remote_id: body.id },
            Ok(_) => Outcome::general("response did not carry a document id"),
            Err(e) => Outcome::general(format!("unreadable upload response: {}", e)),
        }
    }
}
