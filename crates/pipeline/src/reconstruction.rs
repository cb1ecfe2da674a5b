//! Parser/Reconstruction collaborator.
//!
//! The grammar-specific parsers live outside this service. For each file
//! type the collaborator can (a) flatten a document into canonical
//! `{path, value}` leaves and (b) render the document it reconstructs from
//! normalized storage for a device. Originals and reconstructions go through
//! the same `canonicalize` call so both sides see identical canonicalization.

use std::time::Duration;

use async_trait::async_trait;
use pqa_core::canonical::Leaf;
use pqa_core::file_type::FileType;
use pqa_core::types::DbId;
use serde::Deserialize;

/// HTTP request timeout for a single collaborator call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The collaborator could not produce a reconstruction. The run is recorded
/// as `error` without scores.
#[derive(Debug, thiserror::Error)]
pub enum ReconstructionError {
    #[error("No normalized {file_type} data for device {device_id}")]
    UnknownDevice { device_id: DbId, file_type: FileType },

    #[error("Parser service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Parser service returned HTTP {0}")]
    HttpStatus(u16),
}

/// A document could not be flattened into canonical leaves.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalizationError {
    /// The document does not follow its grammar.
    #[error("Malformed {file_type} document: {message}")]
    Malformed { file_type: FileType, message: String },

    /// The parser has no grammar for this file type or dialect.
    #[error("Unsupported {0} grammar")]
    Unsupported(FileType),

    /// The parser could not be asked at all.
    #[error("Parser service unavailable: {0}")]
    Unavailable(String),
}

impl CanonicalizationError {
    /// Whether the document itself is at fault. Only document faults fall
    /// back to the byte-level diff; an unreachable parser is an error run.
    pub fn is_document_fault(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::Unsupported(_))
    }
}

// ---------------------------------------------------------------------------
// ParserService
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ParserService: Send + Sync {
    /// Flatten a document of the given type into canonical leaves.
    async fn canonicalize(
        &self,
        file_type: FileType,
        bytes: &[u8],
    ) -> Result<Vec<Leaf>, CanonicalizationError>;

    /// Render the document reconstructed from normalized storage.
    async fn reconstruct(
        &self,
        device_id: DbId,
        file_type: FileType,
    ) -> Result<Vec<u8>, ReconstructionError>;
}

// ---------------------------------------------------------------------------
// HttpParserService
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CanonicalResponse {
    leaves: Vec<Leaf>,
}

/// Parser collaborator reached over HTTP.
///
/// - `POST {base}/canonicalize/{file_type}` with the raw document as body,
///   answering `{"leaves": [{"path": .., "value": ..}]}`; `422` means
///   malformed and `415` unsupported.
/// - `GET {base}/devices/{device_id}/files/{file_type}/reconstruction`,
///   answering the rendered document; `404` means unknown device.
pub struct HttpParserService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpParserService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ParserService for HttpParserService {
    async fn canonicalize(
        &self,
        file_type: FileType,
        bytes: &[u8],
    ) -> Result<Vec<Leaf>, CanonicalizationError> {
        let url = format!("{}/canonicalize/{}", self.base_url, file_type);
        let response = self
            .client
            .post(&url)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| CanonicalizationError::Unavailable(e.to_string()))?;

        match response.status().as_u16() {
            200..=299 => {}
            415 => return Err(CanonicalizationError::Unsupported(file_type)),
            422 => {
                let message = response.text().await.unwrap_or_default();
                return Err(CanonicalizationError::Malformed { file_type, message });
            }
            code => {
                return Err(CanonicalizationError::Unavailable(format!(
                    "HTTP {code} from {url}"
                )))
            }
        }

        let body: CanonicalResponse = response.json().await.map_err(|e| {
            CanonicalizationError::Unavailable(format!("invalid canonicalize response: {e}"))
        })?;
        Ok(body.leaves)
    }

    async fn reconstruct(
        &self,
        device_id: DbId,
        file_type: FileType,
    ) -> Result<Vec<u8>, ReconstructionError> {
        let url = format!(
            "{}/devices/{device_id}/files/{file_type}/reconstruction",
            self.base_url
        );
        let response = self.client.get(&url).send().await?;
        match response.status().as_u16() {
            200..=299 => Ok(response.bytes().await?.to_vec()),
            404 => Err(ReconstructionError::UnknownDevice {
                device_id,
                file_type,
            }),
            code => Err(ReconstructionError::HttpStatus(code)),
        }
    }
}
