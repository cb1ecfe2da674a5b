//! Differential analysis of one original against its reconstruction.
//!
//! [`Analyzer`] asks the parser collaborator for the reconstruction, runs
//! both documents through the same canonicalization, diffs them, and scores
//! the outcome. A document that cannot be canonicalized downgrades the run
//! to the byte-level diff with `reduced_confidence` set.

use std::sync::Arc;

use pqa_core::canonical::{CanonicalDocument, Leaf};
use pqa_core::diff::{analyze_bytes, analyze_documents, DiffOutcome};
use pqa_core::file_type::FileType;
use pqa_core::scoring::{compute_scores, QualityScores, ScoringWeights};
use pqa_core::severity::SeverityTable;
use pqa_core::types::DbId;

use crate::reconstruction::{CanonicalizationError, ParserService, ReconstructionError};

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    /// Canonicalization failed for a reason other than the document itself.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    #[error("Diff task failed: {0}")]
    Internal(String),
}

/// Diff outcome plus the scores derived from it.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub outcome: DiffOutcome,
    pub scores: QualityScores,
}

pub struct Analyzer {
    parser: Arc<dyn ParserService>,
    table: Arc<SeverityTable>,
    weights: ScoringWeights,
}

impl Analyzer {
    pub fn new(parser: Arc<dyn ParserService>, table: SeverityTable, weights: ScoringWeights) -> Self {
        Self {
            parser,
            table: Arc::new(table),
            weights,
        }
    }

    /// Compare `original` with what the collaborator reconstructs for the
    /// device.
    pub async fn analyze(
        &self,
        device_id: DbId,
        file_type: FileType,
        original: &[u8],
    ) -> Result<DiffReport, AnalyzeError> {
        let reconstructed = self.parser.reconstruct(device_id, file_type).await?;

        let (original_doc, reconstructed_doc) = tokio::join!(
            self.canonical(file_type, original),
            self.canonical(file_type, &reconstructed),
        );

        let outcome = match (original_doc, reconstructed_doc) {
            (Ok(original_doc), Ok(reconstructed_doc)) => {
                let table = Arc::clone(&self.table);
                tokio::task::spawn_blocking(move || {
                    analyze_documents(&original_doc, &reconstructed_doc, &table)
                })
                .await
                .map_err(|e| AnalyzeError::Internal(e.to_string()))?
            }
            (Err(e), _) | (_, Err(e)) if !e.is_document_fault() => return Err(e.into()),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(
                    device_id,
                    file_type = %file_type,
                    error = %e,
                    "Canonicalization failed, falling back to byte-level diff",
                );
                let original = original.to_vec();
                tokio::task::spawn_blocking(move || analyze_bytes(&original, &reconstructed))
                    .await
                    .map_err(|e| AnalyzeError::Internal(e.to_string()))?
            }
        };

        let scores = compute_scores(&outcome, &self.weights);
        tracing::debug!(
            device_id,
            file_type = %file_type,
            findings = outcome.findings.len(),
            reduced_confidence = outcome.reduced_confidence,
            overall_score = scores.overall_score,
            "Differential analysis complete",
        );
        Ok(DiffReport { outcome, scores })
    }

    async fn canonical(
        &self,
        file_type: FileType,
        bytes: &[u8],
    ) -> Result<CanonicalDocument, CanonicalizationError> {
        let leaves: Vec<Leaf> = self.parser.canonicalize(file_type, bytes).await?;
        CanonicalDocument::from_leaves(leaves).map_err(|e| CanonicalizationError::Malformed {
            file_type,
            message: e.to_string(),
        })
    }
}
