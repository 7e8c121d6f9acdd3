//! Per-document ingest summary

use serde::Serialize;

/// What happened to one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Document id as derived from the file name
    pub doc_id: String,

    /// Chunks produced by the chunker
    pub chunks: usize,

    /// Records written to the vector store
    pub records_stored: usize,

    /// Chunks whose embedding failed
    pub chunks_failed: usize,

    pub batches_upserted: usize,
    pub batches_failed: usize,
    pub batches_rate_limited: usize,

    /// Error that aborted the document, if any
    pub error: Option<String>,

    pub elapsed_ms: u64,
}

impl IngestReport {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            ..Default::default()
        }
    }

    /// Every chunk stored and no batch lost
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
            && self.chunks_failed == 0
            && self.batches_failed == 0
            && self.batches_rate_limited == 0
            && self.records_stored == self.chunks
    }
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(error) = &self.error {
            return write!(f, "{}: failed ({error})", self.doc_id);
        }
        write!(
            f,
            "{}: {}/{} chunks stored in {} batches",
            self.doc_id, self.records_stored, self.chunks, self.batches_upserted
        )?;
        if self.chunks_failed > 0 {
            write!(f, ", {} chunks failed", self.chunks_failed)?;
        }
        if self.batches_failed > 0 || self.batches_rate_limited > 0 {
            write!(
                f,
                ", {} batches failed, {} rate limited",
                self.batches_failed, self.batches_rate_limited
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_report() {
        let report = IngestReport {
            chunks: 3,
            records_stored: 3,
            batches_upserted: 1,
            ..IngestReport::new("Pikachu")
        };
        assert!(report.is_complete());
        assert_eq!(report.to_string(), "Pikachu: 3/3 chunks stored in 1 batches");
    }

    #[test]
    fn test_partial_report() {
        let report = IngestReport {
            chunks: 6,
            records_stored: 4,
            chunks_failed: 1,
            batches_upserted: 1,
            batches_rate_limited: 1,
            ..IngestReport::new("Raichu")
        };
        assert!(!report.is_complete());
        assert_eq!(
            report.to_string(),
            "Raichu: 4/6 chunks stored in 1 batches, 1 chunks failed, 0 batches failed, 1 rate limited"
        );
    }

    #[test]
    fn test_failed_report() {
        let report = IngestReport {
            error: Some("bad id".to_string()),
            ..IngestReport::new("???")
        };
        assert_eq!(report.to_string(), "???: failed (bad id)");
    }
}
