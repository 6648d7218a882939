//! Prescription-analysis pipeline.
//!
//! A linear sequence of three steps behind trait seams: image → text
//! ([`ocr::OcrEngine`]), text → drug mentions ([`ner::DrugRecognizer`]),
//! drugs → findings ([`interactions::InteractionAnalyzer`]). The pipeline
//! itself never surfaces a failure to the HTTP caller: empty or erroring
//! steps collapse into the fixed demo payload, flagged via
//! [`ReportSource::DemoFallback`] and a warning log.

pub mod interactions;
pub mod ner;
pub mod ocr;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::models::{demo_drugs, demo_report, AnalysisReport, Drug, ReportSource, DEMO_TEXT};
use interactions::{InteractionAnalyzer, InteractionFindings};
use ner::DrugRecognizer;
use ocr::OcrEngine;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("Drug recognition failed: {0}")]
    Recognition(String),

    #[error("Interaction service failed: {0}")]
    InteractionService(String),
}

/// The three-step analysis pipeline.
pub struct PrescriptionPipeline {
    ocr: Arc<dyn OcrEngine + Send + Sync>,
    recognizer: Arc<dyn DrugRecognizer + Send + Sync>,
    analyzer: Arc<dyn InteractionAnalyzer + Send + Sync>,
}

impl PrescriptionPipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngine + Send + Sync>,
        recognizer: Arc<dyn DrugRecognizer + Send + Sync>,
        analyzer: Arc<dyn InteractionAnalyzer + Send + Sync>,
    ) -> Self {
        Self {
            ocr,
            recognizer,
            analyzer,
        }
    }

    /// Analyze a staged upload on disk. Never fails: a file that cannot be
    /// read yields the demo payload like any other pipeline failure.
    pub fn analyze_file(&self, path: &Path) -> AnalysisReport {
        match std::fs::read(path) {
            Ok(bytes) => self.analyze_bytes(&bytes),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read staged upload, serving demo payload");
                demo_report()
            }
        }
    }

    /// Analyze raw image bytes, collapsing any step failure into the demo
    /// payload.
    pub fn analyze_bytes(&self, image_bytes: &[u8]) -> AnalysisReport {
        match self.try_analyze(image_bytes) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Analysis failed, serving demo payload");
                demo_report()
            }
        }
    }

    /// Run interaction analysis for a manually entered drug list.
    /// Service failures degrade to empty findings.
    pub fn analyze_drugs(&self, drugs: &[Drug]) -> InteractionFindings {
        match self.analyzer.analyze(drugs) {
            Ok(findings) => findings,
            Err(e) => {
                tracing::warn!(error = %e, "Interaction analysis failed, returning empty findings");
                InteractionFindings::empty()
            }
        }
    }

    fn try_analyze(&self, image_bytes: &[u8]) -> Result<AnalysisReport, AnalysisError> {
        let (text, ocr_failed) = match self.ocr.ocr_image(image_bytes) {
            Ok(output) => {
                tracing::debug!(
                    chars = output.text.len(),
                    confidence = output.confidence,
                    "OCR complete"
                );
                (output.text, false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "OCR step failed");
                (String::new(), true)
            }
        };

        let mut drugs = if text.trim().is_empty() {
            Vec::new()
        } else {
            self.recognizer.recognize(&text)?
        };

        let mut source = ReportSource::Extracted;

        let text = if ocr_failed || text.trim().is_empty() {
            tracing::warn!("No usable OCR text, substituting demo prescription");
            source = ReportSource::DemoFallback;
            DEMO_TEXT.to_string()
        } else {
            text
        };

        if drugs.is_empty() {
            tracing::warn!("No drug mentions recognized, substituting demo drug list");
            source = ReportSource::DemoFallback;
            drugs = demo_drugs();
        }

        let findings = self.analyzer.analyze(&drugs)?;

        Ok(AnalysisReport {
            text,
            drugs,
            interactions: findings.interactions,
            recommendations: findings.recommendations,
            alternatives: findings.alternatives,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Drug;
    use super::interactions::StubInteractionService;
    use super::ner::{LexiconRecognizer, MockRecognizer};
    use super::ocr::MockOcr;

    fn pipeline_with(
        ocr: MockOcr,
        recognizer: Arc<dyn DrugRecognizer + Send + Sync>,
    ) -> PrescriptionPipeline {
        PrescriptionPipeline::new(Arc::new(ocr), recognizer, Arc::new(StubInteractionService))
    }

    #[test]
    fn successful_extraction_bypasses_demo_substitution() {
        let pipeline = pipeline_with(
            MockOcr::with_text("Take Aspirin 325mg twice daily", 0.9),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
        );
        let report = pipeline.analyze_bytes(b"fake-image");
        assert_eq!(report.source, ReportSource::Extracted);
        assert_eq!(report.text, "Take Aspirin 325mg twice daily");
        assert_eq!(report.drugs.len(), 1);
        assert_eq!(report.drugs[0].name, "Aspirin");
        assert_eq!(report.drugs[0].dosage, "325mg");
    }

    #[test]
    fn empty_ocr_text_yields_full_demo_payload() {
        let pipeline = pipeline_with(
            MockOcr::with_text("   \n ", 0.1),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
        );
        let report = pipeline.analyze_bytes(b"blank-scan");
        assert_eq!(report.text, DEMO_TEXT);
        assert_eq!(report.drugs, demo_drugs());
        assert_eq!(report.source, ReportSource::DemoFallback);
    }

    #[test]
    fn ocr_error_yields_full_demo_payload() {
        let pipeline = pipeline_with(
            MockOcr::failing("engine exploded"),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
        );
        let report = pipeline.analyze_bytes(b"not-an-image");
        assert_eq!(report.text, DEMO_TEXT);
        assert_eq!(report.drugs, demo_drugs());
        assert_eq!(report.source, ReportSource::DemoFallback);
        assert!(report.interactions.is_empty());
        assert!(report.recommendations.is_empty());
        assert!(report.alternatives.is_empty());
    }

    #[test]
    fn real_text_with_no_drugs_keeps_text_substitutes_drug_list() {
        let pipeline = pipeline_with(
            MockOcr::with_text("Rest and drink fluids for one week", 0.95),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
        );
        let report = pipeline.analyze_bytes(b"note");
        assert_eq!(report.text, "Rest and drink fluids for one week");
        assert_eq!(report.drugs, demo_drugs());
        assert_eq!(report.source, ReportSource::DemoFallback);
    }

    #[test]
    fn recognizer_error_yields_full_demo_payload() {
        let pipeline = pipeline_with(
            MockOcr::with_text("Aspirin 325mg", 0.9),
            Arc::new(MockRecognizer::failing("model load failed")),
        );
        let report = pipeline.analyze_bytes(b"img");
        assert_eq!(report, demo_report());
    }

    #[test]
    fn unreadable_file_yields_demo_payload() {
        let pipeline = pipeline_with(
            MockOcr::with_text("anything", 0.9),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
        );
        let report = pipeline.analyze_file(Path::new("/nonexistent/upload.png"));
        assert_eq!(report, demo_report());
    }

    #[test]
    fn analyze_file_reads_staged_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.png");
        std::fs::write(&path, b"image-bytes").unwrap();

        let pipeline = pipeline_with(
            MockOcr::with_text("Metformin 500mg once daily", 0.9),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
        );
        let report = pipeline.analyze_file(&path);
        assert_eq!(report.source, ReportSource::Extracted);
        assert_eq!(report.drugs[0].name, "Metformin");
    }

    #[test]
    fn manual_analysis_degrades_to_empty_findings() {
        let pipeline = pipeline_with(
            MockOcr::with_text("x", 0.5),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
        );
        let findings = pipeline.analyze_drugs(&[Drug::named("Aspirin")]);
        assert!(findings.interactions.is_empty());
        assert!(findings.recommendations.is_empty());
        assert!(findings.alternatives.is_empty());
    }
}
