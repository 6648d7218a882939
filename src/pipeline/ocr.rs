//! OCR engines behind a mockable trait seam.
//!
//! The real engine is Tesseract, compiled in only with the `ocr` cargo
//! feature. Builds without it get [`UnavailableOcr`], whose errors flow
//! into the pipeline's demo-payload fallback.

#[cfg(feature = "ocr")]
use std::path::Path;

use super::AnalysisError;

/// Raw OCR output for one image.
#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub text: String,
    /// Mean recognition confidence, 0.0–1.0.
    pub confidence: f32,
}

/// Image-to-text engine abstraction.
pub trait OcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrOutput, AnalysisError>;
}

/// Bundled Tesseract engine. Only available with the `ocr` feature.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    tessdata_dir: std::path::PathBuf,
    lang: String,
    /// Optional drug wordlist to bias recognition toward medication names.
    wordlist: Option<std::path::PathBuf>,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    /// Initialize against a tessdata directory. English traineddata is
    /// required; prescriptions in this demo are English-only.
    pub fn new(tessdata_dir: &Path) -> Result<Self, AnalysisError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(AnalysisError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: "eng".to_string(),
            wordlist: None,
        })
    }

    /// Attach a drug wordlist file (one term per line). A missing file is
    /// logged and skipped, not fatal.
    pub fn with_wordlist(mut self, path: &Path) -> Self {
        if path.exists() {
            self.wordlist = Some(path.to_path_buf());
        } else {
            tracing::warn!(path = %path.display(), "Drug wordlist not found, skipping");
        }
        self
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrOutput, AnalysisError> {
        let tessdata = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| AnalysisError::OcrInit("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata), Some(&self.lang))
            .map_err(|e| AnalysisError::OcrInit(format!("{e:?}")))?;

        let tess = match self.wordlist.as_ref().and_then(|p| p.to_str()) {
            Some(words) => tess
                .set_variable("user_words_file", words)
                .map_err(|e| AnalysisError::OcrInit(format!("Failed to set wordlist: {e:?}")))?,
            None => tess,
        };

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| AnalysisError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| AnalysisError::OcrProcessing(format!("{e:?}")))?;
        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrOutput { text, confidence })
    }
}

/// Stand-in engine for builds without the `ocr` feature. Always errors, so
/// every upload takes the demo-payload path.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrOutput, AnalysisError> {
        Err(AnalysisError::OcrProcessing(
            "OCR engine not compiled in (rebuild with the `ocr` feature)".into(),
        ))
    }
}

/// Mock engine for tests: fixed text/confidence or a forced error.
pub struct MockOcr {
    text: String,
    confidence: f32,
    error: Option<String>,
}

impl MockOcr {
    pub fn with_text(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            error: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            error: Some(message.to_string()),
        }
    }
}

impl OcrEngine for MockOcr {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrOutput, AnalysisError> {
        if let Some(message) = &self.error {
            return Err(AnalysisError::OcrProcessing(message.clone()));
        }
        Ok(OcrOutput {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_text() {
        let engine = MockOcr::with_text("Metformin 500mg", 0.92);
        let out = engine.ocr_image(b"fake").unwrap();
        assert_eq!(out.text, "Metformin 500mg");
        assert!((out.confidence - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn mock_can_force_errors() {
        let engine = MockOcr::failing("boom");
        let err = engine.ocr_image(b"fake").unwrap_err();
        assert!(matches!(err, AnalysisError::OcrProcessing(_)));
    }

    #[test]
    fn unavailable_engine_always_errors() {
        let err = UnavailableOcr.ocr_image(b"anything").unwrap_err();
        assert!(err.to_string().contains("ocr"));
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn tesseract_rejects_missing_tessdata() {
        let dir = tempfile::tempdir().unwrap();
        let result = TesseractOcr::new(dir.path());
        assert!(matches!(result, Err(AnalysisError::TessdataNotFound(_))));
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn tesseract_missing_wordlist_stays_none() {
        let tessdata = std::path::Path::new("/usr/share/tesseract-ocr/5/tessdata");
        if !tessdata.exists() {
            return; // Skip on systems without Tesseract
        }
        let engine = TesseractOcr::new(tessdata)
            .unwrap()
            .with_wordlist(Path::new("/nonexistent/wordlist.txt"));
        assert!(engine.wordlist.is_none());
    }
}
