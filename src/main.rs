use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use rxscan::config::{AnalyzerConfig, APP_NAME, APP_VERSION};
use rxscan::pipeline::interactions::StubInteractionService;
use rxscan::pipeline::ner::{DrugRecognizer, LexiconRecognizer, RemoteNer};
use rxscan::pipeline::ocr::{OcrEngine, UnavailableOcr};
use rxscan::pipeline::PrescriptionPipeline;
use rxscan::server::{router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AnalyzerConfig::from_env();
    tracing::info!(
        version = APP_VERSION,
        addr = %config.bind_addr,
        "Starting {APP_NAME}"
    );

    let pipeline = Arc::new(PrescriptionPipeline::new(
        make_ocr_engine(&config),
        make_recognizer(&config),
        Arc::new(StubInteractionService),
    ));

    let bind_addr = config.bind_addr;
    let app = router(Arc::new(AppState { config, pipeline }));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!("Listening on http://{bind_addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install ctrl-c handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Pick the OCR engine for this build and configuration. Without a working
/// Tesseract setup every upload falls back to the demo payload, which is
/// the documented demo behavior rather than a startup failure.
fn make_ocr_engine(config: &AnalyzerConfig) -> Arc<dyn OcrEngine + Send + Sync> {
    #[cfg(feature = "ocr")]
    {
        use rxscan::pipeline::ocr::TesseractOcr;

        match &config.tessdata_dir {
            Some(dir) => match TesseractOcr::new(dir) {
                Ok(engine) => {
                    let engine = match &config.drug_wordlist {
                        Some(wordlist) => engine.with_wordlist(wordlist),
                        None => engine,
                    };
                    tracing::info!(tessdata = %dir.display(), "Tesseract OCR enabled");
                    return Arc::new(engine);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Tesseract init failed, OCR disabled");
                }
            },
            None => {
                tracing::warn!("RXSCAN_TESSDATA_DIR not set, OCR disabled");
            }
        }
    }
    #[cfg(not(feature = "ocr"))]
    {
        let _ = config;
        tracing::warn!("Built without the `ocr` feature; uploads will use the demo payload");
    }

    Arc::new(UnavailableOcr)
}

/// Remote NER endpoint when configured, bundled lexicon otherwise.
fn make_recognizer(config: &AnalyzerConfig) -> Arc<dyn DrugRecognizer + Send + Sync> {
    if let Some(endpoint) = &config.ner_endpoint {
        match RemoteNer::new(endpoint.clone()) {
            Ok(ner) => {
                tracing::info!(endpoint = %endpoint, "Using remote NER endpoint");
                return Arc::new(ner);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote NER init failed, using lexicon recognizer");
            }
        }
    }

    match &config.drug_wordlist {
        Some(path) => match LexiconRecognizer::from_wordlist(path) {
            Ok(rec) => {
                tracing::info!(wordlist = %path.display(), "Using drug wordlist recognizer");
                Arc::new(rec)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Wordlist unreadable, using builtin lexicon");
                Arc::new(LexiconRecognizer::with_builtin_lexicon())
            }
        },
        None => Arc::new(LexiconRecognizer::with_builtin_lexicon()),
    }
}
