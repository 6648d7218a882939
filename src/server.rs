//! HTTP surface: upload analysis, manual-entry analysis, embedded front-end.
//!
//! `POST /ocr` is the contract the front-end depends on: multipart file in,
//! `{text, drugs, interactions, recommendations, alternatives, source}` out,
//! HTTP 200 whether extraction worked or the demo payload was substituted.
//! Only a request with no file at all is rejected (400).

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{AnalyzerConfig, APP_VERSION};
use crate::models::{demo_report, Alternative, Drug, Interaction};
use crate::pipeline::PrescriptionPipeline;
use crate::staging::{detect_mime_from_bytes, StagedUpload};

/// Placeholder recommendation for manual entry while the interaction
/// service is stubbed.
const MANUAL_ANALYSIS_NOTE: &str = "Manual analysis not connected to backend.";

/// Headroom on top of the configured file cap for multipart framing.
const UPLOAD_OVERHEAD_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub config: AnalyzerConfig,
    pub pipeline: Arc<PrescriptionPipeline>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualAnalysisRequest {
    pub drugs: Vec<Drug>,
}

#[derive(Debug, Serialize)]
pub struct ManualAnalysisResponse {
    pub drugs: Vec<Drug>,
    pub interactions: Vec<Interaction>,
    pub recommendations: Vec<String>,
    pub alternatives: Vec<Alternative>,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    // The original front-end runs on a separate origin; keep CORS open.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.max_upload_bytes + UPLOAD_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(serve_index))
        .route("/health", get(health))
        .route("/ocr", post(analyze_upload))
        .route("/analyze", post(analyze_manual))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": APP_VERSION }))
}

async fn analyze_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            match field.bytes().await {
                Ok(bytes) => file = Some((filename, bytes.to_vec())),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read upload body, serving demo payload");
                    return Json(demo_report()).into_response();
                }
            }
        }
    }

    let Some((filename, bytes)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "No file provided.".into(),
            }),
        )
            .into_response();
    };

    tracing::info!(
        filename = %filename,
        size_bytes = bytes.len(),
        mime = detect_mime_from_bytes(&bytes),
        received_at = %chrono::Local::now().naive_local(),
        "Prescription upload received"
    );

    let report = match StagedUpload::stage(&state.config.staging_dir, &filename, &bytes) {
        Ok(staged) => {
            let pipeline = state.pipeline.clone();
            // The staged file rides into the blocking task; Drop removes it
            // when analysis finishes, on success and error alike.
            match tokio::task::spawn_blocking(move || pipeline.analyze_file(staged.path())).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(error = %e, "Analysis task failed, serving demo payload");
                    demo_report()
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to stage upload, serving demo payload");
            demo_report()
        }
    };

    Json(report).into_response()
}

async fn analyze_manual(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ManualAnalysisRequest>,
) -> Response {
    let drugs: Vec<Drug> = request
        .drugs
        .into_iter()
        .filter(|d| !d.name.trim().is_empty())
        .collect();

    if drugs.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "No drugs provided.".into(),
            }),
        )
            .into_response();
    }

    let pipeline = state.pipeline.clone();
    let (drugs, findings) =
        match tokio::task::spawn_blocking(move || {
            let findings = pipeline.analyze_drugs(&drugs);
            (drugs, findings)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Manual analysis task failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Analysis failed.".into(),
                    }),
                )
                    .into_response();
            }
        };

    let mut recommendations = findings.recommendations;
    if recommendations.is_empty() {
        recommendations.push(MANUAL_ANALYSIS_NOTE.to_string());
    }

    Json(ManualAnalysisResponse {
        drugs,
        interactions: findings.interactions,
        recommendations,
        alternatives: findings.alternatives,
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Embedded front-end
// ---------------------------------------------------------------------------

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>rxscan — Prescription Analyzer</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
      background: #fafaf9; color: #1c1917; max-width: 720px;
      margin: 0 auto; padding: 32px 24px;
    }
    h1 { font-size: 26px; margin-bottom: 4px; }
    h2 { font-size: 18px; margin: 24px 0 12px; }
    p.sub { color: #78716c; font-size: 14px; margin-bottom: 24px; }
    .row { display: flex; gap: 12px; margin-bottom: 12px; }
    .row input { flex: 1; }
    input, select {
      padding: 10px 12px; border: 1px solid #d6d3d1; border-radius: 8px;
      font-size: 15px; outline: none; width: 100%;
    }
    input:focus { border-color: #4a7c59; }
    .btn {
      padding: 12px 20px; border-radius: 8px; border: none; cursor: pointer;
      font-size: 15px; font-weight: 500; background: #4a7c59; color: white;
    }
    .btn:disabled { opacity: 0.5; cursor: not-allowed; }
    .btn-link { background: none; color: #4a7c59; padding: 8px 0; }
    .tabs { display: flex; gap: 8px; margin-bottom: 16px; }
    .tabs button {
      flex: 1; padding: 10px; border: 1px solid #d6d3d1; background: white;
      border-radius: 8px; cursor: pointer; font-size: 15px;
    }
    .tabs button.active { border-color: #4a7c59; color: #4a7c59; font-weight: 600; }
    .card {
      background: white; border: 1px solid #e7e5e4; border-radius: 12px;
      padding: 16px; margin-bottom: 12px;
    }
    .notice { color: #b45309; font-size: 14px; margin-bottom: 12px; }
    .ok { color: #16a34a; }
    .severity { color: #dc2626; font-weight: 600; }
    pre {
      background: #f5f5f4; border-radius: 8px; padding: 12px;
      white-space: pre-wrap; font-size: 13px;
    }
    #results { display: none; }
  </style>
</head>
<body>
  <h1>rxscan</h1>
  <p class="sub">Upload a prescription image or enter drugs manually to check
  interactions, alternatives, and recommendations.</p>

  <h2>Patient</h2>
  <div class="row">
    <input id="patient-name" placeholder="Name" value="Demo User">
    <input id="patient-age" type="number" placeholder="Age" value="30">
    <input id="patient-weight" type="number" placeholder="Weight (kg)" value="70">
  </div>

  <h2>Prescription</h2>
  <div class="tabs">
    <button id="tab-upload" class="active">Upload image</button>
    <button id="tab-manual">Manual entry</button>
  </div>

  <div id="pane-upload">
    <div class="row"><input id="file" type="file" accept="image/*,.pdf"></div>
    <button class="btn" id="btn-upload">Analyze prescription image</button>
  </div>

  <div id="pane-manual" style="display:none">
    <div id="manual-rows"></div>
    <button class="btn-link" id="btn-add-row">+ Add drug</button><br>
    <button class="btn" id="btn-manual">Analyze entered drugs</button>
  </div>

  <div id="results">
    <h2>Results</h2>
    <div class="notice" id="fallback-note" style="display:none">
      Extraction failed or found nothing — showing demo data.
    </div>
    <div class="card" id="text-card" style="display:none">
      <strong>Extracted text</strong>
      <pre id="ocr-text"></pre>
    </div>
    <div class="card"><strong>Drugs</strong><div id="drug-list"></div></div>
    <div class="card"><strong>Interactions</strong><div id="interaction-list"></div></div>
    <div class="card"><strong>Recommendations</strong><div id="rec-list"></div></div>
    <div class="card"><strong>Alternatives</strong><div id="alt-list"></div></div>
  </div>

  <script>
    var tabUpload = document.getElementById('tab-upload');
    var tabManual = document.getElementById('tab-manual');
    var paneUpload = document.getElementById('pane-upload');
    var paneManual = document.getElementById('pane-manual');

    tabUpload.onclick = function () { setMode('upload'); };
    tabManual.onclick = function () { setMode('manual'); };

    function setMode(mode) {
      var upload = mode === 'upload';
      tabUpload.classList.toggle('active', upload);
      tabManual.classList.toggle('active', !upload);
      paneUpload.style.display = upload ? '' : 'none';
      paneManual.style.display = upload ? 'none' : '';
    }

    var manualRows = document.getElementById('manual-rows');
    function addRow() {
      var row = document.createElement('div');
      row.className = 'row';
      row.innerHTML =
        '<input placeholder="Drug name" class="m-name">' +
        '<input placeholder="Dosage" class="m-dosage">' +
        '<input placeholder="Frequency" class="m-frequency">';
      manualRows.appendChild(row);
    }
    addRow();
    document.getElementById('btn-add-row').onclick = addRow;

    document.getElementById('btn-upload').onclick = function () {
      var input = document.getElementById('file');
      if (!input.files.length) { alert('Choose a file first.'); return; }
      var form = new FormData();
      form.append('file', input.files[0]);
      fetch('/ocr', { method: 'POST', body: form })
        .then(function (r) { return r.json(); })
        .then(function (data) { render(data, true); })
        .catch(function (e) { alert('Analysis failed: ' + e); });
    };

    document.getElementById('btn-manual').onclick = function () {
      var drugs = [];
      manualRows.querySelectorAll('.row').forEach(function (row) {
        var name = row.querySelector('.m-name').value.trim();
        if (!name) return;
        drugs.push({
          name: name,
          dosage: row.querySelector('.m-dosage').value.trim(),
          frequency: row.querySelector('.m-frequency').value.trim(),
          route: 'oral'
        });
      });
      if (!drugs.length) { alert('Enter at least one drug.'); return; }
      fetch('/analyze', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ drugs: drugs })
      })
        .then(function (r) { return r.json(); })
        .then(function (data) { render(data, false); })
        .catch(function (e) { alert('Analysis failed: ' + e); });
    };

    function render(data, fromUpload) {
      document.getElementById('results').style.display = 'block';
      document.getElementById('fallback-note').style.display =
        data.source === 'demo_fallback' ? '' : 'none';

      var textCard = document.getElementById('text-card');
      if (fromUpload && data.text) {
        textCard.style.display = '';
        document.getElementById('ocr-text').textContent = data.text;
      } else {
        textCard.style.display = 'none';
      }

      var drugs = (data.drugs || []).map(function (d) {
        return '<div>' + d.name + ' — ' + (d.dosage || '?') + ' — ' +
          (d.frequency || '?') + '</div>';
      });
      document.getElementById('drug-list').innerHTML =
        drugs.join('') || '<div>None</div>';

      var inters = (data.interactions || []).map(function (i) {
        return '<div>' + i.drug1 + ' + ' + i.drug2 + ': ' + i.description +
          ' <span class="severity">(' + i.severity + ')</span><br>' +
          i.recommendation + '</div>';
      });
      document.getElementById('interaction-list').innerHTML =
        inters.join('') || '<div class="ok">No harmful interactions detected.</div>';

      var recs = (data.recommendations || []).map(function (r) {
        return '<div>' + r + '</div>';
      });
      document.getElementById('rec-list').innerHTML =
        recs.join('') || '<div>None</div>';

      var alts = (data.alternatives || []).map(function (a) {
        var line = 'Replace ' + a.originalDrug + ' with ' + a.alternative +
          ' — ' + a.reason;
        if (a.dosageAdjustment) line += '<br>Dosage guidance: ' + a.dosageAdjustment;
        return '<div>' + line + '</div>';
      });
      document.getElementById('alt-list').innerHTML =
        alts.join('') || '<div>None</div>';
    }
  </script>
</body>
</html>"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::models::{ReportSource, DEMO_TEXT};
    use crate::pipeline::interactions::StubInteractionService;
    use crate::pipeline::ner::LexiconRecognizer;
    use crate::pipeline::ocr::MockOcr;

    fn test_app(ocr: MockOcr) -> (Router, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig {
            staging_dir: tmp.path().join("staging"),
            ..AnalyzerConfig::default()
        };
        let pipeline = Arc::new(PrescriptionPipeline::new(
            Arc::new(ocr),
            Arc::new(LexiconRecognizer::with_builtin_lexicon()),
            Arc::new(StubInteractionService),
        ));
        let app = router(Arc::new(AppState { config, pipeline }));
        (app, tmp)
    }

    fn multipart_request(field_name: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "rxscan-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field_name}\"; \
                 filename=\"rx.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/ocr")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_response_shape() {
        let (app, _tmp) = test_app(MockOcr::with_text("x", 0.5));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(!json["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_serves_front_end() {
        let (app, _tmp) = test_app(MockOcr::with_text("x", 0.5));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("<html"));
        assert!(html.contains("/ocr"));
    }

    #[tokio::test]
    async fn upload_with_real_extraction_passes_through() {
        let (app, _tmp) = test_app(MockOcr::with_text(
            "Patient: take Aspirin 325mg twice daily",
            0.9,
        ));
        let response = app
            .oneshot(multipart_request("file", b"pretend-png-bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["text"], "Patient: take Aspirin 325mg twice daily");
        assert_eq!(json["drugs"][0]["name"], "Aspirin");
        assert_eq!(json["drugs"][0]["dosage"], "325mg");
        assert_eq!(json["source"], "extracted");
        assert_eq!(json["interactions"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn upload_with_failing_ocr_serves_demo_with_200() {
        let (app, _tmp) = test_app(MockOcr::failing("unreadable"));
        let response = app
            .oneshot(multipart_request("file", b"not-an-image"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["text"], DEMO_TEXT);
        assert_eq!(json["drugs"].as_array().unwrap().len(), 2);
        assert_eq!(json["drugs"][0]["name"], "Aspirin");
        assert_eq!(json["source"], "demo_fallback");
        assert!(json["interactions"].as_array().unwrap().is_empty());
        assert!(json["recommendations"].as_array().unwrap().is_empty());
        assert!(json["alternatives"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_with_empty_ocr_text_serves_demo() {
        let (app, _tmp) = test_app(MockOcr::with_text("  \n ", 0.1));
        let response = app
            .oneshot(multipart_request("file", b"blank-scan"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["text"], DEMO_TEXT);
        assert_eq!(json["source"], "demo_fallback");
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let (app, _tmp) = test_app(MockOcr::with_text("x", 0.5));
        let response = app
            .oneshot(multipart_request("attachment", b"bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = response_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("No file"));
    }

    #[tokio::test]
    async fn upload_leaves_no_staged_files_behind() {
        let (app, tmp) = test_app(MockOcr::failing("bad scan"));
        let response = app
            .oneshot(multipart_request("file", b"bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let staging = tmp.path().join("staging");
        let leftovers: Vec<_> = std::fs::read_dir(&staging)
            .map(|entries| entries.filter_map(Result::ok).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty(), "staging dir should be empty");
    }

    #[tokio::test]
    async fn manual_analysis_returns_placeholder_recommendation() {
        let (app, _tmp) = test_app(MockOcr::with_text("x", 0.5));
        let body = r#"{"drugs":[{"name":"Aspirin","dosage":"325mg","frequency":"twice daily","route":"oral"}]}"#;
        let response = app
            .oneshot(
                Request::post("/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["drugs"][0]["name"], "Aspirin");
        assert_eq!(json["drugs"][0]["route"], "oral");
        assert_eq!(
            json["recommendations"][0],
            "Manual analysis not connected to backend."
        );
        assert!(json["interactions"].as_array().unwrap().is_empty());
        assert!(json["alternatives"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_analysis_rejects_empty_drug_list() {
        let (app, _tmp) = test_app(MockOcr::with_text("x", 0.5));
        let response = app
            .oneshot(
                Request::post("/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"drugs":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_analysis_skips_blank_names() {
        let (app, _tmp) = test_app(MockOcr::with_text("x", 0.5));
        let body = r#"{"drugs":[{"name":"  "},{"name":"Metformin"}]}"#;
        let response = app
            .oneshot(
                Request::post("/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let drugs = json["drugs"].as_array().unwrap();
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0]["name"], "Metformin");
    }

    #[test]
    fn report_source_reaches_the_wire() {
        // Front-end keys off these exact values.
        assert_eq!(
            serde_json::to_value(ReportSource::DemoFallback).unwrap(),
            "demo_fallback"
        );
    }
}
