use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use assess::{ApplicableControls, AssessError, ControlResult, CoverageSummary};
use controls::Control;

use crate::metrics::{MetricsSnapshot, TimedOperation};
use crate::state::AppContext;

pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
struct HealthResponse {
    vector_store: String,
    llm: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub collection_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub applicable_controls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub filename: String,
    pub collection_name: String,
    pub extracted_chars: usize,
    pub indexed_chunks: usize,
    pub results: Vec<ControlResult>,
    pub summary: CoverageSummary,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: Option<String>,
    pub collection_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub control_id: Option<String>,
    pub control_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DraftResponse {
    pub draft: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RisksResponse {
    pub risks: String,
}

pub fn router(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/documents", post(upload_document))
        .route("/documents/:filename/analysis", post(analyze_document))
        .route("/chat", post(chat))
        .route("/generate_draft", post(generate_draft))
        .route("/identify_risks", post(identify_risks))
        .route("/controls", get(list_controls))
        .route("/stats", get(get_stats))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn track_requests(State(state): State<Arc<AppContext>>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    state.metrics.record_request(response.status().is_success());
    response
}

async fn health_check(State(state): State<Arc<AppContext>>) -> Json<HealthResponse> {
    let vector_store = match state.index.store().ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    let llm = match state.llm.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    Json(HealthResponse { vector_store, llm })
}

async fn upload_document(State(state): State<Arc<AppContext>>, mut multipart: Multipart) -> ApiResult<UploadResponse> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        upload = Some((original, data));
        break;
    }

    let Some((original, data)) = upload else {
        return Err(ApiError::bad_request("No file part in the request"));
    };
    if original.trim().is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if !ingest::is_allowed(&original) {
        return Err(ApiError::bad_request(format!(
            "Unsupported file format. Allowed extensions: {}",
            ingest::ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let filename = ingest::secure_filename(&original);
    if filename.is_empty() || !ingest::is_allowed(&filename) {
        return Err(ApiError::bad_request("Invalid file name"));
    }

    let path = state.upload_dir.join(&filename);
    tokio::fs::write(&path, &data).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Failed to store upload");
        ApiError::internal("Failed to store the uploaded file")
    })?;

    state.metrics.record_upload();
    tracing::info!(filename = %filename, bytes = data.len(), "Document uploaded");

    Ok(Json(UploadResponse {
        collection_name: ingest::collection_name(&filename),
        filename,
    }))
}

async fn analyze_document(
    State(state): State<Arc<AppContext>>,
    Path(filename): Path<String>,
    body: Bytes,
) -> ApiResult<AnalysisResponse> {
    if ingest::secure_filename(&filename) != filename || !ingest::is_allowed(&filename) {
        return Err(ApiError::bad_request("Invalid or unsupported file name"));
    }

    let path = state.upload_dir.join(&filename);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ApiError::not_found(format!("Document '{filename}' not found")));
    }

    let request = parse_analysis_request(&body)?;
    let applicable = ApplicableControls::only(request.applicable_controls);
    let timer = TimedOperation::start();

    let document = ingest::load_document(&path)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut response = AnalysisResponse {
        filename: document.filename.clone(),
        collection_name: document.collection.clone(),
        extracted_chars: document.text.chars().count(),
        indexed_chunks: 0,
        results: Vec::new(),
        summary: CoverageSummary::default(),
        warnings: Vec::new(),
    };

    if document.is_empty() {
        tracing::warn!(filename = %filename, "No text could be extracted");
        response
            .warnings
            .push("Could not extract text from the document, or the document is empty.".to_string());
        return Ok(Json(response));
    }

    match state.index.index_document(&document.text, &document.collection).await {
        Ok(report) => {
            state.metrics.record_index(report.chunks_indexed);
            response.indexed_chunks = report.chunks_indexed;
        }
        Err(e) => {
            tracing::warn!(collection = %document.collection, error = %e, "Indexing failed");
            response
                .warnings
                .push(format!("The document could not be indexed for chat: {e}"));
        }
    }

    let report = state
        .assessor
        .assess(&document.text, &applicable)
        .await
        .map_err(|e| match e {
            AssessError::CatalogueUnavailable(inner) => ApiError::unavailable(format!(
                "Could not load the ISO 27001 controls: {inner}"
            )),
        })?;

    state.metrics.record_analysis(timer.elapsed(), &report.summary);
    response.results = report.results;
    response.summary = report.summary;

    Ok(Json(response))
}

/// An empty body means every control applies; anything else must be a
/// well-formed [`AnalysisRequest`].
fn parse_analysis_request(body: &[u8]) -> Result<AnalysisRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AnalysisRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid analysis request: {e}")))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("Missing required field '{field}'"))),
    }
}

async fn chat(
    State(state): State<Arc<AppContext>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let Json(request) = body?;
    let question = required(request.question, "question")?;
    let collection = required(request.collection_name, "collection_name")?;

    let timer = TimedOperation::start();
    let answer = state.chat.answer(&question, &collection).await;
    state.metrics.record_chat(timer.elapsed());

    Ok(Json(ChatResponse { answer }))
}

async fn generate_draft(
    State(state): State<Arc<AppContext>>,
    body: Result<Json<ControlRequest>, JsonRejection>,
) -> ApiResult<DraftResponse> {
    let Json(request) = body?;
    let control_id = required(request.control_id, "control_id")?;
    let description = required(request.control_description, "control_description")?;

    let draft = state.advisor.draft_policy(&control_id, &description).await;
    state.metrics.record_generation();
    Ok(Json(DraftResponse { draft }))
}

async fn identify_risks(
    State(state): State<Arc<AppContext>>,
    body: Result<Json<ControlRequest>, JsonRejection>,
) -> ApiResult<RisksResponse> {
    let Json(request) = body?;
    let control_id = required(request.control_id, "control_id")?;
    let description = required(request.control_description, "control_description")?;

    let risks = state.advisor.identify_risks(&control_id, &description).await;
    state.metrics.record_generation();
    Ok(Json(RisksResponse { risks }))
}

async fn list_controls(State(state): State<Arc<AppContext>>) -> ApiResult<Vec<Control>> {
    state
        .catalogue
        .load()
        .map(Json)
        .map_err(|e| ApiError::unavailable(format!("Could not load the ISO 27001 controls: {e}")))
}

async fn get_stats(State(state): State<Arc<AppContext>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use assess::mock::MockModel;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, header};
    use controls::{ControlSource, ControlStore, StaticCatalogue};
    use http_body_util::BodyExt;
    use index::InMemoryVectorStore;
    use index::mock::MockEmbedder;
    use std::io::Write;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-COMPLIANCE-BOUNDARY";
    const COVERED: &str = r#"{"status": "Covered", "justification": "Section 2 defines it."}"#;

    struct Harness {
        app: Router,
        llm: Arc<MockModel>,
        dir: tempfile::TempDir,
    }

    fn harness_with(catalogue: Arc<dyn ControlSource>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.server.upload_dir = dir.path().to_path_buf();

        let llm = Arc::new(MockModel::replying(COVERED));
        let context = AppContext::from_parts(
            &config,
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MockEmbedder::default()),
            llm.clone(),
            catalogue,
        );
        Harness {
            app: router(Arc::new(context)),
            llm,
            dir,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(StaticCatalogue(vec![
            Control::new("A.5.1", "Policies for information security"),
            Control::new("A.5.15", "Access control"),
            Control::new("A.8.13", "Information backup"),
        ])))
    }

    fn json_request(uri: &str, body: serde_json::Value) -> HttpRequest<Body> {
        HttpRequest::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(filename: &str, data: &[u8]) -> HttpRequest<Body> {
        let mut body = Vec::new();
        write!(
            body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .unwrap();
        body.extend_from_slice(data);
        write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();

        HttpRequest::post("/documents")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn write_docx(path: &std::path::Path, paragraphs: &[&str]) {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    async fn send(app: &Router, request: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn chat_without_question_is_rejected_before_the_model() {
        let h = harness();
        let (status, body) = send(&h.app, json_request("/chat", serde_json::json!({"collection_name": "policy"}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("question"));

        let (status, _) = send(&h.app, json_request("/chat", serde_json::json!({"question": "Who?"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn chat_on_unknown_collection_returns_fixed_message() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            json_request("/chat", serde_json::json!({"question": "Who?", "collection_name": "nothing"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], query::CHAT_FAILURE);
    }

    #[tokio::test]
    async fn draft_requires_both_fields() {
        let h = harness();
        let (status, _) = send(&h.app, json_request("/generate_draft", serde_json::json!({"control_id": "A.8.13"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &h.app,
            json_request(
                "/generate_draft",
                serde_json::json!({"control_id": "A.8.13", "control_description": "Information backup"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["draft"], COVERED);
    }

    #[tokio::test]
    async fn risks_endpoint_returns_model_text() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            json_request(
                "/identify_risks",
                serde_json::json!({"control_id": "A.8.13", "control_description": "Information backup"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["risks"].is_string());
        assert_eq!(h.llm.calls(), 1);
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_extension() {
        let h = harness();
        let (status, body) = send(&h.app, multipart_request("notes.txt", b"hello")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("pdf"));
        assert!(!h.dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn upload_sanitises_and_stores_file() {
        let h = harness();
        let (status, body) = send(&h.app, multipart_request("../Security Policy.pdf", b"%PDF-1.4")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "Security_Policy.pdf");
        assert_eq!(body["collection_name"], "Security_Policy");
        assert!(h.dir.path().join("Security_Policy.pdf").exists());
    }

    #[tokio::test]
    async fn analysis_of_unknown_document_is_not_found() {
        let h = harness();
        let (status, _) = send(&h.app, json_request("/documents/missing.pdf/analysis", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn analysis_rejects_unsupported_name() {
        let h = harness();
        std::fs::write(h.dir.path().join("notes.txt"), "text").unwrap();
        let (status, _) = send(&h.app, json_request("/documents/notes.txt/analysis", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreadable_document_yields_warning_and_no_results() {
        let h = harness();
        std::fs::write(h.dir.path().join("broken.pdf"), "not really a pdf").unwrap();

        let (status, body) = send(&h.app, json_request("/documents/broken.pdf/analysis", serde_json::json!({}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 0);
        assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn analysis_indexes_and_assesses_document() {
        let h = harness();
        write_docx(
            &h.dir.path().join("policy.docx"),
            &["Information Security Policy", "This document defines our access control policy."],
        );

        let (status, body) = send(
            &h.app,
            json_request(
                "/documents/policy.docx/analysis",
                serde_json::json!({"applicable_controls": ["A.5.1", "A.8.13"]}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collection_name"], "policy");
        assert_eq!(body["indexed_chunks"], 1);

        let results = body["results"].as_array().unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r["control_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["A.5.1", "A.5.15", "A.8.13"]);
        assert_eq!(results[1]["status"], "Not Applicable");
        assert_eq!(body["summary"]["covered"], 2);
        assert_eq!(h.llm.calls(), 2);

        let (status, body) = send(
            &h.app,
            json_request("/chat", serde_json::json!({"question": "Is there an access policy?", "collection_name": "policy"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], COVERED);
    }

    #[tokio::test]
    async fn malformed_applicability_is_rejected_before_the_model() {
        let h = harness();
        write_docx(&h.dir.path().join("policy.docx"), &["Access is reviewed quarterly."]);

        let (status, body) = send(
            &h.app,
            json_request(
                "/documents/policy.docx/analysis",
                serde_json::json!({"applicable_controls": "A.5.1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid analysis request"));

        let truncated = HttpRequest::post("/documents/policy.docx/analysis")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"applicable_controls": ["A.5.1""#))
            .unwrap();
        let (status, _) = send(&h.app, truncated).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn empty_analysis_body_assesses_every_control() {
        let h = harness();
        write_docx(&h.dir.path().join("policy.docx"), &["Access is reviewed quarterly."]);

        let request = HttpRequest::post("/documents/policy.docx/analysis")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["covered"], 3);
        assert_eq!(h.llm.calls(), 3);
    }

    #[tokio::test]
    async fn missing_catalogue_is_service_unavailable() {
        let catalogue_dir = tempfile::tempdir().unwrap();
        let h = harness_with(Arc::new(ControlStore::new(catalogue_dir.path())));
        write_docx(&h.dir.path().join("policy.docx"), &["Backups run nightly."]);

        let (status, body) = send(&h.app, json_request("/documents/policy.docx/analysis", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("seed-controls"));

        let (status, _) = send(&h.app, HttpRequest::get("/controls").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn controls_and_health_and_stats() {
        let h = harness();

        let (status, body) = send(&h.app, HttpRequest::get("/controls").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = send(&h.app, HttpRequest::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vector_store"], "ok");
        assert_eq!(body["llm"], "ok");

        let (_, body) = send(&h.app, HttpRequest::get("/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(body["total_requests"], 2);
    }
}
