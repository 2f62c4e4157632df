use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::analysis::domain::{classify_with_evidence, DomainTag};
use crate::analysis::models::ContractAnalysis;
use crate::analysis::pipeline::{analyze_contract, AnalysisReport};
use crate::analysis::risk_config::{all_configs, resolve, DomainConfig};
use crate::analysis::scoring::ScoringError;
use crate::analysis::validation::validate;
use crate::errors::AppError;
use crate::extraction::{extract, DocumentKind, ExtractedDocument, ExtractionError};
use crate::llm_client;
use crate::state::AppState;

const UNTITLED: &str = "Untitled contract";
const SCORING_TEST_SYSTEM: &str = "You are checking an API connection. Answer briefly.";

#[derive(Deserialize)]
pub struct ContractInput {
    pub text: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    pub domain: DomainTag,
    pub matched_term: Option<String>,
    pub config: &'static DomainConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(flatten)]
    pub report: AnalysisReport,
    pub document: DocumentInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub file_name: Option<String>,
    pub kind: DocumentKind,
    pub page_count: Option<usize>,
    pub characters: usize,
}

#[derive(Serialize)]
pub struct ScoringStatus {
    pub backend: &'static str,
    pub model: Option<&'static str>,
}

#[derive(Deserialize)]
pub struct PromptTest {
    pub prompt: String,
}

#[derive(Serialize)]
pub struct PromptTestResponse {
    pub response: String,
}

fn title_or_default(title: &str) -> &str {
    let title = title.trim();
    if title.is_empty() {
        UNTITLED
    } else {
        title
    }
}

/// GET /api/v1/domains
pub async fn handle_list_domains() -> Json<Vec<&'static DomainConfig>> {
    Json(all_configs())
}

/// POST /api/v1/classify
pub async fn handle_classify(
    Json(req): Json<ContractInput>,
) -> Result<Json<ClassifyResponse>, AppError> {
    if req.text.trim().is_empty() && req.title.trim().is_empty() {
        return Err(AppError::Validation(
            "text or title is required".to_string(),
        ));
    }
    let classification = classify_with_evidence(&req.text, &req.title);
    Ok(Json(ClassifyResponse {
        domain: classification.domain,
        matched_term: classification.matched_term,
        config: resolve(classification.domain),
    }))
}

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<ContractInput>,
) -> Result<Json<AnalysisReport>, AppError> {
    let report = analyze_contract(
        state.scorer.as_ref(),
        &req.text,
        title_or_default(&req.title),
        state.config.max_scoring_attempts,
    )
    .await?;
    Ok(Json(report))
}

/// POST /api/v1/analyze/upload
///
/// Multipart fields: `file` (required) and `title` (optional; defaults to the
/// file name).
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(Option<String>, Option<String>, bytes::Bytes)> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read file: {e}")))?;
                upload = Some((file_name, content_type, data));
            }
            Some("title") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read title: {e}")))?;
                title = Some(text);
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) = upload
        .ok_or_else(|| AppError::Validation("multipart field 'file' is required".to_string()))?;

    let kind = DocumentKind::detect(file_name.as_deref(), content_type.as_deref(), &data)
        .ok_or_else(|| {
            ExtractionError::UnsupportedFormat(format!(
                "{} ({})",
                file_name.as_deref().unwrap_or("upload"),
                content_type.as_deref().unwrap_or("unknown type")
            ))
        })?;

    info!(
        file_name = ?file_name,
        kind = ?kind,
        bytes = data.len(),
        "Contract upload received"
    );

    let document: ExtractedDocument = tokio::task::spawn_blocking(move || extract(&data, kind))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("extraction task failed: {e}")))??;

    let title = title
        .filter(|t| !t.trim().is_empty())
        .or_else(|| file_name.as_deref().map(file_stem))
        .unwrap_or_else(|| UNTITLED.to_string());

    let report = analyze_contract(
        state.scorer.as_ref(),
        &document.text,
        &title,
        state.config.max_scoring_attempts,
    )
    .await?;

    Ok(Json(UploadResponse {
        document: DocumentInfo {
            file_name,
            kind: document.kind,
            page_count: document.page_count,
            characters: document.text.chars().count(),
        },
        report,
    }))
}

fn file_stem(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

/// POST /api/v1/validate
///
/// Runs a candidate analysis through the validator alone.
pub async fn handle_validate(
    Json(candidate): Json<Value>,
) -> Result<Json<ContractAnalysis>, AppError> {
    Ok(Json(validate(&candidate)?))
}

/// GET /api/v1/scoring/status
pub async fn handle_scoring_status(State(state): State<AppState>) -> Json<ScoringStatus> {
    Json(ScoringStatus {
        backend: state.scorer.backend(),
        model: state.llm.as_ref().map(|_| llm_client::MODEL),
    })
}

/// POST /api/v1/scoring/test
///
/// Pass-through prompt for checking the model connection. Only available with
/// the LLM backend.
pub async fn handle_scoring_test(
    State(state): State<AppState>,
    Json(req): Json<PromptTest>,
) -> Result<Json<PromptTestResponse>, AppError> {
    let llm = state.llm.as_ref().ok_or(AppError::NotImplemented)?;
    if req.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt is required".to_string()));
    }
    let response = llm
        .call_text(&req.prompt, SCORING_TEST_SYSTEM)
        .await
        .map_err(ScoringError::from)?;
    Ok(Json(PromptTestResponse { response }))
}
