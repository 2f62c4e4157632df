pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Classification and configuration
        .route("/api/v1/domains", get(handlers::handle_list_domains))
        .route("/api/v1/classify", post(handlers::handle_classify))
        // Analysis
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/analyze/upload",
            post(handlers::handle_analyze_upload),
        )
        .route("/api/v1/validate", post(handlers::handle_validate))
        // Scoring backend
        .route(
            "/api/v1/scoring/status",
            get(handlers::handle_scoring_status),
        )
        .route("/api/v1/scoring/test", post(handlers::handle_scoring_test))
        .layer(body_limit)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::scoring::KeywordRiskScorer;
    use crate::config::{Config, ScorerBackend};

    fn keyword_state() -> AppState {
        AppState {
            config: Config {
                port: 0,
                rust_log: "info".to_string(),
                scorer_backend: ScorerBackend::Keyword,
                anthropic_api_key: None,
                anthropic_api_url: None,
                max_upload_bytes: 64 * 1024,
                max_scoring_attempts: 2,
            },
            llm: None,
            scorer: Arc::new(KeywordRiskScorer),
        }
    }

    async fn send(request: Request<Body>) -> Response {
        build_router(keyword_state()).oneshot(request).await.unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &str, &str)]) -> Request<Body> {
        let boundary = "contract-boundary";
        let mut body = String::new();
        for (name, file_name, content_type, content) in parts {
            body.push_str(&format!("--{boundary}\r\n"));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n"
                )),
            }
            body.push_str(&format!("Content-Type: {content_type}\r\n\r\n{content}\r\n"));
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        Request::post("/api/v1/analyze/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_domains_lists_every_config() {
        let response = send(Request::get("/api/v1/domains").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let domains = body.as_array().unwrap();
        assert_eq!(domains.len(), 10);
        assert_eq!(domains[0]["domain"], "finance");
        assert_eq!(domains[0]["penaltyMultiplier"], 1.2);
    }

    #[tokio::test]
    async fn test_classify() {
        let response = send(post_json(
            "/api/v1/classify",
            json!({"text": "The Tenant shall pay rent monthly.", "title": "Lease"}),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["domain"], "real_estate");
        assert_eq!(body["matchedTerm"], "tenant");
        assert_eq!(body["config"]["thresholds"]["low"], 28);
    }

    #[tokio::test]
    async fn test_classify_requires_input() {
        let response = send(post_json("/api/v1/classify", json!({"text": " "}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_with_keyword_scorer() {
        let text = "The Borrower shall repay the loan. Late payments accrue a penalty of 5%.";
        let response = send(post_json(
            "/api/v1/analyze",
            json!({"text": text, "title": "Loan"}),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["domain"], "finance");
        assert_eq!(body["scorerBackend"], "keyword");
        assert_eq!(body["attempts"], 1);
        assert_eq!(body["analysis"]["content"], text);
        let clause = &body["analysis"]["clauses"][0];
        let start = clause["startIndex"].as_u64().unwrap() as usize;
        let end = clause["endIndex"].as_u64().unwrap() as usize;
        let slice: String = text.chars().skip(start).take(end - start).collect();
        assert_eq!(clause["content"], slice.as_str());
    }

    #[tokio::test]
    async fn test_analyze_empty_text_is_bad_request() {
        let response = send(post_json("/api/v1/analyze", json!({"text": ""}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_validate_accepts_and_stamps() {
        let response = send(post_json(
            "/api/v1/validate",
            json!({
                "title": "NDA",
                "content": "Recipient keeps information confidential.",
                "riskScore": 12,
                "clauses": [],
                "keyIssues": [],
                "missingProtections": [],
                "riskBreakdown": {
                    "payment": 0, "liability": 10, "termination": 10,
                    "confidentiality": 5, "intellectual_property": 0
                },
                "plainLanguageSummary": "Low risk.",
                "confidence": 0.9
            }),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(body["analysisDate"].is_string());
    }

    #[tokio::test]
    async fn test_validate_rejects_with_field_path() {
        let response = send(post_json(
            "/api/v1/validate",
            json!({"title": "NDA", "content": "x", "riskScore": "high"}),
        ))
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["details"]["field"], "riskScore");
        assert_eq!(body["error"]["details"]["violation"]["kind"], "wrong_type");
    }

    #[tokio::test]
    async fn test_upload_plain_text() {
        let response = send(multipart_request(&[
            (
                "file",
                Some("Consulting Agreement.txt"),
                "text/plain",
                "The Consultant will provide advisory services. Fees are non-refundable.",
            ),
        ]))
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["domain"], "professional");
        assert_eq!(body["analysis"]["title"], "Consulting Agreement");
        assert_eq!(body["document"]["kind"], "text");
        assert_eq!(body["document"]["fileName"], "Consulting Agreement.txt");
    }

    #[tokio::test]
    async fn test_upload_title_field_wins() {
        let response = send(multipart_request(&[
            ("title", None, "text/plain", "Advisory engagement"),
            ("file", Some("a.txt"), "text/plain", "The consultant advises."),
        ]))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["analysis"]["title"],
            "Advisory engagement"
        );
    }

    #[tokio::test]
    async fn test_upload_docx_is_unsupported_media() {
        let response = send(multipart_request(&[(
            "file",
            Some("contract.docx"),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "PK",
        )]))
        .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let response = send(multipart_request(&[("title", None, "text/plain", "Lease")])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scoring_status_reports_keyword_backend() {
        let response = send(
            Request::get("/api/v1/scoring/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["backend"], "keyword");
        assert!(body["model"].is_null());
    }

    #[tokio::test]
    async fn test_scoring_test_not_implemented_without_llm() {
        let response = send(post_json("/api/v1/scoring/test", json!({"prompt": "ping"}))).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
