use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, get_service, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::services::ServeDir;
use tracing::info;

use crate::{
    config::GreeterConfig,
    error::{ErrorKind, GenerationFailure},
    llm::{self, Transport},
    models::{ConnectionProbeResult, GenerationRequest, Protocol},
    prompt::default_instructions,
};

pub const DEFAULT_ADDR: &str = "127.0.0.1:5173";

/**
 * \brief 服务共享状态：启动时的默认配置与传输实现，均只读。
 */
#[derive(Clone)]
pub struct AppState {
    defaults: Arc<GreeterConfig>,
    transport: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(defaults: GreeterConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            defaults: Arc::new(defaults),
            transport,
        }
    }
}

/**
 * \brief 构建路由：API 与静态前端。
 */
pub fn router(state: AppState) -> Router {
    let ui_root = std::env::var("JOBGREET_UI_DIR").unwrap_or_else(|_| "ui/dist".to_string());
    let static_service =
        get_service(ServeDir::new(ui_root).append_index_html_on_directories(true));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/default-prompt", get(get_default_prompt))
        .route("/api/test-connection", post(test_api_connection))
        .route("/api/generate", post(generate))
        .fallback_service(static_service)
        .with_state(state)
}

/**
 * \brief 启动本地 HTTP 服务，提供静态前端与 API。
 * \param addr 监听地址，如 "127.0.0.1:5173"
 */
pub async fn run(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {} failed", addr))?;
    info!(addr, "ui server started");
    println!("Server listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Deserialize)]
struct ProbeRequestDto {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    protocol: Option<Protocol>,
}

#[derive(Deserialize)]
struct GenerateRequestDto {
    /** \brief 岗位 JD */
    jd: String,
    #[serde(default)]
    resume: Option<String>,
    #[serde(default)]
    custom_prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    protocol: Option<Protocol>,
}

#[derive(Serialize)]
struct GenerateResponseDto {
    text: String,
}

type ApiError = (StatusCode, Json<GenerationFailure>);

async fn health_check() -> Json<Value> {
    Json(json!({"ok": true}))
}

async fn get_default_prompt() -> Json<Value> {
    Json(json!({"prompt": default_instructions()}))
}

/**
 * \brief 连通性测试：未提供的字段使用启动配置。
 */
async fn test_api_connection(
    State(state): State<AppState>,
    Json(payload): Json<ProbeRequestDto>,
) -> Json<ConnectionProbeResult> {
    let defaults = &state.defaults;
    let domain = payload.domain.unwrap_or_else(|| defaults.domain.clone());
    let api_key = payload.api_key.unwrap_or_else(|| defaults.api_key.clone());
    let protocol = payload.protocol.unwrap_or(defaults.protocol);
    Json(llm::test_connection(state.transport.as_ref(), &domain, &api_key, protocol).await)
}

/**
 * \brief 生成打招呼语：失败时返回分类后的错误与对应状态码。
 */
async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequestDto>,
) -> Result<Json<GenerateResponseDto>, ApiError> {
    if payload.jd.trim().is_empty() {
        return Err(api_error(GenerationFailure::validation(
            "job description must not be empty",
        )));
    }
    let defaults = &state.defaults;
    let request = GenerationRequest {
        model: payload.model.unwrap_or_else(|| defaults.model.clone()),
        api_key: payload.api_key.unwrap_or_else(|| defaults.api_key.clone()),
        domain: payload.domain.unwrap_or_else(|| defaults.domain.clone()),
        protocol: payload.protocol.unwrap_or(defaults.protocol),
        job_description: payload.jd,
        resume_text: payload
            .resume
            .unwrap_or_else(|| defaults.resume_text.clone()),
        custom_instructions: payload
            .custom_prompt
            .or_else(|| defaults.custom_instructions.clone()),
    };
    llm::generate_greeting(state.transport.as_ref(), &request)
        .await
        .map(|result| Json(GenerateResponseDto { text: result.text }))
        .map_err(api_error)
}

fn api_error(failure: GenerationFailure) -> ApiError {
    (status_for(failure.kind), Json(failure))
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::NoResponse => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::RemoteError | ErrorKind::MalformedResponse | ErrorKind::RequestSetupError => {
            StatusCode::BAD_GATEWAY
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::llm::mock::MockTransport;

    fn state_with(transport: Arc<MockTransport>) -> AppState {
        let defaults = GreeterConfig {
            api_key: "sk-server".into(),
            ..Default::default()
        };
        AppState::new(defaults, transport)
    }

    async fn call(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_default_prompt() {
        let transport = Arc::new(MockTransport::replying(200, "{}"));
        let app = router(state_with(transport));
        let (status, body) = call(app.clone(), "GET", "/api/health", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, body) = call(app, "GET", "/api/default-prompt", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prompt"], default_instructions());
    }

    #[tokio::test]
    async fn test_generate_success_uses_defaults() {
        let transport = Arc::new(MockTransport::replying(
            200,
            r#"{"choices":[{"message":{"content":" 您好，我 "}}]}"#,
        ));
        let app = router(state_with(transport.clone()));
        let (status, body) = call(app, "POST", "/api/generate", json!({"jd": "招聘"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "您好，我");
        assert_eq!(
            transport.last_url().as_deref(),
            Some("https://api.openai.com/v1/chat/completions")
        );
    }

    #[tokio::test]
    async fn test_generate_failures_map_to_status() {
        let transport = Arc::new(MockTransport::replying(429, "{}"));
        let app = router(state_with(transport));
        let (status, body) = call(app, "POST", "/api/generate", json!({"jd": "招聘"})).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["kind"], "RateLimited");

        let transport = Arc::new(MockTransport::replying(200, "{}"));
        let app = router(state_with(transport.clone()));
        let (status, body) = call(
            app,
            "POST",
            "/api/generate",
            json!({"jd": "招聘", "api_key": ""}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "ValidationError");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_rejects_blank_jd() {
        let transport = Arc::new(MockTransport::replying(200, "{}"));
        let app = router(state_with(transport.clone()));
        let (status, _) = call(app, "POST", "/api/generate", json!({"jd": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_probe_route() {
        let transport = Arc::new(MockTransport::replying(200, "[]"));
        let app = router(state_with(transport.clone()));
        let (status, body) = call(
            app,
            "POST",
            "/api/test-connection",
            json!({"domain": "http://proxy.local/", "protocol": "http"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            transport.last_url().as_deref(),
            Some("http://proxy.local/v1/models")
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::NoResponse), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorKind::MalformedResponse), StatusCode::BAD_GATEWAY);
    }
}
