use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::{redact, ErrorKind, GenerationFailure, REDACTED};
use crate::models::{
    ChatCompletionRequest, ChatCompletionResponse, ConnectionProbeResult, GenerationRequest,
    GenerationResult, Message, Protocol,
};
use crate::prompt::build_prompt;

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MODELS_PATH: &str = "/v1/models";

/** \brief 生成请求超时，超时按无响应处理。 */
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
/** \brief 连通性探测超时。 */
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/**
 * \brief 收到的 HTTP 响应：状态码与原始响应体。
 */
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/**
 * \brief 传输层失败：请求没能发出，或发出后没有拿到响应。
 */
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("{0}")]
    Setup(String),
    #[error("{0}")]
    NoResponse(String),
}

impl From<TransportError> for GenerationFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Setup(detail) => {
                GenerationFailure::new(ErrorKind::RequestSetupError, detail)
            }
            TransportError::NoResponse(detail) => GenerationFailure::new(
                ErrorKind::NoResponse,
                format!(
                    "no response from server, check the API domain and network connection ({detail})"
                ),
            ),
        }
    }
}

/**
 * \brief HTTP 交换的抽象，便于在测试中替换为内存实现。
 */
#[async_trait]
pub trait Transport: Send + Sync {
    /**
     * \brief 发送带 Bearer 认证的 JSON POST。
     */
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError>;

    /**
     * \brief 发送只带 Bearer 认证头的 GET。
     */
    async fn get(
        &self,
        url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError>;
}

/**
 * \brief 基于 reqwest 的默认实现。
 */
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Setup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .timeout(timeout)
            .json(body);
        send(req).await
    }

    async fn get(
        &self,
        url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        let req = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .timeout(timeout);
        send(req).await
    }
}

async fn send(req: reqwest::RequestBuilder) -> Result<HttpReply, TransportError> {
    let resp = req.send().await.map_err(map_reqwest_error)?;
    let status = resp.status().as_u16();
    let body = resp.text().await.map_err(map_reqwest_error)?;
    Ok(HttpReply { status, body })
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::Setup(format!("invalid request: {err}"))
    } else if err.is_timeout() {
        TransportError::NoResponse(format!("request timed out: {err}"))
    } else {
        TransportError::NoResponse(err.to_string())
    }
}

/**
 * \brief 规范化用户输入的域名：去掉首尾空白、协议前缀与结尾斜杠。
 *
 * 结果再次规范化保持不变。
 */
pub fn normalize_domain(domain: &str) -> String {
    let mut rest = domain.trim();
    while let Some(stripped) = strip_scheme(rest) {
        rest = stripped.trim_start();
    }
    rest.trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

fn strip_scheme(s: &str) -> Option<&str> {
    ["https://", "http://"].iter().find_map(|scheme| {
        let head = s.get(..scheme.len())?;
        if head.eq_ignore_ascii_case(scheme) {
            s.get(scheme.len()..)
        } else {
            None
        }
    })
}

/**
 * \brief 生成带协议、无结尾斜杠的 API 基地址。
 */
pub fn api_base_url(domain: &str, protocol: Protocol) -> String {
    format!("{}://{}", protocol, normalize_domain(domain))
}

fn validate(request: &GenerationRequest) -> Result<(), GenerationFailure> {
    if normalize_domain(&request.domain).is_empty() {
        return Err(GenerationFailure::validation("API domain must not be empty"));
    }
    if request.api_key.trim().is_empty() {
        return Err(GenerationFailure::validation("API key must not be empty"));
    }
    if request.model.trim().is_empty() {
        return Err(GenerationFailure::validation("model must not be empty"));
    }
    Ok(())
}

/**
 * \brief 调用 chat-completion 接口生成打招呼语。
 *
 * 所有失败都会被归类为 GenerationFailure，且不含 API Key。
 */
pub async fn generate_greeting(
    transport: &dyn Transport,
    request: &GenerationRequest,
) -> Result<GenerationResult, GenerationFailure> {
    validate(request)?;

    let url = format!(
        "{}{}",
        api_base_url(&request.domain, request.protocol),
        CHAT_COMPLETIONS_PATH
    );
    let prompt = build_prompt(
        &request.job_description,
        &request.resume_text,
        request.custom_instructions.as_deref(),
    );
    let prompt_len = prompt.chars().count();

    info!(
        url = %url,
        model = %request.model,
        prompt_len,
        has_key = !request.api_key.is_empty(),
        "sending chat completion request"
    );

    match exchange(transport, &url, request, prompt).await {
        Ok(result) => {
            info!(result_len = result.text.chars().count(), "chat completion succeeded");
            Ok(result)
        }
        Err(failure) => {
            let failure = failure.redacted(&request.api_key);
            error!(
                url = %url,
                model = %request.model,
                prompt_len,
                api_key = REDACTED,
                kind = %failure.kind,
                message = %failure.message,
                "chat completion failed"
            );
            Err(failure)
        }
    }
}

async fn exchange(
    transport: &dyn Transport,
    url: &str,
    request: &GenerationRequest,
    prompt: String,
) -> Result<GenerationResult, GenerationFailure> {
    let body = serde_json::to_value(ChatCompletionRequest {
        model: &request.model,
        messages: vec![Message::user(prompt)],
    })
    .map_err(|e| {
        GenerationFailure::new(
            ErrorKind::RequestSetupError,
            format!("failed to serialize request: {e}"),
        )
    })?;

    let reply = transport
        .post_json(url, &request.api_key, &body, GENERATION_TIMEOUT)
        .await?;

    if !(200..300).contains(&reply.status) {
        debug!(
            status = reply.status,
            body = %redact(&reply.body, &request.api_key),
            "api error detail"
        );
        return Err(GenerationFailure::from_status(reply.status, &reply.body));
    }

    parse_completion(&reply.body)
}

fn parse_completion(body: &str) -> Result<GenerationResult, GenerationFailure> {
    let malformed =
        || GenerationFailure::new(ErrorKind::MalformedResponse, "unexpected API response format");
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "response body is not a chat completion");
        malformed()
    })?;
    match parsed.first_content() {
        Some(text) if !text.is_empty() => Ok(GenerationResult { text }),
        _ => Err(malformed()),
    }
}

/**
 * \brief 连通性探测：GET /v1/models，仅 200 视为成功。不会返回错误。
 */
pub async fn test_connection(
    transport: &dyn Transport,
    domain: &str,
    api_key: &str,
    protocol: Protocol,
) -> ConnectionProbeResult {
    if normalize_domain(domain).is_empty() {
        return probe_failed("API domain must not be empty".to_string());
    }
    if api_key.trim().is_empty() {
        return probe_failed("API key must not be empty".to_string());
    }

    let url = format!("{}{}", api_base_url(domain, protocol), MODELS_PATH);
    info!(url = %url, "probing API connection");

    let result = match transport.get(&url, api_key, PROBE_TIMEOUT).await {
        Ok(reply) if reply.status == 200 => ConnectionProbeResult {
            success: true,
            message: "connection succeeded, API key is valid".to_string(),
        },
        Ok(reply) if (200..300).contains(&reply.status) => ConnectionProbeResult {
            success: false,
            message: format!("connection failed: status {}", reply.status),
        },
        Ok(reply) => {
            let failure = GenerationFailure::from_status(reply.status, &reply.body);
            probe_failed(format!("{} - {}", reply.status, failure.message))
        }
        Err(err) => probe_failed(GenerationFailure::from(err).message),
    };

    let result = ConnectionProbeResult {
        success: result.success,
        message: redact(&result.message, api_key),
    };
    if result.success {
        info!("API connection probe succeeded");
    } else {
        warn!(message = %result.message, "API connection probe failed");
    }
    result
}

fn probe_failed(detail: String) -> ConnectionProbeResult {
    ConnectionProbeResult {
        success: false,
        message: format!("API connection test failed: {detail}"),
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /**
     * \brief 内存传输：返回预设结果并记录调用。
     */
    pub(crate) struct MockTransport {
        outcome: Result<HttpReply, TransportError>,
        calls: AtomicUsize,
        last_url: Mutex<Option<String>>,
        last_body: Mutex<Option<Value>>,
    }

    impl MockTransport {
        pub(crate) fn replying(status: u16, body: impl Into<String>) -> Self {
            Self::with_outcome(Ok(HttpReply {
                status,
                body: body.into(),
            }))
        }

        pub(crate) fn failing(err: TransportError) -> Self {
            Self::with_outcome(Err(err))
        }

        fn with_outcome(outcome: Result<HttpReply, TransportError>) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
                last_url: Mutex::new(None),
                last_body: Mutex::new(None),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn last_url(&self) -> Option<String> {
            self.last_url.lock().unwrap().clone()
        }

        pub(crate) fn last_body(&self) -> Option<Value> {
            self.last_body.lock().unwrap().clone()
        }

        fn record(&self, url: &str, body: Option<&Value>) -> Result<HttpReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_url.lock().unwrap() = Some(url.to_string());
            *self.last_body.lock().unwrap() = body.cloned();
            self.outcome.clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post_json(
            &self,
            url: &str,
            _api_key: &str,
            body: &Value,
            _timeout: Duration,
        ) -> Result<HttpReply, TransportError> {
            self.record(url, Some(body))
        }

        async fn get(
            &self,
            url: &str,
            _api_key: &str,
            _timeout: Duration,
        ) -> Result<HttpReply, TransportError> {
            self.record(url, None)
        }
    }
}
