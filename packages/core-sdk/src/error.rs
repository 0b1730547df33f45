use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/** \brief 替换 API Key 的固定占位符。 */
pub const REDACTED: &str = "[REDACTED]";

/**
 * \brief 生成/探测失败的分类。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /** \brief 发请求前的参数校验失败（模型、密钥、域名为空） */
    ValidationError,
    /** \brief HTTP 401 */
    Unauthorized,
    /** \brief HTTP 404 */
    NotFound,
    /** \brief HTTP 429 */
    RateLimited,
    /** \brief 其他非 2xx 响应 */
    RemoteError,
    /** \brief 请求已发出但未收到响应（连接、DNS、超时） */
    NoResponse,
    /** \brief 2xx 但响应体缺少 choices 内容 */
    MalformedResponse,
    /** \brief 请求尚未发出即失败（序列化、非法请求头等） */
    RequestSetupError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ValidationError => "validation error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not found",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::RemoteError => "remote error",
            ErrorKind::NoResponse => "no response",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::RequestSetupError => "request setup error",
        };
        f.write_str(name)
    }
}

/**
 * \brief 分类后的失败，message 可直接展示给用户，不含密钥。
 */
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("generation failed: {message}")]
pub struct GenerationFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl GenerationFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    /**
     * \brief 把 message 中出现的密钥替换为占位符。
     */
    pub(crate) fn redacted(mut self, secret: &str) -> Self {
        self.message = redact(&self.message, secret);
        self
    }

    /**
     * \brief 按 HTTP 状态码与响应体分类非 2xx 响应。
     */
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::new(ErrorKind::Unauthorized, "invalid API key"),
            404 => Self::new(ErrorKind::NotFound, "API domain or path is incorrect"),
            429 => Self::new(
                ErrorKind::RateLimited,
                "request limit exceeded, please try again later",
            ),
            _ => Self::new(
                ErrorKind::RemoteError,
                remote_error_message(body).unwrap_or_else(|| format!("server returned {status}")),
            ),
        }
    }
}

/**
 * \brief 从 `{"error": {...}}` 形式的响应体中提取错误描述。
 */
pub fn remote_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let err = v.get("error")?;
    if err.is_null() {
        return None;
    }
    if let Some(msg) = err.get("message").and_then(|m| m.as_str()) {
        if !msg.trim().is_empty() {
            return Some(msg.to_string());
        }
    }
    if let Some(s) = err.as_str() {
        return Some(s.to_string());
    }
    Some(err.to_string())
}

/**
 * \brief 将 text 中的 secret 替换为 `[REDACTED]`；secret 为空时原样返回。
 */
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}
