use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::REDACTED;

/**
 * \brief 访问远端 API 时使用的协议。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("unsupported protocol: {other} (expected http or https)")),
        }
    }
}

/**
 * \brief 一次打招呼语生成请求，所有字段在创建后不再修改。
 */
#[derive(Clone)]
pub struct GenerationRequest {
    /** \brief 模型名 */
    pub model: String,
    /** \brief API Key，日志与错误信息中一律脱敏 */
    pub api_key: String,
    /** \brief API 域名，可带协议前缀与结尾斜杠，使用前会被规范化 */
    pub domain: String,
    /** \brief 协议 */
    pub protocol: Protocol,
    /** \brief 岗位 JD 原文 */
    pub job_description: String,
    /** \brief 简历原文 */
    pub resume_text: String,
    /** \brief 自定义要求，缺省时使用内置要求 */
    pub custom_instructions: Option<String>,
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("model", &self.model)
            .field("api_key", &REDACTED)
            .field("domain", &self.domain)
            .field("protocol", &self.protocol)
            .field("job_description_len", &self.job_description.len())
            .field("resume_text_len", &self.resume_text.len())
            .field("custom_instructions", &self.custom_instructions.is_some())
            .finish()
    }
}

/**
 * \brief 生成成功的结果，文本已去除首尾空白且非空。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub text: String,
}

/**
 * \brief 连通性探测结果，探测本身不会返回错误。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProbeResult {
    pub success: bool,
    pub message: String,
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    pub role: String,
    /** \brief 内容 */
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/**
 * \brief `/v1/chat/completions` 请求体。
 */
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<Message>,
}

/**
 * \brief `/v1/chat/completions` 响应体中本程序关心的部分。
 */
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /**
     * \brief 取第一个 choice 的文本内容（去除首尾空白）。
     */
    pub fn first_content(&self) -> Option<String> {
        self.choices
            .as_ref()?
            .first()?
            .message
            .as_ref()?
            .content
            .as_deref()
            .map(|s| s.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse_and_display() {
        assert_eq!("HTTP".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!(" https ".parse::<Protocol>().unwrap(), Protocol::Https);
        assert!("ftp".parse::<Protocol>().is_err());
        assert_eq!(Protocol::Http.to_string(), "http");
        assert_eq!(Protocol::default(), Protocol::Https);
    }

    #[test]
    fn test_request_debug_hides_key() {
        let req = GenerationRequest {
            model: "gpt".into(),
            api_key: "sk-secret-123".into(),
            domain: "api.example.com".into(),
            protocol: Protocol::Https,
            job_description: "jd".into(),
            resume_text: "resume".into(),
            custom_instructions: None,
        };
        let dbg = format!("{:?}", req);
        assert!(!dbg.contains("sk-secret-123"));
        assert!(dbg.contains(REDACTED));
    }

    #[test]
    fn test_first_content_handles_missing_fields() {
        let v: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  hi \n"}}]}"#).unwrap();
        assert_eq!(v.first_content().as_deref(), Some("hi"));

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.first_content(), None);

        let none: ChatCompletionResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(none.first_content(), None);

        let no_msg: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"index":0}]}"#).unwrap();
        assert_eq!(no_msg.first_content(), None);
    }
}
