use thiserror::Error;
use tracing::{info, warn};

use crate::clipboard::{Clipboard, ClipboardError};
use crate::config::GreeterConfig;
use crate::error::GenerationFailure;
use crate::fallback::FallbackText;
use crate::llm::{generate_greeting, Transport};

/**
 * \brief 一次剪贴板流程的成功结果。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    pub job_description: String,
    pub greeting: String,
}

#[derive(Debug, Error)]
pub enum FlowError {
    /** \brief 剪贴板为空或无法读取 */
    #[error("{0}")]
    Input(String),
    /** \brief 结果写回剪贴板失败 */
    #[error(transparent)]
    Io(ClipboardError),
    /** \brief 生成失败；fallback_written 表示是否已写入替代文本 */
    #[error("{failure}")]
    Generation {
        failure: GenerationFailure,
        fallback_written: bool,
    },
}

/**
 * \brief 读剪贴板中的 JD，生成打招呼语并写回剪贴板。
 *
 * 生成失败时可由 fallback 提供替代文本写入剪贴板，但仍返回错误。
 */
pub async fn run_clipboard_flow(
    config: &GreeterConfig,
    transport: &dyn Transport,
    clipboard: &dyn Clipboard,
    fallback: &dyn FallbackText,
) -> Result<FlowOutcome, FlowError> {
    let job_description = clipboard.read().map_err(|e| {
        FlowError::Input(format!("{e}; copy a job description to the clipboard first"))
    })?;
    if job_description.trim().is_empty() {
        return Err(FlowError::Input(
            "clipboard is empty, copy a job description to the clipboard first".to_string(),
        ));
    }
    info!(
        jd_len = job_description.chars().count(),
        "read job description from clipboard"
    );

    let request = config.to_request(job_description.clone());
    match generate_greeting(transport, &request).await {
        Ok(result) => {
            clipboard.write(&result.text).map_err(FlowError::Io)?;
            info!("greeting written to clipboard");
            Ok(FlowOutcome {
                job_description,
                greeting: result.text,
            })
        }
        Err(failure) => {
            let fallback_written = match fallback.fallback_for(&failure) {
                Some(text) => match clipboard.write(&text) {
                    Ok(()) => {
                        warn!(kind = %failure.kind, "generation failed, fallback greeting written");
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to write fallback greeting");
                        false
                    }
                },
                None => false,
            };
            Err(FlowError::Generation {
                failure,
                fallback_written,
            })
        }
    }
}

/**
 * \brief 截取前 max_chars 个字符用于展示，被截断时追加 "..."。
 */
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push_str("...");
    }
    out
}
