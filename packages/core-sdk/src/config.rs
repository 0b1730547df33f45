use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::REDACTED;
use crate::fallback::{FallbackText, FixedFallback, NoFallback};
use crate::models::{GenerationRequest, Protocol};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_DOMAIN: &str = "api.openai.com";
pub const DEFAULT_RESUME: &str = "我是一名经验丰富的软件工程师，有5年开发经验，精通Java、Python和JavaScript等编程语言。曾参与多个大型项目开发，具有良好的团队协作能力和解决问题的能力。";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/**
 * \brief 一层配置来源（命令行、配置文件），字段均可缺省。
 */
#[derive(Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub domain: Option<String>,
    pub protocol: Option<Protocol>,
    pub resume: Option<String>,
    pub resume_file: Option<PathBuf>,
    pub custom_prompt: Option<String>,
    pub custom_prompt_file: Option<PathBuf>,
    pub fallback: Option<bool>,
    pub fallback_text: Option<String>,
}

impl ConfigLayer {
    /**
     * \brief 以 self 为高优先级，缺省字段取 lower。
     */
    pub fn merge(self, lower: ConfigLayer) -> ConfigLayer {
        // Inline text beats a file from the same layer.
        let (resume, resume_file) =
            pick_text(self.resume, self.resume_file, lower.resume, lower.resume_file);
        let (custom_prompt, custom_prompt_file) = pick_text(
            self.custom_prompt,
            self.custom_prompt_file,
            lower.custom_prompt,
            lower.custom_prompt_file,
        );
        ConfigLayer {
            model: self.model.or(lower.model),
            api_key: self.api_key.or(lower.api_key),
            domain: self.domain.or(lower.domain),
            protocol: self.protocol.or(lower.protocol),
            resume,
            resume_file,
            custom_prompt,
            custom_prompt_file,
            fallback: self.fallback.or(lower.fallback),
            fallback_text: self.fallback_text.or(lower.fallback_text),
        }
    }
}

fn pick_text(
    text: Option<String>,
    file: Option<PathBuf>,
    lower_text: Option<String>,
    lower_file: Option<PathBuf>,
) -> (Option<String>, Option<PathBuf>) {
    if text.is_some() || file.is_some() {
        (text, file)
    } else {
        (lower_text, lower_file)
    }
}

/**
 * \brief 读取 TOML 配置文件；文件内的相对路径以配置文件所在目录为基准。
 */
pub fn load_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut layer: ConfigLayer = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    layer.resume_file = layer.resume_file.map(|p| base.join(p));
    layer.custom_prompt_file = layer.custom_prompt_file.map(|p| base.join(p));
    Ok(layer)
}

/**
 * \brief 启动时构造一次的运行配置，按值传入核心函数。
 */
#[derive(Clone)]
pub struct GreeterConfig {
    pub model: String,
    pub api_key: String,
    pub domain: String,
    pub protocol: Protocol,
    pub resume_text: String,
    pub custom_instructions: Option<String>,
    pub use_fallback: bool,
    pub fallback_text: Option<String>,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            domain: DEFAULT_DOMAIN.to_string(),
            protocol: Protocol::Https,
            resume_text: DEFAULT_RESUME.to_string(),
            custom_instructions: None,
            use_fallback: false,
            fallback_text: None,
        }
    }
}

impl fmt::Debug for GreeterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreeterConfig")
            .field("model", &self.model)
            .field("api_key", &REDACTED)
            .field("domain", &self.domain)
            .field("protocol", &self.protocol)
            .field("resume_len", &self.resume_text.len())
            .field("custom_instructions", &self.custom_instructions.is_some())
            .field("use_fallback", &self.use_fallback)
            .finish()
    }
}

impl GreeterConfig {
    /**
     * \brief 由合并后的配置层生成最终配置，缺省字段使用内置默认值。
     */
    pub fn from_layer(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let resume_text = match (layer.resume, layer.resume_file) {
            (Some(text), _) => text,
            (None, Some(path)) => read_text(&path)?,
            (None, None) => defaults.resume_text,
        };
        let custom_instructions = match (layer.custom_prompt, layer.custom_prompt_file) {
            (Some(text), _) => Some(text),
            (None, Some(path)) => Some(read_text(&path)?),
            (None, None) => None,
        };
        Ok(Self {
            model: layer.model.unwrap_or(defaults.model),
            api_key: layer.api_key.unwrap_or(defaults.api_key),
            domain: layer.domain.unwrap_or(defaults.domain),
            protocol: layer.protocol.unwrap_or(defaults.protocol),
            resume_text,
            custom_instructions,
            use_fallback: layer.fallback.unwrap_or(defaults.use_fallback),
            fallback_text: layer.fallback_text,
        })
    }

    /**
     * \brief 以当前配置和岗位 JD 构造一次生成请求。
     */
    pub fn to_request(&self, job_description: impl Into<String>) -> GenerationRequest {
        GenerationRequest {
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            domain: self.domain.clone(),
            protocol: self.protocol,
            job_description: job_description.into(),
            resume_text: self.resume_text.clone(),
            custom_instructions: self.custom_instructions.clone(),
        }
    }

    /**
     * \brief 按配置选择失败时的替代策略。
     */
    pub fn fallback(&self) -> Box<dyn FallbackText> {
        match (self.use_fallback, &self.fallback_text) {
            (false, _) => Box::new(NoFallback),
            (true, Some(text)) => Box::new(FixedFallback::new(text.clone())),
            (true, None) => Box::new(FixedFallback::default()),
        }
    }
}

fn read_text(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
