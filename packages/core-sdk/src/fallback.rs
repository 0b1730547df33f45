use crate::error::GenerationFailure;

/**
 * \brief 内置的备用打招呼语。
 */
pub const DEFAULT_FALLBACK_GREETING: &str = "您好！我看到贵公司的招聘信息后非常感兴趣。作为一名拥有5年开发经验的软件工程师，我精通Java、Python和JavaScript等多种编程语言，并参与过多个大型项目的开发。我相信我的技能和经验与贵公司的需求非常匹配，希望能有机会进一步交流。期待您的回复！";

/**
 * \brief 生成失败时提供替代文本的协作者，返回 None 表示不替代。
 */
pub trait FallbackText: Send + Sync {
    fn fallback_for(&self, failure: &GenerationFailure) -> Option<String>;
}

/**
 * \brief 从不替代，失败原样上报。
 */
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFallback;

impl FallbackText for NoFallback {
    fn fallback_for(&self, _failure: &GenerationFailure) -> Option<String> {
        None
    }
}

/**
 * \brief 任何失败都替代为固定文本。
 */
#[derive(Debug, Clone)]
pub struct FixedFallback {
    text: String,
}

impl FixedFallback {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for FixedFallback {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_GREETING)
    }
}

impl FallbackText for FixedFallback {
    fn fallback_for(&self, _failure: &GenerationFailure) -> Option<String> {
        Some(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_policies() {
        let failure = GenerationFailure::new(ErrorKind::NoResponse, "down");
        assert_eq!(NoFallback.fallback_for(&failure), None);
        assert_eq!(
            FixedFallback::default().fallback_for(&failure).as_deref(),
            Some(DEFAULT_FALLBACK_GREETING)
        );
        assert_eq!(
            FixedFallback::new("hi").fallback_for(&failure).as_deref(),
            Some("hi")
        );
    }
}
