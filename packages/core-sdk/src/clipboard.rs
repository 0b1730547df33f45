use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("failed to access system clipboard: {0}")]
    Unavailable(String),
    #[error("failed to read clipboard: {0}")]
    Read(String),
    #[error("failed to write clipboard: {0}")]
    Write(String),
}

/**
 * \brief 剪贴板协作者：开始时读一次，结束时写一次。
 */
pub trait Clipboard: Send + Sync {
    fn read(&self) -> Result<String, ClipboardError>;
    fn write(&self, text: &str) -> Result<(), ClipboardError>;
}

/**
 * \brief 系统剪贴板（arboard）。
 *
 * Linux 下写入的内容只在进程存活期间由本进程持有，退出后是否保留取决于剪贴板管理器。
 */
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn read(&self) -> Result<String, ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .get_text()
            .map_err(|e| ClipboardError::Read(e.to_string()))
    }

    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}
