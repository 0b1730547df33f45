pub mod clipboard;
pub mod config;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod server;
pub mod telemetry;
pub mod workflow;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::clipboard::{Clipboard, SystemClipboard};
    pub use crate::config::{ConfigLayer, GreeterConfig};
    pub use crate::error::{ErrorKind, GenerationFailure};
    pub use crate::llm::{generate_greeting, test_connection, ReqwestTransport, Transport};
    pub use crate::models::{ConnectionProbeResult, GenerationRequest, GenerationResult, Protocol};
    pub use crate::workflow::{run_clipboard_flow, FlowError, FlowOutcome};
}
