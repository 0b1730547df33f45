use std::{fs::OpenOptions, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/**
 * \brief 日志选项：是否输出调试级别，以及可选的追加日志文件。
 */
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

/**
 * \brief 默认过滤规则，RUST_LOG 存在时以其为准。
 */
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "jobgreet=debug,jobgreet_core_sdk=debug,warn"
    } else {
        "jobgreet=info,jobgreet_core_sdk=info,warn"
    }
}

/**
 * \brief 安装全局 tracing 订阅者：stderr 紧凑输出，启用时另写一份到日志文件。
 */
pub fn init(options: &TelemetryOptions) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(options.verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let file_layer = match &options.log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("create log dir {} failed", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {} failed", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_timer(UtcTime::new(Rfc3339)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("telemetry init failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert!(default_filter(true).contains("jobgreet_core_sdk=debug"));
        assert!(default_filter(false).contains("jobgreet_core_sdk=info"));
    }
}
