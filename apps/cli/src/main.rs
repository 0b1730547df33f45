use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use jobgreet_core_sdk::{
    clipboard::{Clipboard, SystemClipboard},
    config::{self, ConfigLayer, GreeterConfig},
    llm::{self, ReqwestTransport},
    models::Protocol,
    prompt, server, telemetry,
    workflow::{self, FlowError},
};

const RULE_WIDTH: usize = 50;
const PREVIEW_CHARS: usize = 200;

/**
 * \brief CLI 程序入口：从剪贴板读取岗位 JD，生成打招呼语并写回剪贴板。
 */
#[derive(Parser)]
#[command(
    name = "jobgreet",
    version,
    about = "Generate a recruiting greeting from the job description on the clipboard"
)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalOpts {
    /** \brief TOML 配置文件路径 */
    #[arg(long, global = true, env = "JOBGREET_CONFIG")]
    config: Option<PathBuf>,

    /** \brief 模型名 */
    #[arg(short, long, global = true, env = "JOBGREET_MODEL")]
    model: Option<String>,

    /** \brief API Key */
    #[arg(
        short = 'k',
        long = "key",
        global = true,
        env = "JOBGREET_API_KEY",
        hide_env_values = true
    )]
    api_key: Option<String>,

    /** \brief API 域名，可带协议前缀 */
    #[arg(short, long, global = true, env = "JOBGREET_DOMAIN")]
    domain: Option<String>,

    /** \brief http 或 https */
    #[arg(long, global = true)]
    protocol: Option<Protocol>,

    /** \brief 简历文本 */
    #[arg(short, long, global = true)]
    resume: Option<String>,

    /** \brief 从文件读取简历 */
    #[arg(long, global = true, conflicts_with = "resume")]
    resume_file: Option<PathBuf>,

    /** \brief 自定义生成要求，替换内置要求 */
    #[arg(long, global = true)]
    custom_prompt: Option<String>,

    /** \brief 从文件读取自定义生成要求 */
    #[arg(long, global = true, conflicts_with = "custom_prompt")]
    custom_prompt_file: Option<PathBuf>,

    /** \brief 生成失败时把备用打招呼语写入剪贴板（仍以非零状态退出） */
    #[arg(long, global = true)]
    fallback: bool,

    /** \brief 自定义备用打招呼语 */
    #[arg(long, global = true)]
    fallback_text: Option<String>,

    /** \brief 输出调试日志 */
    #[arg(short, long, global = true)]
    verbose: bool,

    /** \brief 追加写入的日志文件 */
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

impl GlobalOpts {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            domain: self.domain.clone(),
            protocol: self.protocol,
            resume: self.resume.clone(),
            resume_file: self.resume_file.clone(),
            custom_prompt: self.custom_prompt.clone(),
            custom_prompt_file: self.custom_prompt_file.clone(),
            fallback: self.fallback.then_some(true),
            fallback_text: self.fallback_text.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /**
     * \brief 读取剪贴板中的 JD，生成打招呼语并写回剪贴板（默认命令）。
     */
    Generate,

    /**
     * \brief 测试 API 域名与密钥是否可用。
     */
    Test,

    /**
     * \brief 打印将要发送的完整提示词。
     */
    Prompt {
        /** \brief 使用该文本作为 JD，而不是读取剪贴板 */
        #[arg(long)]
        jd: Option<String>,
        /** \brief 只打印内置生成要求 */
        #[arg(long, default_value_t = false)]
        instructions_only: bool,
    },

    /**
     * \brief 启动本地 HTTP 服务并提供前端页面。
     */
    Serve {
        #[arg(long, default_value = server::DEFAULT_ADDR)]
        addr: String,
    },
}

fn load_config(opts: &GlobalOpts) -> Result<GreeterConfig> {
    let file_layer = match &opts.config {
        Some(path) => config::load_file(path)
            .with_context(|| format!("load config {} failed", path.display()))?,
        None => ConfigLayer::default(),
    };
    GreeterConfig::from_layer(opts.layer().merge(file_layer)).context("resolve config failed")
}

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init(&telemetry::TelemetryOptions {
        verbose: cli.opts.verbose,
        log_file: cli.opts.log_file.clone(),
    })?;

    let config = load_config(&cli.opts)?;
    debug!(config = ?config, "configuration resolved");

    match cli.command.unwrap_or(Commands::Generate) {
        Commands::Generate => generate(&config).await?,
        Commands::Test => {
            let transport = ReqwestTransport::new().context("create http client failed")?;
            let result =
                llm::test_connection(&transport, &config.domain, &config.api_key, config.protocol)
                    .await;
            if !result.success {
                bail!("{}", result.message);
            }
            println!("{}", result.message);
        }
        Commands::Prompt {
            jd,
            instructions_only,
        } => {
            if instructions_only {
                println!("{}", prompt::default_instructions());
                return Ok(());
            }
            let jd = match jd {
                Some(text) => text,
                None => SystemClipboard.read().context("read clipboard failed")?,
            };
            println!(
                "{}",
                prompt::build_prompt(
                    &jd,
                    &config.resume_text,
                    config.custom_instructions.as_deref()
                )
            );
        }
        Commands::Serve { addr } => {
            let transport = ReqwestTransport::new().context("create http client failed")?;
            server::run(&addr, server::AppState::new(config, Arc::new(transport))).await?;
        }
    }

    Ok(())
}

async fn generate(config: &GreeterConfig) -> Result<()> {
    let transport = ReqwestTransport::new().context("create http client failed")?;
    let fallback = config.fallback();

    println!("Generating greeting...");
    let outcome =
        match workflow::run_clipboard_flow(config, &transport, &SystemClipboard, fallback.as_ref())
            .await
        {
            Ok(outcome) => outcome,
            Err(FlowError::Generation {
                failure,
                fallback_written,
            }) => {
                if fallback_written {
                    eprintln!("Fallback greeting was written to the clipboard instead.");
                }
                return Err(failure).context("greeting generation failed");
            }
            Err(err) => return Err(err.into()),
        };

    println!("Job description read from clipboard:");
    println!("{}", rule());
    println!("{}", workflow::preview(&outcome.job_description, PREVIEW_CHARS));
    println!("{}", rule());
    println!("Greeting generated and written to the clipboard:");
    println!("{}", rule());
    println!("{}", outcome.greeting);
    println!("{}", rule());
    println!("Tip: the greeting is on the clipboard, paste it directly.");
    Ok(())
}
