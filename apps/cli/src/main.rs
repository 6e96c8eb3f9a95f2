use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use redpen_core_sdk::completion::FieldType;
use redpen_core_sdk::lang::TargetLanguage;
use redpen_core_sdk::models::{LlmPrivateSettings, LlmPublicSettings, LlmSettings};
use redpen_core_sdk::service::AiService;
use redpen_core_sdk::settings::{SettingsCache, SqliteSettingsStore};
use redpen_core_sdk::transport::HttpTransport;
use redpen_core_sdk::{db, server, telemetry};

/**
 * \brief CLI 程序入口：配置 LLM 设置、起草与翻译、启动 HTTP 服务。
 */
#[derive(Parser, Debug)]
#[command(name = "redpen", version, about = "RedPen pentest-report AI backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 初始化 LLM 配置并启用 AI 能力。
     * \param api_endpoint API 端点
     * \param api_key      API Key（本地 Ollama 可省略）
     * \param model        模型名
     */
    Init {
        #[arg(long)]
        api_endpoint: String,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        organization_id: Option<String>,
        #[arg(long, default_value_t = true)]
        enabled: bool,
        #[arg(long, default_value_t = false)]
        enable_telemetry: bool,
    },

    /**
     * \brief 查看 AI 能力状态。
     */
    Status,

    /**
     * \brief 起草一个漏洞字段并打印结果。
     */
    Complete {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "description")]
        field: String,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long, default_value = "")]
        current: String,
        #[arg(long)]
        proof: Option<String>,
    },

    /**
     * \brief 翻译一段内容并打印结果。
     */
    Translate {
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "en")]
        to: String,
    },

    /**
     * \brief 启动本地 HTTP 服务并提供前端页面。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:4242")]
        addr: String,
    },
}

fn open_service() -> AiService<HttpTransport> {
    let settings = SettingsCache::new(Box::new(SqliteSettingsStore::new(db::DEFAULT_DB_PATH)));
    AiService::new(settings, HttpTransport::new())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = db::open_default_db().context("open database failed")?;
    db::migrate(&conn).context("apply migrations failed")?;

    match cli.command {
        Commands::Init {
            api_endpoint,
            api_key,
            model,
            organization_id,
            enabled,
            enable_telemetry,
        } => {
            let settings = LlmSettings {
                enabled,
                public: LlmPublicSettings {
                    provider: Some(
                        redpen_core_sdk::provider::detect(&api_endpoint).name().to_string(),
                    ),
                    model,
                    max_tokens: None,
                    temperature: None,
                },
                private: LlmPrivateSettings {
                    api_endpoint: Some(api_endpoint),
                    api_key,
                    organization_id,
                },
            };
            db::set_llm_settings(&conn, &settings).context("save llm settings failed")?;
            telemetry::set_enabled(enable_telemetry);
            println!(
                "Saved llm settings (provider={} enabled={})",
                settings.public.provider.as_deref().unwrap_or("openai"),
                settings.enabled
            );
        }
        Commands::Status => {
            let status = open_service().status();
            println!(
                "enabled={} provider={} model={}",
                status.enabled,
                status.provider.as_deref().unwrap_or("-"),
                status.model.as_deref().unwrap_or("-")
            );
        }
        Commands::Complete {
            title,
            field,
            language,
            current,
            proof,
        } => {
            let field: FieldType = field.parse().context("invalid field")?;
            let language: TargetLanguage = language.parse().context("invalid language")?;
            let content = open_service()
                .complete_field(&title, &current, field, language, proof.as_deref())
                .await
                .context("completion failed")?;
            println!("{}", content);
        }
        Commands::Translate { content, to } => {
            let target: TargetLanguage = to.parse().context("invalid language")?;
            let translated = open_service()
                .translate(&content, target)
                .await
                .context("translation failed")?;
            println!("{}", translated);
        }
        Commands::Serve { addr } => {
            server::run(&addr).await?;
        }
    }

    Ok(())
}
