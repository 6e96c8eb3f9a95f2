use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, get_service, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::services::ServeDir;

use crate::error::AiError;
use crate::lang::TargetLanguage;
use crate::models::{Finding, LlmSettings};
use crate::service::{AiService, AiStatus};
use crate::settings::{SettingsCache, SqliteSettingsStore};
use crate::transport::HttpTransport;
use crate::{db, telemetry};

/**
 * \brief 路由层共享状态：AI 服务实例与数据库路径。
 */
#[derive(Clone)]
pub struct AppState {
    pub ai: Arc<AiService<HttpTransport>>,
    pub db_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        let db_path: PathBuf = db_path.into();
        let settings = SettingsCache::new(Box::new(SqliteSettingsStore::new(db_path.clone())));
        Self {
            ai: Arc::new(AiService::new(settings, HttpTransport::new())),
            db_path: Arc::new(db_path),
        }
    }

    fn open_db(&self) -> Result<rusqlite::Connection> {
        db::open_db(self.db_path.as_ref())
    }
}

/**
 * \brief 启动本地 HTTP 服务，提供静态前端与 API。
 * \param addr 监听地址，如 "127.0.0.1:4242"
 */
pub async fn run(addr: &str) -> Result<()> {
    let ui_root = std::env::var("REDPEN_UI_DIR").unwrap_or_else(|_| "packages/ui/dist".to_string());
    let fallback_root = std::env::var("REDPEN_UI_FALLBACK").unwrap_or_else(|_| "web".to_string());

    let static_handler = if std::path::Path::new(&ui_root).exists() {
        ServeDir::new(ui_root)
    } else {
        ServeDir::new(fallback_root)
    }
    .append_index_html_on_directories(true);

    let state = AppState::new(db::DEFAULT_DB_PATH);

    let app = router(state).fallback_service(get_service(static_handler));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ai/complete-field", post(complete_field))
        .route("/api/ai/translate", post(translate))
        .route("/api/ai/translate-audit/{audit_id}", post(translate_audit))
        .route("/api/ai/status", get(ai_status))
        .route("/api/settings", get(get_settings).post(set_settings))
        .route("/api/audits", get(list_audits).post(create_audit))
        .route("/api/audits/{id}", get(get_audit))
        .route("/api/audits/{id}/findings", post(add_finding))
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

/** \brief 统一错误信封：{status: "error", message, details}。 */
fn error_response(code: StatusCode, message: &str, details: Option<String>) -> ApiError {
    (
        code,
        Json(json!({
            "status": "error",
            "message": message,
            "details": details,
        })),
    )
}

fn bad_request(message: &str) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, message, None)
}

fn internal_err<E: std::fmt::Display>(e: E) -> ApiError {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error",
        Some(e.to_string()),
    )
}

/**
 * \brief AI 错误到 HTTP 状态码的统一映射。
 *
 * 配置类错误只返回笼统消息，密钥内容在任何分支都不会出现在响应中。
 */
fn ai_error_response(err: AiError) -> ApiError {
    match err {
        AiError::Validation { message } => bad_request(&message),
        AiError::Disabled => {
            error_response(StatusCode::FORBIDDEN, "AI service is not enabled", None)
        }
        AiError::Configuration { .. } => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AI service configuration error",
            None,
        ),
        err @ (AiError::Provider { .. } | AiError::Network { .. } | AiError::Request { .. }) => {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &err.to_string(),
                None,
            )
        }
    }
}

#[derive(Deserialize, Debug)]
struct CompleteFieldRequest {
    /** \brief 漏洞标题 */
    title: Option<String>,
    /** \brief 字段当前内容，可为空 */
    #[serde(default, rename = "currentContent")]
    current_content: Option<String>,
    /** \brief 目标字段：description/observation/remediation */
    #[serde(rename = "fieldType")]
    field_type: Option<String>,
    /** \brief 请求语言，缺省 en */
    language: Option<String>,
    /** \brief 概念验证证据，可选 */
    #[serde(default)]
    proof: Option<String>,
}

#[derive(Serialize, Debug)]
struct ContentResponse {
    content: String,
}

/**
 * \brief 起草漏洞字段：POST /api/ai/complete-field。
 */
async fn complete_field(
    State(state): State<AppState>,
    Json(payload): Json<CompleteFieldRequest>,
) -> Result<Json<ContentResponse>, ApiError> {
    let (Some(title), Some(field_type)) = (payload.title.as_deref(), payload.field_type.as_deref())
    else {
        return Err(bad_request("Missing required parameters: title and fieldType"));
    };
    if title.is_empty() || field_type.is_empty() {
        return Err(bad_request("Missing required parameters: title and fieldType"));
    }

    let field_type = field_type.parse().map_err(ai_error_response)?;
    let language = payload
        .language
        .as_deref()
        .unwrap_or("en")
        .parse::<TargetLanguage>()
        .map_err(ai_error_response)?;

    let content = state
        .ai
        .complete_field(
            title,
            payload.current_content.as_deref().unwrap_or(""),
            field_type,
            language,
            payload.proof.as_deref(),
        )
        .await
        .map_err(ai_error_response)?;

    Ok(Json(ContentResponse { content }))
}

#[derive(Deserialize, Debug)]
struct TranslateRequest {
    content: Option<String>,
    #[serde(rename = "targetLanguage")]
    target_language: Option<String>,
}

/**
 * \brief 翻译一段内容：POST /api/ai/translate。
 */
async fn translate(
    State(state): State<AppState>,
    Json(payload): Json<TranslateRequest>,
) -> Result<Json<ContentResponse>, ApiError> {
    let Some(content) = payload.content.as_deref().filter(|c| !c.is_empty()) else {
        return Err(bad_request("Missing required parameter: content"));
    };

    let target = payload
        .target_language
        .as_deref()
        .unwrap_or("en")
        .parse::<TargetLanguage>()
        .map_err(ai_error_response)?;

    let translated = state
        .ai
        .translate(content, target)
        .await
        .map_err(ai_error_response)?;

    Ok(Json(ContentResponse {
        content: translated,
    }))
}

#[derive(Deserialize, Debug)]
struct TranslateAuditRequest {
    #[serde(rename = "targetLanguage")]
    target_language: Option<String>,
}

#[derive(Serialize, Debug)]
struct TranslateAuditResponse {
    message: String,
    #[serde(rename = "translatedCount")]
    translated_count: usize,
}

/**
 * \brief 整本翻译审计报告的漏洞发现：POST /api/ai/translate-audit/{audit_id}。
 *
 * 翻译后的字段逐条写回存储；单字段失败由引擎层就地恢复。
 */
async fn translate_audit(
    State(state): State<AppState>,
    Path(audit_id): Path<i64>,
    Json(payload): Json<TranslateAuditRequest>,
) -> Result<Json<TranslateAuditResponse>, ApiError> {
    let target = payload
        .target_language
        .as_deref()
        .unwrap_or("en")
        .parse::<TargetLanguage>()
        .map_err(ai_error_response)?;

    let conn = state.open_db().map_err(internal_err)?;
    if db::get_audit(&conn, audit_id).map_err(internal_err)?.is_none() {
        return Err(error_response(StatusCode::NOT_FOUND, "Audit not found", None));
    }

    let stored = db::load_findings(&conn, audit_id).map_err(internal_err)?;
    let findings: Vec<Finding> = stored.iter().map(|s| s.finding.clone()).collect();

    let translated = state
        .ai
        .translate_findings(&findings, target)
        .await
        .map_err(ai_error_response)?;

    for (row, finding) in stored.iter().zip(translated.iter()) {
        db::update_finding_texts(&conn, row.id, finding).map_err(internal_err)?;
    }

    telemetry::log_event(
        "server.ai",
        &format!("translate-audit id={} findings={}", audit_id, translated.len()),
    );

    Ok(Json(TranslateAuditResponse {
        message: "Audit findings translated successfully".to_string(),
        translated_count: translated.len(),
    }))
}

/**
 * \brief AI 能力状态：GET /api/ai/status。对客户端永不报错。
 */
async fn ai_status(State(state): State<AppState>) -> Json<AiStatus> {
    Json(state.ai.status())
}

/**
 * \brief 读取设置（仅公开部分）：GET /api/settings。
 */
async fn get_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let conn = state.open_db().map_err(internal_err)?;
    let settings = db::get_llm_settings(&conn)
        .map_err(internal_err)?
        .unwrap_or_default();
    // 私有配置绝不出现在公开读取里
    Ok(Json(json!({
        "llm": {
            "enabled": settings.enabled,
            "public": settings.public,
        }
    })))
}

#[derive(Deserialize, Debug)]
struct SetSettingsRequest {
    llm: LlmSettings,
}

/**
 * \brief 写入设置并刷新进程内缓存：POST /api/settings。
 */
async fn set_settings(
    State(state): State<AppState>,
    Json(payload): Json<SetSettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    let conn = state.open_db().map_err(internal_err)?;
    db::set_llm_settings(&conn, &payload.llm).map_err(internal_err)?;
    state.ai.refresh_settings();
    telemetry::log_event("server.settings", "llm settings updated");
    Ok(Json(json!({"status": "success"})))
}

#[derive(Deserialize, Debug)]
struct CreateAuditRequest {
    name: String,
}

#[derive(Serialize, Debug)]
struct AuditDto {
    id: i64,
    name: String,
}

async fn create_audit(
    State(state): State<AppState>,
    Json(payload): Json<CreateAuditRequest>,
) -> Result<Json<AuditDto>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(bad_request("Missing required parameter: name"));
    }
    let conn = state.open_db().map_err(internal_err)?;
    let id = db::create_audit(&conn, payload.name.trim()).map_err(internal_err)?;
    Ok(Json(AuditDto {
        id,
        name: payload.name.trim().to_string(),
    }))
}

async fn list_audits(State(state): State<AppState>) -> Result<Json<Vec<AuditDto>>, ApiError> {
    let conn = state.open_db().map_err(internal_err)?;
    let audits = db::list_audits(&conn).map_err(internal_err)?;
    Ok(Json(
        audits
            .into_iter()
            .map(|a| AuditDto {
                id: a.id,
                name: a.name,
            })
            .collect(),
    ))
}

#[derive(Serialize, Debug)]
struct AuditDetailDto {
    id: i64,
    name: String,
    findings: Vec<Finding>,
}

async fn get_audit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AuditDetailDto>, ApiError> {
    let conn = state.open_db().map_err(internal_err)?;
    let Some(audit) = db::get_audit(&conn, id).map_err(internal_err)? else {
        return Err(error_response(StatusCode::NOT_FOUND, "Audit not found", None));
    };
    let findings = db::load_findings(&conn, id)
        .map_err(internal_err)?
        .into_iter()
        .map(|s| s.finding)
        .collect();
    Ok(Json(AuditDetailDto {
        id: audit.id,
        name: audit.name,
        findings,
    }))
}

async fn add_finding(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(finding): Json<Finding>,
) -> Result<Json<Value>, ApiError> {
    let conn = state.open_db().map_err(internal_err)?;
    if db::get_audit(&conn, id).map_err(internal_err)?.is_none() {
        return Err(error_response(StatusCode::NOT_FOUND, "Audit not found", None));
    }
    let finding_id = db::insert_finding(&conn, id, &finding).map_err(internal_err)?;
    Ok(Json(json!({"id": finding_id})))
}
