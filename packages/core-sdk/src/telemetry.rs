use std::{fs::OpenOptions, io::Write, path::PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

static TELEMETRY_ENABLED: Lazy<std::sync::RwLock<bool>> =
    Lazy::new(|| std::sync::RwLock::new(false));

/** \brief 运行期登记的密钥值集合；落盘前整行打码。 */
static SECRET_VALUES: Lazy<std::sync::RwLock<Vec<String>>> =
    Lazy::new(|| std::sync::RwLock::new(Vec::new()));

/**
 * \brief 更新遥测开关状态。
 */
pub fn set_enabled(enabled: bool) {
    if let Ok(mut guard) = TELEMETRY_ENABLED.write() {
        *guard = enabled;
    }
}

/**
 * \brief 查询当前遥测开关状态。
 */
pub fn is_enabled() -> bool {
    TELEMETRY_ENABLED.read().map(|g| *g).unwrap_or(false)
}

/**
 * \brief 登记一个不允许出现在日志中的密钥值。
 *
 * 引擎层在拿到私有配置后调用；此后所有日志行在落盘前都会
 * 把该值替换为 ***。
 */
pub fn register_secret(secret: &str) {
    if secret.is_empty() {
        return;
    }
    if let Ok(mut guard) = SECRET_VALUES.write() {
        if !guard.iter().any(|s| s == secret) {
            guard.push(secret.to_string());
        }
    }
}

/**
 * \brief 记录常规事件。消息在落盘前统一打码。
 */
pub fn log_event(category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    if let Err(err) = write_line("INFO", category, message) {
        eprintln!("telemetry write failed: {}", err);
    }
}

/**
 * \brief 记录错误事件。
 */
pub fn log_error(category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    if let Err(err) = write_line("ERROR", category, message) {
        eprintln!("telemetry write failed: {}", err);
    }
}

/**
 * \brief 日志打码：已登记的密钥值、Bearer 凭据与 sk- 前缀令牌
 *        一律替换为 ***。所有日志行落盘前都经过此函数。
 */
pub fn redact(message: &str) -> String {
    let mut out = message.to_string();
    if let Ok(secrets) = SECRET_VALUES.read() {
        for secret in secrets.iter() {
            out = out.replace(secret.as_str(), "***");
        }
    }
    out = mask_tokens(&out, "Bearer ");
    mask_tokens(&out, "sk-")
}

/**
 * \brief 把 prefix 之后的一段令牌字符替换为 ***。
 *
 * prefix 必须位于词边界（前一个字符不是字母数字），
 * 避免把 "task-force" 这类普通词误伤。
 */
fn mask_tokens(input: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find(prefix) {
        let at_boundary = !rest[..pos]
            .chars()
            .next_back()
            .map(|c| c.is_ascii_alphanumeric())
            .unwrap_or(false);
        let after = pos + prefix.len();
        out.push_str(&rest[..after]);
        rest = &rest[after..];
        if !at_boundary {
            continue;
        }
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        if end > 0 {
            out.push_str("***");
            rest = &rest[end..];
        }
    }
    out.push_str(rest);
    out
}

fn write_line(level: &str, category: &str, message: &str) -> Result<()> {
    let message = redact(message);
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)?;
    }
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("redpen.log"))?;
    writeln!(file, "{} [{}] {} - {}", timestamp, level, category, message)?;
    Ok(())
}
