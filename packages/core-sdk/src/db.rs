use anyhow::{bail, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::{thread, time::Duration};

use crate::models::{Finding, LlmSettings};

pub const DEFAULT_DB_PATH: &str = "redpen.db";

/** \brief 设置存储中 LLM 配置所在的键。 */
const LLM_SETTINGS_KEY: &str = "llm";

/**
 * \brief 审计报告摘要。
 */
#[derive(Debug, Clone)]
pub struct AuditSummary {
    pub id: i64,
    pub name: String,
}

/**
 * \brief 带主键的漏洞发现记录。
 */
#[derive(Debug, Clone)]
pub struct StoredFinding {
    /** \brief 记录行主键。 */
    pub id: i64,
    /** \brief 可翻译的文本字段。 */
    pub finding: Finding,
}

/**
 * \brief 打开默认数据库文件（本地目录下的 redpen.db）。
 */
pub fn open_default_db() -> Result<Connection> {
    open_db(DEFAULT_DB_PATH)
}

pub fn open_db(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/**
 * \brief 运行数据库迁移，创建必要表结构。
 */
pub fn migrate(conn: &Connection) -> Result<()> {
    retry_on_locked(|| {
        conn.execute_batch(
            r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS findings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            audit_id INTEGER NOT NULL REFERENCES audits(id),
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            observation TEXT NOT NULL DEFAULT '',
            remediation TEXT NOT NULL DEFAULT '',
            poc TEXT NOT NULL DEFAULT ''
        );
        "#,
        )
    })?;
    Ok(())
}

/**
 * \brief 读取 LLM 配置；尚未写入时返回 None。
 */
pub fn get_llm_settings(conn: &Connection) -> Result<Option<LlmSettings>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM app_config WHERE key=?1",
            params![LLM_SETTINGS_KEY],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/**
 * \brief 整体写入 LLM 配置。
 */
pub fn set_llm_settings(conn: &Connection, settings: &LlmSettings) -> Result<()> {
    let json = serde_json::to_string(settings)?;
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO app_config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![LLM_SETTINGS_KEY, json],
        )
    })?;
    Ok(())
}

/**
 * \brief 新建审计报告。
 */
pub fn create_audit(conn: &Connection, name: &str) -> Result<i64> {
    retry_on_locked(|| conn.execute("INSERT INTO audits (name) VALUES (?1)", params![name]))?;
    Ok(conn.last_insert_rowid())
}

pub fn get_audit(conn: &Connection, id: i64) -> Result<Option<AuditSummary>> {
    let audit = conn
        .query_row(
            "SELECT id, name FROM audits WHERE id=?1",
            params![id],
            |row| {
                Ok(AuditSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(audit)
}

/**
 * \brief 列出全部审计报告。
 */
pub fn list_audits(conn: &Connection) -> Result<Vec<AuditSummary>> {
    let mut stmt = conn.prepare("SELECT id, name FROM audits ORDER BY id ASC")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AuditSummary {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/**
 * \brief 向审计报告追加一条漏洞发现。
 */
pub fn insert_finding(conn: &Connection, audit_id: i64, finding: &Finding) -> Result<i64> {
    if get_audit(conn, audit_id)?.is_none() {
        bail!("audit id {} not found", audit_id);
    }
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO findings (audit_id, title, description, observation, remediation, poc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                audit_id,
                finding.title,
                finding.description,
                finding.observation,
                finding.remediation,
                finding.poc
            ],
        )
    })?;
    Ok(conn.last_insert_rowid())
}

/**
 * \brief 按插入顺序加载一个审计报告的全部漏洞发现。
 */
pub fn load_findings(conn: &Connection, audit_id: i64) -> Result<Vec<StoredFinding>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, observation, remediation, poc
         FROM findings WHERE audit_id=?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![audit_id], |row| {
            Ok(StoredFinding {
                id: row.get(0)?,
                finding: Finding {
                    title: row.get(1)?,
                    description: row.get(2)?,
                    observation: row.get(3)?,
                    remediation: row.get(4)?,
                    poc: row.get(5)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/**
 * \brief 将翻译后的文本字段写回漏洞发现记录。
 */
pub fn update_finding_texts(conn: &Connection, id: i64, finding: &Finding) -> Result<()> {
    let rows = retry_on_locked(|| {
        conn.execute(
            "UPDATE findings SET title=?1, description=?2, observation=?3, remediation=?4, poc=?5
         WHERE id=?6",
            params![
                finding.title,
                finding.description,
                finding.observation,
                finding.remediation,
                finding.poc,
                id
            ],
        )
    })?;
    if rows == 0 {
        bail!("finding id {} not found", id);
    }
    Ok(())
}

fn retry_on_locked<T, F>(mut action: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    const MAX_RETRIES: usize = 5;
    for attempt in 0..=MAX_RETRIES {
        match action() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) && attempt < MAX_RETRIES =>
            {
                let backoff = Duration::from_millis(200 * (attempt as u64 + 1));
                thread::sleep(backoff);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!("retry_on_locked should have returned within the loop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LlmPrivateSettings, LlmPublicSettings};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn llm_settings_round_trip_keeps_private_section() {
        let conn = memory_db();
        assert!(get_llm_settings(&conn).unwrap().is_none());

        let settings = LlmSettings {
            enabled: true,
            public: LlmPublicSettings {
                provider: Some("deepseek".to_string()),
                model: Some("deepseek-chat".to_string()),
                max_tokens: Some(1024),
                temperature: Some(0.2),
            },
            private: LlmPrivateSettings {
                api_endpoint: Some("https://api.deepseek.com/v1/chat/completions".to_string()),
                api_key: Some("sk-secret".to_string()),
                organization_id: None,
            },
        };
        set_llm_settings(&conn, &settings).unwrap();

        let loaded = get_llm_settings(&conn).unwrap().unwrap();
        assert!(loaded.enabled);
        assert_eq!(loaded.public.model.as_deref(), Some("deepseek-chat"));
        assert_eq!(loaded.private.api_key.as_deref(), Some("sk-secret"));
    }

    #[test]
    fn findings_are_loaded_in_insert_order() {
        let conn = memory_db();
        let audit_id = create_audit(&conn, "Q3 webapp audit").unwrap();

        for title in ["first", "second", "third"] {
            insert_finding(
                &conn,
                audit_id,
                &Finding {
                    title: title.to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let findings = load_findings(&conn, audit_id).unwrap();
        let titles: Vec<&str> = findings.iter().map(|f| f.finding.title.as_str()).collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }

    #[test]
    fn update_finding_texts_writes_back() {
        let conn = memory_db();
        let audit_id = create_audit(&conn, "audit").unwrap();
        let finding_id = insert_finding(
            &conn,
            audit_id,
            &Finding {
                title: "原始标题".to_string(),
                description: "原始描述".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        update_finding_texts(
            &conn,
            finding_id,
            &Finding {
                title: "Translated title".to_string(),
                description: "Translated description".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let findings = load_findings(&conn, audit_id).unwrap();
        assert_eq!(findings[0].finding.title, "Translated title");
    }

    #[test]
    fn insert_into_unknown_audit_fails() {
        let conn = memory_db();
        assert!(insert_finding(&conn, 999, &Finding::default()).is_err());
        assert!(get_audit(&conn, 999).unwrap().is_none());
    }
}
