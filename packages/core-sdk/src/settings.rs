use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::db;
use crate::models::LlmSettings;

/**
 * \brief 设置存储接口；AI 核心只读取快照，不拥有持久化语义。
 */
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<LlmSettings>;
}

/**
 * \brief 基于本地 SQLite 的设置存储。
 */
pub struct SqliteSettingsStore {
    db_path: PathBuf,
}

impl SqliteSettingsStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load(&self) -> Result<LlmSettings> {
        let conn = db::open_db(&self.db_path)?;
        Ok(db::get_llm_settings(&conn)?.unwrap_or_default())
    }
}

/**
 * \brief 进程内设置缓存：整体替换快照，显式 refresh/invalidate。
 *
 * 读多写少，替换即一次引用交换，无需细粒度加锁。
 * 以构造参数注入引擎，避免进程级全局可变状态。
 */
pub struct SettingsCache {
    store: Box<dyn SettingsStore>,
    cached: RwLock<Option<Arc<LlmSettings>>>,
}

impl SettingsCache {
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    /**
     * \brief 返回当前快照；缓存为空时从存储加载一次。
     */
    pub fn snapshot(&self) -> Result<Arc<LlmSettings>> {
        if let Ok(guard) = self.cached.read() {
            if let Some(snapshot) = guard.as_ref() {
                return Ok(Arc::clone(snapshot));
            }
        }
        self.refresh()
    }

    /**
     * \brief 重新加载并整体替换缓存的快照。
     */
    pub fn refresh(&self) -> Result<Arc<LlmSettings>> {
        let fresh = Arc::new(self.store.load()?);
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(Arc::clone(&fresh));
        }
        Ok(fresh)
    }

    /**
     * \brief 丢弃缓存；下次读取将重新加载。
     */
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }
}
