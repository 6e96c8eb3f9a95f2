pub mod adapter;
pub mod completion;
pub mod db;
pub mod error;
pub mod lang;
pub mod models;
pub mod provider;
pub mod server;
pub mod service;
pub mod settings;
pub mod telemetry;
pub mod translate;
pub mod transport;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::adapter;
    pub use crate::completion;
    pub use crate::db;
    pub use crate::error::AiError;
    pub use crate::lang::TargetLanguage;
    pub use crate::models;
    pub use crate::provider;
    pub use crate::server;
    pub use crate::service::AiService;
    pub use crate::settings;
    pub use crate::telemetry;
    pub use crate::translate;
    pub use crate::transport;
}
