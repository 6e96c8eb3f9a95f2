use serde::{Deserialize, Serialize};

/**
 * \brief 消息角色，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /** \brief 角色：system/user/assistant */
    pub role: Role,
    /** \brief 内容 */
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/**
 * \brief 与具体 Provider 无关的聊天补全请求。
 *
 * 不变量：messages 非空；system 消息至多一条且必须位于首位，
 * 由请求适配层在出站前校验。
 */
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /** \brief 模型名，缺省时由 Provider 档案填充 */
    pub model: Option<String>,
    /** \brief 有序消息序列 */
    pub messages: Vec<ChatMessage>,
    /** \brief 最大生成 token 数 */
    pub max_tokens: Option<u32>,
    /** \brief 采样温度，范围 [0, 2] */
    pub temperature: Option<f32>,
}

/**
 * \brief 单次调用的生成参数覆盖。
 */
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/**
 * \brief 归一化后的补全结果；提取失败时 text 为空串而非 None。
 */
#[derive(Debug, Clone, Default)]
pub struct AiResponse {
    pub text: String,
}

/**
 * \brief 一条漏洞发现记录中可被 AI 起草/翻译的文本字段。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub remediation: String,
    #[serde(default)]
    pub poc: String,
}

/**
 * \brief LLM 配置快照，来源于设置存储，进程内缓存只读。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSettings {
    /** \brief AI 能力总开关 */
    #[serde(default)]
    pub enabled: bool,
    /** \brief 可暴露给前端的公开配置 */
    #[serde(default)]
    pub public: LlmPublicSettings,
    /** \brief 仅服务端可见的私有配置 */
    #[serde(default)]
    pub private: LlmPrivateSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmPublicSettings {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/**
 * \brief 私有配置；禁止出现在公开设置读取与任何日志中。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmPrivateSettings {
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}
