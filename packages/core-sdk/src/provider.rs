use serde_json::{json, Value};

/** \brief OpenAI 缺省模型名；多数 Provider 以它作为"未显式配置"的哨兵值。 */
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/**
 * \brief 受支持的 LLM Provider 标识，由端点字符串纯推导，绝不落盘。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAi,
    Ollama,
    ModelScope,
    DeepSeek,
    Anthropic,
    Groq,
    Together,
}

impl ProviderId {
    /** \brief 小写标识名，用于日志与错误消息。 */
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::ModelScope => "modelscope",
            Self::DeepSeek => "deepseek",
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
            Self::Together => "together",
        }
    }

    pub fn profile(self) -> &'static ProviderProfile {
        match self {
            Self::OpenAi => &OPENAI,
            Self::Ollama => &OLLAMA,
            Self::ModelScope => &MODELSCOPE,
            Self::DeepSeek => &DEEPSEEK,
            Self::Anthropic => &ANTHROPIC,
            Self::Groq => &GROQ,
            Self::Together => &TOGETHER,
        }
    }
}

/**
 * \brief 根据端点字符串判定 Provider 类型。
 *
 * 纯字符串匹配，不发起任何网络探测；首条命中规则生效，
 * 无端点或无法识别时退化为 OpenAI 格式。
 */
pub fn detect(endpoint: &str) -> ProviderId {
    let endpoint = endpoint.to_lowercase();

    if endpoint.contains("localhost")
        || endpoint.contains("127.0.0.1")
        || endpoint.contains("11434")
    {
        ProviderId::Ollama
    } else if endpoint.contains("modelscope.cn") || endpoint.contains("dashscope.aliyuncs.com") {
        ProviderId::ModelScope
    } else if endpoint.contains("openai.com") {
        ProviderId::OpenAi
    } else if endpoint.contains("api.deepseek.com") {
        ProviderId::DeepSeek
    } else if endpoint.contains("api.anthropic.com") {
        ProviderId::Anthropic
    } else if endpoint.contains("api.groq.com") {
        ProviderId::Groq
    } else if endpoint.contains("api.together.xyz") {
        ProviderId::Together
    } else {
        ProviderId::OpenAi
    }
}

/**
 * \brief 有密钥时采用的认证头策略；无密钥的放行与否由
 *        requires_api_key 单独表达。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /** \brief Authorization: Bearer <key> */
    Bearer,
    /** \brief 专用 API-key 头（Anthropic：x-api-key + 协议版本头） */
    ApiKeyHeader,
}

/**
 * \brief Provider 静态档案：推荐端点、缺省模型、认证策略与请求整形规则。
 *
 * 新增 Provider 只需补一条表项，而非在适配层散落分支。
 */
pub struct ProviderProfile {
    pub id: ProviderId,
    pub default_endpoint: &'static str,
    pub default_model: &'static str,
    pub auth: AuthStrategy,
    /** \brief 无密钥时是否允许放行（仅本地 Ollama 为 false） */
    pub requires_api_key: bool,
    /** \brief 请求体整形规则，在缺省模型填充之后应用 */
    pub shape: fn(&ProviderProfile, &mut Value),
}

static OPENAI: ProviderProfile = ProviderProfile {
    id: ProviderId::OpenAi,
    default_endpoint: "https://api.openai.com/v1/chat/completions",
    default_model: OPENAI_DEFAULT_MODEL,
    auth: AuthStrategy::Bearer,
    requires_api_key: true,
    shape: shape_identity,
};

static OLLAMA: ProviderProfile = ProviderProfile {
    id: ProviderId::Ollama,
    default_endpoint: "http://localhost:11434/v1/chat/completions",
    default_model: "llama2",
    auth: AuthStrategy::Bearer,
    requires_api_key: false,
    shape: shape_ollama,
};

static MODELSCOPE: ProviderProfile = ProviderProfile {
    id: ProviderId::ModelScope,
    default_endpoint: "https://api-inference.modelscope.cn/v1/chat/completions",
    default_model: "Qwen/Qwen2.5-Coder-32B-Instruct",
    auth: AuthStrategy::Bearer,
    requires_api_key: true,
    shape: shape_modelscope,
};

static DEEPSEEK: ProviderProfile = ProviderProfile {
    id: ProviderId::DeepSeek,
    default_endpoint: "https://api.deepseek.com/v1/chat/completions",
    default_model: "deepseek-chat",
    auth: AuthStrategy::Bearer,
    requires_api_key: true,
    shape: shape_prefer_default_model,
};

static ANTHROPIC: ProviderProfile = ProviderProfile {
    id: ProviderId::Anthropic,
    default_endpoint: "https://api.anthropic.com/v1/messages",
    default_model: "claude-3-sonnet-20240229",
    auth: AuthStrategy::ApiKeyHeader,
    requires_api_key: true,
    shape: shape_prefer_default_model,
};

static GROQ: ProviderProfile = ProviderProfile {
    id: ProviderId::Groq,
    default_endpoint: "https://api.groq.com/openai/v1/chat/completions",
    default_model: "llama2-70b-4096",
    auth: AuthStrategy::Bearer,
    requires_api_key: true,
    shape: shape_prefer_default_model,
};

static TOGETHER: ProviderProfile = ProviderProfile {
    id: ProviderId::Together,
    default_endpoint: "https://api.together.xyz/v1/chat/completions",
    default_model: "meta-llama/Llama-2-7b-chat-hf",
    auth: AuthStrategy::Bearer,
    requires_api_key: true,
    shape: shape_prefer_default_model,
};

fn shape_identity(_profile: &ProviderProfile, _body: &mut Value) {}

/**
 * \brief Ollama 使用 options.num_predict 表达生成上限，移除通用的 max_tokens。
 */
fn shape_ollama(_profile: &ProviderProfile, body: &mut Value) {
    let Some(obj) = body.as_object_mut() else {
        return;
    };
    if let Some(max_tokens) = obj.remove("max_tokens") {
        let options = obj
            .entry("options")
            .or_insert_with(|| json!({}));
        options["num_predict"] = max_tokens;
    }
}

/**
 * \brief ModelScope 要求带命名空间的模型名；未配置或沿用 OpenAI
 *        缺省名时替换为推荐模型。
 */
fn shape_modelscope(profile: &ProviderProfile, body: &mut Value) {
    let model = body
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    if model.is_empty() || model == OPENAI_DEFAULT_MODEL || !model.contains('/') {
        body["model"] = json!(profile.default_model);
    }
}

/**
 * \brief 未配置模型或沿用 OpenAI 缺省名时，改用该 Provider 的推荐模型。
 */
fn shape_prefer_default_model(profile: &ProviderProfile, body: &mut Value) {
    let model = body
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or_default();
    if model.is_empty() || model == OPENAI_DEFAULT_MODEL {
        body["model"] = json!(profile.default_model);
    }
}
