use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::error::AiError;
use crate::models::{ChatRequest, Role};
use crate::provider::{AuthStrategy, ProviderId};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/**
 * \brief 出站调用所需的认证材料，来自私有设置。
 */
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
}

impl Credentials {
    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/**
 * \brief 按目标 Provider 格式整形后的请求；对适配层之上的调用方不透明。
 */
#[derive(Clone)]
pub struct ProviderRequest {
    pub provider: ProviderId,
    pub body: Value,
    pub headers: HeaderMap,
}

/** \brief 日志中只允许出现端点与模型名；Debug 输出不展开认证头。 */
impl std::fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("provider", &self.provider.name())
            .field("model", &self.body.get("model"))
            .field("headers", &"<redacted>")
            .finish()
    }
}

/**
 * \brief 将与 Provider 无关的聊天请求整形为目标 Provider 的请求体与请求头。
 *
 * 纯函数：相同输入两次调用产出完全一致的结果。缺失密钥的配置错误
 * 在此处报出，保证不会发起任何网络调用。
 */
pub fn adapt(
    request: &ChatRequest,
    provider: ProviderId,
    credentials: &Credentials,
) -> Result<ProviderRequest, AiError> {
    validate(request)?;

    let profile = provider.profile();
    if credentials.api_key().is_none() && profile.requires_api_key {
        return Err(AiError::configuration(format!(
            "API key is required for {} provider",
            provider.name()
        )));
    }

    let mut body = json!({
        "model": request
            .model
            .clone()
            .unwrap_or_else(|| profile.default_model.to_string()),
        "messages": request.messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    (profile.shape)(profile, &mut body);

    let headers = build_headers(provider, credentials)?;

    Ok(ProviderRequest {
        provider,
        body,
        headers,
    })
}

fn validate(request: &ChatRequest) -> Result<(), AiError> {
    if request.messages.is_empty() {
        return Err(AiError::validation("messages must not be empty"));
    }
    let system_count = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .count();
    if system_count > 1 {
        return Err(AiError::validation("at most one system message is allowed"));
    }
    if system_count == 1 && request.messages[0].role != Role::System {
        return Err(AiError::validation("system message must come first"));
    }
    if request.max_tokens == Some(0) {
        return Err(AiError::validation("max_tokens must be greater than zero"));
    }
    if let Some(t) = request.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(AiError::validation("temperature must be within [0, 2]"));
        }
    }
    Ok(())
}

fn build_headers(provider: ProviderId, credentials: &Credentials) -> Result<HeaderMap, AiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let profile = provider.profile();
    let Some(api_key) = credentials.api_key() else {
        // 仅本地 Ollama 允许无认证直连
        return Ok(headers);
    };

    match profile.auth {
        AuthStrategy::ApiKeyHeader => {
            headers.insert("x-api-key", secret_header(api_key)?);
            headers.insert(
                "anthropic-version",
                HeaderValue::from_static(ANTHROPIC_VERSION),
            );
        }
        AuthStrategy::Bearer => {
            headers.insert(AUTHORIZATION, secret_header(&format!("Bearer {}", api_key))?);
            if provider == ProviderId::OpenAi {
                if let Some(org) = credentials
                    .organization_id
                    .as_deref()
                    .filter(|o| !o.is_empty())
                {
                    headers.insert("OpenAI-Organization", secret_header(org)?);
                }
            }
        }
    }

    Ok(headers)
}

fn secret_header(value: &str) -> Result<HeaderValue, AiError> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| AiError::configuration("API credential contains invalid header characters"))?;
    header.set_sensitive(true);
    Ok(header)
}

/**
 * \brief 解析并修复配置中的 API 端点。
 *
 * 未配置时退回 OpenAI 缺省端点；顺带修正常见的 ModelScope
 * 端点漏写 /chat/completions 的错误。
 */
pub fn fix_endpoint(configured: Option<&str>) -> String {
    let endpoint = configured
        .filter(|e| !e.is_empty())
        .unwrap_or(ProviderId::OpenAi.profile().default_endpoint);

    if endpoint.contains("api-inference.modelscope.cn/v1/") && !endpoint.contains("/chat/completions")
    {
        return ProviderId::ModelScope.profile().default_endpoint.to_string();
    }
    endpoint.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    fn request(model: Option<&str>, max_tokens: Option<u32>) -> ChatRequest {
        ChatRequest {
            model: model.map(|m| m.to_string()),
            messages: vec![ChatMessage::user("describe the finding")],
            max_tokens,
            temperature: Some(0.7),
        }
    }

    fn with_key() -> Credentials {
        Credentials {
            api_key: Some("sk-test-123".to_string()),
            organization_id: None,
        }
    }

    #[test]
    fn ollama_moves_max_tokens_into_num_predict() {
        let adapted = adapt(&request(None, Some(2000)), ProviderId::Ollama, &Credentials::default())
            .unwrap();
        assert!(adapted.body.get("max_tokens").is_none());
        assert_eq!(adapted.body["options"]["num_predict"], 2000);
        assert_eq!(adapted.body["model"], "llama2");
    }

    #[test]
    fn ollama_without_max_tokens_has_no_options() {
        let adapted = adapt(&request(None, None), ProviderId::Ollama, &Credentials::default())
            .unwrap();
        assert!(adapted.body.get("options").is_none());
    }

    #[test]
    fn ollama_is_allowed_without_api_key() {
        let adapted = adapt(&request(None, None), ProviderId::Ollama, &Credentials::default())
            .unwrap();
        assert!(adapted.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn missing_key_is_a_configuration_error_for_remote_providers() {
        for provider in [
            ProviderId::OpenAi,
            ProviderId::ModelScope,
            ProviderId::DeepSeek,
            ProviderId::Anthropic,
            ProviderId::Groq,
            ProviderId::Together,
        ] {
            let err = adapt(&request(None, None), provider, &Credentials::default()).unwrap_err();
            match err {
                AiError::Configuration { message } => {
                    assert!(message.contains(provider.name()))
                }
                other => panic!("expected configuration error, got {:?}", other),
            }
        }
    }

    #[test]
    fn adapt_is_idempotent() {
        let req = request(Some("gpt-4"), Some(512));
        let first = adapt(&req, ProviderId::OpenAi, &with_key()).unwrap();
        let second = adapt(&req, ProviderId::OpenAi, &with_key()).unwrap();
        assert_eq!(first.body, second.body);
        assert_eq!(first.headers, second.headers);
    }

    #[test]
    fn modelscope_forces_namespaced_model() {
        let adapted =
            adapt(&request(Some("gpt-3.5-turbo"), None), ProviderId::ModelScope, &with_key())
                .unwrap();
        assert_eq!(adapted.body["model"], "Qwen/Qwen2.5-Coder-32B-Instruct");

        let adapted =
            adapt(&request(Some("qwen-coder"), None), ProviderId::ModelScope, &with_key()).unwrap();
        assert_eq!(adapted.body["model"], "Qwen/Qwen2.5-Coder-32B-Instruct");

        let adapted =
            adapt(&request(Some("Team/custom-model"), None), ProviderId::ModelScope, &with_key())
                .unwrap();
        assert_eq!(adapted.body["model"], "Team/custom-model");
    }

    #[test]
    fn deepseek_replaces_openai_sentinel_model() {
        let adapted =
            adapt(&request(Some("gpt-3.5-turbo"), None), ProviderId::DeepSeek, &with_key())
                .unwrap();
        assert_eq!(adapted.body["model"], "deepseek-chat");

        let adapted = adapt(&request(Some("deepseek-coder"), None), ProviderId::DeepSeek, &with_key())
            .unwrap();
        assert_eq!(adapted.body["model"], "deepseek-coder");
    }

    #[test]
    fn anthropic_uses_api_key_header_and_protocol_version() {
        let adapted = adapt(&request(None, None), ProviderId::Anthropic, &with_key()).unwrap();
        assert_eq!(adapted.body["model"], "claude-3-sonnet-20240229");
        assert!(adapted.headers.get(AUTHORIZATION).is_none());
        assert_eq!(adapted.headers["x-api-key"], "sk-test-123");
        assert_eq!(adapted.headers["anthropic-version"], "2023-06-01");
    }

    #[test]
    fn openai_sets_bearer_and_optional_organization() {
        let credentials = Credentials {
            api_key: Some("sk-test-123".to_string()),
            organization_id: Some("org-42".to_string()),
        };
        let adapted = adapt(&request(None, None), ProviderId::OpenAi, &credentials).unwrap();
        assert_eq!(adapted.headers[AUTHORIZATION.as_str()], "Bearer sk-test-123");
        assert_eq!(adapted.headers["OpenAI-Organization"], "org-42");
    }

    #[test]
    fn invariants_are_checked_before_shaping() {
        let empty = ChatRequest {
            model: None,
            messages: vec![],
            max_tokens: None,
            temperature: None,
        };
        assert!(matches!(
            adapt(&empty, ProviderId::OpenAi, &with_key()),
            Err(AiError::Validation { .. })
        ));

        let zero_max_tokens = ChatRequest {
            model: None,
            messages: vec![ChatMessage::user("hello")],
            max_tokens: Some(0),
            temperature: None,
        };
        assert!(matches!(
            adapt(&zero_max_tokens, ProviderId::OpenAi, &with_key()),
            Err(AiError::Validation { .. })
        ));
        assert!(adapt(&request(None, Some(1)), ProviderId::OpenAi, &with_key()).is_ok());

        let misplaced_system = ChatRequest {
            model: None,
            messages: vec![ChatMessage::user("hello"), ChatMessage::system("late")],
            max_tokens: None,
            temperature: None,
        };
        assert!(matches!(
            adapt(&misplaced_system, ProviderId::OpenAi, &with_key()),
            Err(AiError::Validation { .. })
        ));
    }

    #[test]
    fn debug_output_never_contains_the_api_key() {
        let adapted = adapt(&request(None, None), ProviderId::OpenAi, &with_key()).unwrap();
        let rendered = format!("{:?}", adapted);
        assert!(!rendered.contains("sk-test-123"));
    }

    #[test]
    fn fix_endpoint_defaults_and_repairs_modelscope() {
        assert_eq!(fix_endpoint(None), "https://api.openai.com/v1/chat/completions");
        assert_eq!(fix_endpoint(Some("")), "https://api.openai.com/v1/chat/completions");
        assert_eq!(
            fix_endpoint(Some("https://api-inference.modelscope.cn/v1/")),
            "https://api-inference.modelscope.cn/v1/chat/completions"
        );
        assert_eq!(
            fix_endpoint(Some("https://api.deepseek.com/v1/chat/completions")),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }
}
