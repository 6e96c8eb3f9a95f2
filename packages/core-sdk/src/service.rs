use std::time::Duration;

use serde::Serialize;

use crate::adapter::{self, Credentials};
use crate::completion::{self, FieldType};
use crate::error::AiError;
use crate::lang::TargetLanguage;
use crate::models::{ChatMessage, ChatOptions, ChatRequest, Finding};
use crate::provider;
use crate::settings::SettingsCache;
use crate::telemetry;
use crate::translate::{self, LeakRetryPolicy};
use crate::transport::ChatTransport;

const DEFAULT_MAX_TOKENS: u32 = 2000;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/** \brief 批量翻译中相邻两次调用之间的节流间隔。 */
const TRANSLATE_PACING: Duration = Duration::from_millis(100);

/**
 * \brief 对外暴露的 AI 能力状态；读取失败时整体降级为未启用。
 */
#[derive(Debug, Clone, Serialize)]
pub struct AiStatus {
    pub enabled: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/**
 * \brief AI 服务核心：字段起草与翻译引擎的编排层。
 *
 * 设置提供方与传输实现均以构造参数注入；每次请求都是独立的
 * 异步操作，除设置快照外不共享可变状态。
 */
pub struct AiService<T: ChatTransport> {
    settings: SettingsCache,
    transport: T,
    pacing: Duration,
}

impl<T: ChatTransport> AiService<T> {
    pub fn new(settings: SettingsCache, transport: T) -> Self {
        Self {
            settings,
            transport,
            pacing: TRANSLATE_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.settings
            .snapshot()
            .map(|s| s.enabled)
            .unwrap_or(false)
    }

    /**
     * \brief 设置被外部修改后由路由层调用，替换缓存的快照。
     */
    pub fn refresh_settings(&self) {
        if let Err(err) = self.settings.refresh() {
            telemetry::log_error("ai.settings", &format!("refresh failed: {}", err));
        }
    }

    /**
     * \brief 状态查询永不失败：存储不可用时报告未启用。
     */
    pub fn status(&self) -> AiStatus {
        match self.settings.snapshot() {
            Ok(snapshot) => AiStatus {
                enabled: snapshot.enabled,
                provider: snapshot.public.provider.clone(),
                model: snapshot.public.model.clone(),
            },
            Err(err) => {
                telemetry::log_error("ai.status", &format!("settings unavailable: {}", err));
                AiStatus {
                    enabled: false,
                    provider: None,
                    model: None,
                }
            }
        }
    }

    /**
     * \brief 执行一次聊天补全：取快照、检测 Provider、整形请求、
     *        发出单次传输调用并提取文本。
     */
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, AiError> {
        let snapshot = self
            .settings
            .snapshot()
            .map_err(|err| AiError::configuration(format!("settings unavailable: {}", err)))?;
        if !snapshot.enabled {
            return Err(AiError::Disabled);
        }

        let endpoint = adapter::fix_endpoint(snapshot.private.api_endpoint.as_deref());
        let provider = provider::detect(&endpoint);

        let request = ChatRequest {
            model: snapshot.public.model.clone(),
            messages,
            max_tokens: options
                .max_tokens
                .or(snapshot.public.max_tokens)
                .or(Some(DEFAULT_MAX_TOKENS)),
            temperature: options
                .temperature
                .or(snapshot.public.temperature)
                .or(Some(DEFAULT_TEMPERATURE)),
        };
        let credentials = Credentials {
            api_key: snapshot.private.api_key.clone(),
            organization_id: snapshot.private.organization_id.clone(),
        };
        if let Some(key) = credentials.api_key.as_deref() {
            telemetry::register_secret(key);
        }

        let adapted = adapter::adapt(&request, provider, &credentials)?;

        // 日志只记录端点与模型，绝不记录认证材料
        telemetry::log_event(
            "ai.chat",
            &format!(
                "provider={} endpoint={} model={}",
                provider.name(),
                endpoint,
                adapted.body.get("model").and_then(|m| m.as_str()).unwrap_or("")
            ),
        );

        match self.transport.send(&endpoint, &adapted).await {
            Ok(response) => Ok(response.text),
            Err(err) => {
                let err = sanitize_error(err, credentials.api_key.as_deref());
                telemetry::log_error("ai.chat", &format!("{}", err));
                Err(err)
            }
        }
    }

    /**
     * \brief 起草一个漏洞文本字段。
     *
     * 标题或证据含中文字符时强制中文提示词，覆盖请求语言。
     */
    pub async fn complete_field(
        &self,
        title: &str,
        current_content: &str,
        field_type: FieldType,
        language: TargetLanguage,
        proof: Option<&str>,
    ) -> Result<String, AiError> {
        if !self.is_enabled() {
            return Err(AiError::Disabled);
        }
        let language = completion::resolve_language(title, proof.unwrap_or(""), language);
        let messages = completion::build_messages(title, current_content, field_type, language, proof);
        self.chat(messages, ChatOptions::default()).await
    }

    /**
     * \brief 翻译一段内容到目标语言。
     *
     * en 方向若译文仍含中文字符则按策略加严重试一次；重试失败或
     * 返回空串时保留首次译文。zh 方向不重试。
     */
    pub async fn translate(
        &self,
        content: &str,
        target: TargetLanguage,
    ) -> Result<String, AiError> {
        if !self.is_enabled() {
            return Err(AiError::Disabled);
        }

        let mut translated = self
            .chat(translate::build_messages(content, target), ChatOptions::default())
            .await?;

        let policy = LeakRetryPolicy::default();
        let mut attempt = 1;
        while policy.should_retry(attempt, target, &translated) {
            attempt += 1;
            match self
                .chat(translate::build_strict_retry_messages(content), ChatOptions::default())
                .await
            {
                Ok(text) if !text.is_empty() => translated = text,
                Ok(_) => break,
                Err(err) => {
                    telemetry::log_error("ai.translate", &format!("strict retry failed: {}", err));
                    break;
                }
            }
        }

        Ok(translated)
    }

    /**
     * \brief 逐条、逐字段翻译一批漏洞发现，输出顺序与输入一致。
     *
     * 单个字段失败只保留原文并记录日志，不中断批次；相邻调用之间
     * 插入固定节流间隔以尊重上游限流。批次刻意保持串行。
     */
    pub async fn translate_findings(
        &self,
        findings: &[Finding],
        target: TargetLanguage,
    ) -> Result<Vec<Finding>, AiError> {
        if !self.is_enabled() {
            return Err(AiError::Disabled);
        }

        let mut translated = Vec::with_capacity(findings.len());
        for finding in findings {
            let mut out = finding.clone();
            self.translate_field("title", &mut out.title, target).await;
            self.translate_field("description", &mut out.description, target)
                .await;
            self.translate_field("observation", &mut out.observation, target)
                .await;
            self.translate_field("remediation", &mut out.remediation, target)
                .await;
            self.translate_field("poc", &mut out.poc, target).await;
            translated.push(out);
        }
        Ok(translated)
    }

    async fn translate_field(&self, name: &str, value: &mut String, target: TargetLanguage) {
        if value.trim().is_empty() {
            return;
        }
        match self.translate(value, target).await {
            Ok(text) => *value = text,
            Err(err) => {
                telemetry::log_error(
                    "ai.translate",
                    &format!("field {} kept original: {}", name, err),
                );
            }
        }
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

/**
 * \brief 上游错误消息若回显了密钥则打码后再向上抛。
 */
fn sanitize_error(err: AiError, api_key: Option<&str>) -> AiError {
    let Some(key) = api_key.filter(|k| !k.is_empty()) else {
        return err;
    };
    match err {
        AiError::Provider {
            provider,
            status,
            message,
        } => AiError::Provider {
            provider,
            status,
            message: message.replace(key, "***"),
        },
        other => other,
    }
}
