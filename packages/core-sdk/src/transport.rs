use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

use crate::adapter::ProviderRequest;
use crate::error::AiError;
use crate::models::AiResponse;

/** \brief 出站调用的统一超时上限。 */
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/**
 * \brief 传输层接口：执行一次已整形的出站调用并归一化失败。
 *
 * 引擎层只依赖此接口，测试以桩实现替换真实 HTTP 客户端。
 * 本层不做任何重试；重试策略只存在于翻译引擎的泄漏场景。
 */
pub trait ChatTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        request: &'a ProviderRequest,
    ) -> BoxFuture<'a, Result<AiResponse, AiError>>;
}

/**
 * \brief 基于 reqwest 的真实传输实现。
 */
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTransport for HttpTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        request: &'a ProviderRequest,
    ) -> BoxFuture<'a, Result<AiResponse, AiError>> {
        Box::pin(async move {
            let provider = request.provider.name();

            let response = self
                .client
                .post(endpoint)
                .timeout(REQUEST_TIMEOUT)
                .headers(request.headers.clone())
                .json(&request.body)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) if err.is_timeout() || err.is_connect() => {
                    return Err(AiError::Network {
                        provider,
                        endpoint: endpoint.to_string(),
                    });
                }
                Err(err) => return Err(AiError::request(err.to_string())),
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(AiError::Provider {
                    provider,
                    status,
                    message: provider_error_message(&body),
                });
            }

            // 2xx 下即使响应体不可解析也不报错，内容缺失归一化为空串
            let value = response.json::<Value>().await.unwrap_or(Value::Null);
            Ok(AiResponse {
                text: extract_chat_content(&value),
            })
        })
    }
}

/**
 * \brief 提取 choices[0].message.content，缺失时返回空串。
 */
pub fn extract_chat_content(value: &Value) -> String {
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}

/**
 * \brief 从异构错误响应体中挑出可读消息。
 *
 * 优先级：嵌套 error.message、扁平 message、原始响应文本、"Unknown error"。
 */
fn provider_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    if !body.trim().is_empty() {
        return body.to_string();
    }
    "Unknown error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_first_choice_message_content() {
        let value = json!({
            "choices": [{"message": {"role": "assistant", "content": "done"}}]
        });
        assert_eq!(extract_chat_content(&value), "done");
    }

    #[test]
    fn missing_content_extracts_to_empty_string() {
        assert_eq!(extract_chat_content(&json!({})), "");
        assert_eq!(extract_chat_content(&json!({"choices": []})), "");
        assert_eq!(extract_chat_content(&Value::Null), "");
        assert_eq!(
            extract_chat_content(&json!({"choices": [{"message": {}}]})),
            ""
        );
    }

    #[test]
    fn error_message_prefers_nested_then_flat_then_raw() {
        assert_eq!(
            provider_error_message(r#"{"error": {"message": "bad key"}, "message": "outer"}"#),
            "bad key"
        );
        assert_eq!(provider_error_message(r#"{"message": "quota exceeded"}"#), "quota exceeded");
        assert_eq!(provider_error_message("upstream overloaded"), "upstream overloaded");
        assert_eq!(provider_error_message(""), "Unknown error");
        assert_eq!(provider_error_message("   "), "Unknown error");
    }
}
