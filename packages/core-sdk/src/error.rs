use thiserror::Error;

/**
 * \brief AI 核心的统一错误分类。
 *
 * 传输层产出 Provider/Network/Request 三类；配置与入参问题在
 * 发起任何网络调用之前以 Disabled/Configuration/Validation 报出。
 */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    /** \brief AI 能力未启用。 */
    #[error("AI service is not enabled")]
    Disabled,

    /** \brief 配置缺失或不完整；对外呈现时不携带密钥内容。 */
    #[error("AI service configuration error: {message}")]
    Configuration { message: String },

    /** \brief 调用方入参不合法。 */
    #[error("invalid request: {message}")]
    Validation { message: String },

    /** \brief 上游返回了非 2xx 响应。 */
    #[error("{provider} API error ({status}): {message}")]
    Provider {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /** \brief 请求已发出但未收到响应（网络不可达或超时）。 */
    #[error("network error: unable to reach {provider} API at {endpoint}")]
    Network {
        provider: &'static str,
        endpoint: String,
    },

    /** \brief 请求在本地构造阶段即失败，从未发出。 */
    #[error("request error: {message}")]
    Request { message: String },
}

impl AiError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }
}
