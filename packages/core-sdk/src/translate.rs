use crate::lang::{contains_cjk, TargetLanguage};
use crate::models::ChatMessage;

const SYSTEM_EN: &str = "You are a professional cybersecurity translator. Your output MUST be entirely in English only. Do not include any Chinese characters. Preserve all HTML tags, code blocks, URLs, numbers and structure exactly as in the input. Do not add explanations, quotes, or wrappers. Return only the translated content.";

const SYSTEM_ZH: &str = "你是一名专业的网络安全翻译员。你的输出必须完全为中文。不要包含英文原句复述或多余解释。必须完全保留输入中的所有HTML标签、代码块、URL、数字和结构。只返回翻译后的内容。";

/**
 * \brief 构造严格限定输出语言的 system + user 消息对。
 */
pub fn build_messages(content: &str, target: TargetLanguage) -> Vec<ChatMessage> {
    match target {
        TargetLanguage::En => vec![
            ChatMessage::system(SYSTEM_EN),
            ChatMessage::user(format!(
"You are a cybersecurity expert translator. Translate ONLY the Chinese text in the following content to English while:
1. Preserving ALL HTML tags exactly as they are
2. Only translating Chinese characters to English
3. Using professional cybersecurity terminology
4. Keeping all English text unchanged
5. Maintaining the exact structure and formatting
6. The final output must be 100% English and contain NO Chinese characters

Content to translate:
{content}

Provide only the translated content with preserved HTML tags, no additional explanations."
            )),
        ],
        TargetLanguage::Zh => vec![
            ChatMessage::system(SYSTEM_ZH),
            ChatMessage::user(format!(
"你是网络安全专家翻译员。将以下内容中的英文翻译成中文，同时：
1. 完全保留所有HTML标签
2. 只翻译英文字符为中文
3. 使用专业的网络安全术语
4. 保持所有中文文本不变
5. 维持确切的结构和格式

要翻译的内容：
{content}

只提供保留HTML标签的翻译内容，不要额外的解释。"
            )),
        ],
    }
}

/**
 * \brief 首次输出仍泄漏源语言字符时的加严重试消息对，
 *        显式指出上一次失败。
 */
pub fn build_strict_retry_messages(content: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_EN),
        ChatMessage::user(format!(
            "STRICT MODE: The previous output contained Chinese characters. Translate the following content to English and ensure the output contains NO Chinese characters. Preserve all HTML tags exactly.\n\nContent:\n{}\n\nReturn only the translated content.",
            content
        )),
    ]
}

/**
 * \brief 有界重试策略：仅当译文仍含源语言文字时重试，且总次数受限。
 *
 * 谓词与提示词构造解耦，可独立测试；zh 方向从不重试。
 */
#[derive(Debug, Clone, Copy)]
pub struct LeakRetryPolicy {
    pub max_attempts: u32,
}

impl Default for LeakRetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl LeakRetryPolicy {
    /**
     * \brief attempt 为已完成的尝试序号（从 1 起）。
     */
    pub fn should_retry(&self, attempt: u32, target: TargetLanguage, output: &str) -> bool {
        attempt < self.max_attempts && target == TargetLanguage::En && contains_cjk(output)
    }
}
