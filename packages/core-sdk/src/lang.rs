use std::str::FromStr;

use crate::error::AiError;

/**
 * \brief 翻译/起草的目标语言。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLanguage {
    En,
    Zh,
}

impl TargetLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "zh" => Ok(Self::Zh),
            other => Err(AiError::validation(format!(
                "Unsupported target language: {}",
                other
            ))),
        }
    }
}

/**
 * \brief 判断文本中是否含有 CJK 统一表意文字（U+4E00..U+9FFF）。
 *
 * 字段补全的语言覆盖与翻译泄漏检测共用此判定。
 */
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}
