use std::str::FromStr;

use crate::error::AiError;
use crate::lang::{contains_cjk, TargetLanguage};
use crate::models::ChatMessage;

/**
 * \brief 允许 AI 起草的漏洞字段。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Description,
    Observation,
    Remediation,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Observation => "observation",
            Self::Remediation => "remediation",
        }
    }
}

impl FromStr for FieldType {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(Self::Description),
            "observation" => Ok(Self::Observation),
            "remediation" => Ok(Self::Remediation),
            other => Err(AiError::validation(format!(
                "Invalid fieldType: {}. Allowed values: description, observation, remediation",
                other
            ))),
        }
    }
}

/**
 * \brief 选定提示词语言：标题或证据中含中文字符时强制中文输出，
 *        否则沿用请求的语言。
 */
pub fn resolve_language(title: &str, proof: &str, requested: TargetLanguage) -> TargetLanguage {
    if contains_cjk(title) || contains_cjk(proof) {
        TargetLanguage::Zh
    } else {
        requested
    }
}

/**
 * \brief 构造字段补全的消息序列：恰好一条 user 消息，不带 system 消息。
 *
 * 提示词按 (字段, 语言, 是否带证据) 确定性生成；当前内容缺省时
 * 以 "None"/"无" 占位。
 */
pub fn build_messages(
    title: &str,
    current_content: &str,
    field: FieldType,
    language: TargetLanguage,
    proof: Option<&str>,
) -> Vec<ChatMessage> {
    let proof = proof.filter(|p| !p.trim().is_empty());
    let prompt = match (field, language) {
        (FieldType::Description, TargetLanguage::En) => description_en(title, current_content, proof),
        (FieldType::Description, TargetLanguage::Zh) => description_zh(title, current_content, proof),
        (FieldType::Observation, TargetLanguage::En) => observation_en(title, current_content, proof),
        (FieldType::Observation, TargetLanguage::Zh) => observation_zh(title, current_content, proof),
        (FieldType::Remediation, TargetLanguage::En) => remediation_en(title, current_content, proof),
        (FieldType::Remediation, TargetLanguage::Zh) => remediation_zh(title, current_content, proof),
    };
    vec![ChatMessage::user(prompt)]
}

fn current_or_none(current: &str, language: TargetLanguage) -> String {
    if current.trim().is_empty() {
        match language {
            TargetLanguage::En => "None".to_string(),
            TargetLanguage::Zh => "无".to_string(),
        }
    } else {
        current.to_string()
    }
}

fn description_en(title: &str, current: &str, proof: Option<&str>) -> String {
    let intro = match proof {
        Some(p) => format!(" with the following proof of concept evidence:\n\n{}\n\n", p),
        None => " ".to_string(),
    };
    let lead = if proof.is_some() {
        "Based on the specific proof of concept provided above, "
    } else {
        ""
    };
    let poc_line = if proof.is_some() {
        "\n- Direct analysis of the provided proof of concept"
    } else {
        ""
    };
    let closing = if proof.is_some() {
        "Ensure your description directly references and explains the proof of concept evidence provided. "
    } else {
        ""
    };
    format!(
"You are a cybersecurity expert. Analyze the vulnerability \"{title}\"{intro}and provide a comprehensive technical description.

{lead}focus on:
- What the vulnerability is and its classification
- Root cause analysis of how it occurs
- Technical details about the underlying flaw
- Attack vectors and exploitation methods{poc_line}
- Security implications and potential impact

{closing}Keep the response professional and detailed but concise (2-4 paragraphs). Use precise technical terminology.

Current content: {current}

Provide only the description content, no additional formatting or explanations.",
        current = current_or_none(current, TargetLanguage::En),
    )
}

fn description_zh(title: &str, current: &str, proof: Option<&str>) -> String {
    let intro = match proof {
        Some(p) => format!("，结合以下概念验证证据：\n\n{}\n\n", p),
        None => "，".to_string(),
    };
    let lead = if proof.is_some() { "基于上述提供的具体概念验证，" } else { "" };
    let poc_line = if proof.is_some() { "\n- 对提供的概念验证的直接分析" } else { "" };
    let closing = if proof.is_some() { "确保你的描述直接引用并解释提供的概念验证证据。" } else { "" };
    format!(
"你是网络安全专家。分析漏洞\"{title}\"{intro}提供全面的技术描述。

{lead}重点包括：
- 漏洞是什么及其分类
- 发生原因的根本分析
- 底层缺陷的技术细节
- 攻击向量和利用方法{poc_line}
- 安全影响和潜在后果

{closing}保持回复专业且详细但简洁（2-4段）。使用精确的技术术语。

当前内容：{current}

只提供描述内容，不要额外的格式或解释。",
        current = current_or_none(current, TargetLanguage::Zh),
    )
}

fn observation_en(title: &str, current: &str, proof: Option<&str>) -> String {
    let intro = match proof {
        Some(p) => format!(" and the following proof of concept:\n\n{}\n\n", p),
        None => " ".to_string(),
    };
    let lead = if proof.is_some() {
        "Analyze the specific proof of concept provided and "
    } else {
        ""
    };
    let poc_line = if proof.is_some() {
        "\n- Detailed breakdown of the provided proof of concept"
    } else {
        ""
    };
    let closing = if proof.is_some() {
        "Your observations should directly correlate with and explain the proof of concept evidence. "
    } else {
        ""
    };
    format!(
"You are a cybersecurity expert conducting a security assessment. Based on the vulnerability \"{title}\"{intro}provide detailed technical observations.

{lead}include:
- Concrete evidence of the vulnerability's existence
- Step-by-step analysis of the exploitation process{poc_line}
- Observable symptoms and indicators
- Technical artifacts and traces left by the vulnerability
- Verification methods and testing results
- Impact assessment based on observed behavior

{closing}Be specific and technical in your analysis (2-4 paragraphs).

Current content: {current}

Provide only the observation content, no additional formatting or explanations.",
        current = current_or_none(current, TargetLanguage::En),
    )
}

fn observation_zh(title: &str, current: &str, proof: Option<&str>) -> String {
    let intro = match proof {
        Some(p) => format!("和以下概念验证：\n\n{}\n\n", p),
        None => "，".to_string(),
    };
    let lead = if proof.is_some() { "分析提供的具体概念验证并" } else { "" };
    let poc_line = if proof.is_some() { "\n- 对提供的概念验证的详细分解" } else { "" };
    let closing = if proof.is_some() { "你的观察应该直接关联并解释概念验证证据。" } else { "" };
    format!(
"你是进行安全评估的网络安全专家。基于漏洞\"{title}\"{intro}提供详细的技术观察。

{lead}包括：
- 漏洞存在的具体证据
- 利用过程的逐步分析{poc_line}
- 可观察的症状和指标
- 技术痕迹和漏洞留下的证据
- 验证方法和测试结果
- 基于观察行为的影响评估

{closing}在分析中要具体和技术性（2-4段）。

当前内容：{current}

只提供观察内容，不要额外的格式或解释。",
        current = current_or_none(current, TargetLanguage::Zh),
    )
}

fn remediation_en(title: &str, current: &str, proof: Option<&str>) -> String {
    let intro = match proof {
        Some(p) => format!(" and the following proof of concept:\n\n{}\n\n", p),
        None => " ".to_string(),
    };
    let lead = if proof.is_some() {
        "Considering the specific attack method demonstrated in the proof of concept, "
    } else {
        ""
    };
    let poc_line = if proof.is_some() {
        "\n- Specific countermeasures addressing the demonstrated attack vector"
    } else {
        ""
    };
    let closing = if proof.is_some() {
        "Ensure your remediation directly addresses the specific attack method shown in the proof of concept. "
    } else {
        ""
    };
    format!(
"You are a cybersecurity expert providing remediation guidance. Based on the vulnerability \"{title}\"{intro}provide comprehensive remediation strategies.

{lead}provide:
- Immediate containment and mitigation steps
- Root cause remediation and permanent fixes
- Security controls to prevent similar vulnerabilities{poc_line}
- Implementation guidelines and best practices
- Verification steps to confirm remediation effectiveness
- Long-term security improvements

{closing}Structure your response with clear, actionable steps (2-4 paragraphs).

Current content: {current}

Provide only the remediation content, no additional formatting or explanations.",
        current = current_or_none(current, TargetLanguage::En),
    )
}

fn remediation_zh(title: &str, current: &str, proof: Option<&str>) -> String {
    let intro = match proof {
        Some(p) => format!("和以下概念验证：\n\n{}\n\n", p),
        None => "，".to_string(),
    };
    let lead = if proof.is_some() { "考虑到概念验证中演示的具体攻击方法，" } else { "" };
    let poc_line = if proof.is_some() { "\n- 针对演示攻击向量的具体对策" } else { "" };
    let closing = if proof.is_some() { "确保你的修复直接针对概念验证中显示的具体攻击方法。" } else { "" };
    format!(
"你是提供修复指导的网络安全专家。基于漏洞\"{title}\"{intro}提供全面的修复策略。

{lead}提供：
- 即时遏制和缓解步骤
- 根本原因修复和永久性修复
- 防止类似漏洞的安全控制{poc_line}
- 实施指南和最佳实践
- 确认修复有效性的验证步骤
- 长期安全改进

{closing}用清晰、可操作的步骤构建你的回复（2-4段）。

当前内容：{current}

只提供修复内容，不要额外的格式或解释。",
        current = current_or_none(current, TargetLanguage::Zh),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn builds_exactly_one_user_message() {
        let messages = build_messages(
            "SQL injection",
            "",
            FieldType::Description,
            TargetLanguage::En,
            None,
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[test]
    fn english_description_placeholder_is_none() {
        let messages = build_messages(
            "SQL injection",
            "",
            FieldType::Description,
            TargetLanguage::En,
            None,
        );
        let prompt = &messages[0].content;
        assert!(prompt.contains("comprehensive technical description"));
        assert!(prompt.contains("Current content: None"));
        assert!(!prompt.contains("proof of concept evidence provided"));
    }

    #[test]
    fn chinese_placeholder_is_wu() {
        let messages = build_messages(
            "SQL 注入",
            "",
            FieldType::Remediation,
            TargetLanguage::Zh,
            None,
        );
        let prompt = &messages[0].content;
        assert!(prompt.contains("网络安全专家"));
        assert!(prompt.contains("当前内容：无"));
    }

    #[test]
    fn proof_text_is_embedded_with_direct_reference_instruction() {
        let messages = build_messages(
            "XSS in search",
            "partial note",
            FieldType::Observation,
            TargetLanguage::En,
            Some("curl -s 'https://host/?q=<script>alert(1)</script>'"),
        );
        let prompt = &messages[0].content;
        assert!(prompt.contains("<script>alert(1)</script>"));
        assert!(prompt.contains("Detailed breakdown of the provided proof of concept"));
        assert!(prompt.contains("Current content: partial note"));
    }

    #[test]
    fn cjk_in_title_or_proof_forces_chinese() {
        assert_eq!(
            resolve_language("SQL 注入", "", TargetLanguage::En),
            TargetLanguage::Zh
        );
        assert_eq!(
            resolve_language("SQL injection", "响应包含管理员口令", TargetLanguage::En),
            TargetLanguage::Zh
        );
        assert_eq!(
            resolve_language("SQL injection", "plain ascii", TargetLanguage::En),
            TargetLanguage::En
        );
        assert_eq!(
            resolve_language("SQL injection", "", TargetLanguage::Zh),
            TargetLanguage::Zh
        );
    }

    #[test]
    fn unknown_field_type_is_rejected() {
        assert!(matches!(
            "impact".parse::<FieldType>(),
            Err(AiError::Validation { .. })
        ));
        assert_eq!("description".parse::<FieldType>().unwrap(), FieldType::Description);
    }
}
