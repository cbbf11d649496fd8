//! 语法检查插件。
//!
//! 纯咨询性质：产出只会追加到消息的 `corrections` 序列，
//! 永远不阻塞或否决消息本身。内置一套英文规则；其他语言暂不检查，
//! 返回空序列（降级模式）。

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrammarError {
    /// 输入不是可检查的文本（空文本）
    #[error("invalid text input")]
    InvalidInput,
}

/// 单条纠正建议。时间戳由管线在落库时统一分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionSuggestion {
    pub original: String,
    pub corrected: String,
    pub explanation: String,
}

#[async_trait]
pub trait GrammarChecker: Send + Sync {
    async fn check(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Vec<CorrectionSuggestion>, GrammarError>;
}

struct GrammarRule {
    pattern: Regex,
    replacement: &'static str,
    explanation: &'static str,
}

/// 英文规则表。每条规则独立作用于原文，`corrected` 是只应用该条规则的全文。
static ENGLISH_RULES: Lazy<Vec<GrammarRule>> = Lazy::new(|| {
    vec![
        GrammarRule {
            pattern: Regex::new("  +").unwrap(),
            replacement: " ",
            explanation: "Removed double spaces",
        },
        GrammarRule {
            pattern: Regex::new(r"\bthier\b").unwrap(),
            replacement: "their",
            explanation: "Corrected spelling",
        },
        GrammarRule {
            pattern: Regex::new(r"\byour\b(\s+(?:going|coming))").unwrap(),
            replacement: "you're${1}",
            explanation: "Corrected contraction",
        },
        GrammarRule {
            pattern: Regex::new(r"\bit's\b(\s+(?:car|house|book))").unwrap(),
            replacement: "its${1}",
            explanation: "Corrected possessive form",
        },
    ]
});

/// 基于内置规则表的语法检查器。
#[derive(Debug, Default)]
pub struct RuleGrammarChecker;

#[async_trait]
impl GrammarChecker for RuleGrammarChecker {
    async fn check(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Vec<CorrectionSuggestion>, GrammarError> {
        if text.is_empty() {
            return Err(GrammarError::InvalidInput);
        }

        let mut suggestions = Vec::new();
        if language == "en" {
            for rule in ENGLISH_RULES.iter() {
                if rule.pattern.is_match(text) {
                    suggestions.push(CorrectionSuggestion {
                        original: text.to_owned(),
                        corrected: rule
                            .pattern
                            .replace_all(text, rule.replacement)
                            .into_owned(),
                        explanation: rule.explanation.to_owned(),
                    });
                }
            }
        }
        Ok(suggestions)
    }
}
