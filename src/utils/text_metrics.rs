use regex::Regex;
use std::sync::LazyLock;

pub(crate) static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("valid code fence pattern"));

/// Token计算规则
#[derive(Debug, Clone)]
pub struct TokenCalculationRules {
    /// 英文字符的平均token比例（字符数/token数）
    pub english_char_per_token: f64,
    /// 中文字符的平均token比例
    pub chinese_char_per_token: f64,
    /// 基础token开销（系统prompt等）
    pub base_token_overhead: usize,
}

impl Default for TokenCalculationRules {
    fn default() -> Self {
        Self {
            english_char_per_token: 4.0,
            chinese_char_per_token: 1.5,
            base_token_overhead: 50,
        }
    }
}

/// Token估算器，用于粗略估算提示词规模
#[derive(Debug, Clone, Default)]
pub struct TokenEstimator {
    rules: TokenCalculationRules,
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 估算文本的token数量
    pub fn estimate_tokens(&self, text: &str) -> usize {
        let total = text.chars().count();
        let chinese = text.chars().filter(|c| is_cjk_char(*c)).count();
        let other = total - chinese;

        let chinese_tokens = (chinese as f64 / self.rules.chinese_char_per_token).ceil() as usize;
        let other_tokens = (other as f64 / self.rules.english_char_per_token).ceil() as usize;

        chinese_tokens + other_tokens + self.rules.base_token_overhead
    }
}

/// 判断是否为CJK统一汉字
pub fn is_cjk_char(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF)
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk_char)
}

/// 去掉代码块
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}

/// 正文有效字数：去掉代码块后的非空白字符数
pub fn content_char_count(text: &str) -> usize {
    strip_code_fences(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .count()
}

/// 取末尾最多 `max_chars` 个字符
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    text.char_indices()
        .nth(total - max_chars)
        .map_or("", |(offset, _)| &text[offset..])
}
