use serde::{Deserialize, Serialize};

use crate::utils::text_metrics::contains_cjk;

/// 参考文献语言标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageTag {
    #[serde(rename = "cn")]
    CN,
    #[serde(rename = "en")]
    EN,
}

impl LanguageTag {
    /// 含有任意CJK统一汉字即视为中文文献
    pub fn detect(text: &str) -> Self {
        if contains_cjk(text) {
            LanguageTag::CN
        } else {
            LanguageTag::EN
        }
    }
}

/// 一条参考文献，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// 全局编号（从1开始），整个生成过程中保持稳定
    pub global_index: usize,
    /// 去除编号前缀后的原始文本
    pub raw_text: String,
    pub language_tag: LanguageTag,
}

impl Reference {
    pub fn new(global_index: usize, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let language_tag = LanguageTag::detect(&raw_text);
        Self {
            global_index,
            raw_text,
            language_tag,
        }
    }

    /// 正文中的引用标记，例如 `[3]`
    pub fn citation_mark(&self) -> String {
        format!("[{}]", self.global_index)
    }
}
