use serde::{Deserialize, Serialize};

use crate::utils::text_metrics::contains_cjk;

/// 写作语言
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetLanguage {
    #[serde(rename = "zh")]
    #[default]
    Chinese,
    #[serde(rename = "en")]
    English,
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLanguage::Chinese => write!(f, "zh"),
            TargetLanguage::English => write!(f, "en"),
        }
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zh" | "chinese" | "中文" => Ok(TargetLanguage::Chinese),
            "en" | "english" | "英文" => Ok(TargetLanguage::English),
            _ => Err(format!("Unknown target language: {}", s)),
        }
    }
}

impl TargetLanguage {
    /// 章节标题含汉字则按中文撰写
    pub fn detect(title: &str) -> Self {
        if contains_cjk(title) {
            TargetLanguage::Chinese
        } else {
            TargetLanguage::English
        }
    }

    /// 获取语言的描述性名称
    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => "中文",
            TargetLanguage::English => "English",
        }
    }

    pub fn bibliography_heading(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => "参考文献",
            TargetLanguage::English => "References",
        }
    }

    /// 补充引用句的轮换连接语，`{}` 处填入引用编号
    pub fn citation_connectives(&self) -> &'static [&'static str] {
        match self {
            TargetLanguage::Chinese => &[
                "此外，相关研究还涵盖了多方面的探索{}。",
                "与此同时，亦有学者从不同角度对该问题进行了研究{}。",
                "另有研究对上述议题作了补充与拓展{}。",
            ],
            TargetLanguage::English => &[
                "In addition, related studies have explored further aspects of this topic{}.",
                "Other scholars have also examined the issue from different perspectives{}.",
                "Further work has extended and complemented these findings{}.",
            ],
        }
    }

    /// 篇幅不足时追加的扩写要求
    pub fn expansion_instruction(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => "请大幅扩写，增加细节。",
            TargetLanguage::English => {
                "Please expand the section substantially and add more detail."
            }
        }
    }

    pub fn prompt_instruction(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => "请使用规范的中文学术语言撰写，表达准确、严谨。",
            TargetLanguage::English => {
                "Write in formal academic English with precise and rigorous wording."
            }
        }
    }
}
