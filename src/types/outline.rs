use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 章节附带的图表指令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartDirective {
    Table,
    Plot,
    #[default]
    #[serde(other)]
    None,
}

fn default_target_word_count() -> i64 {
    500
}

/// 大纲节点，由调用方按顺序提供，核心流程只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub title: String,

    /// 结构性父节点只输出标题
    #[serde(default)]
    pub is_parent: bool,

    #[serde(rename = "words", default = "default_target_word_count")]
    pub target_word_count: i64,

    #[serde(rename = "use_data", default)]
    pub use_data_flag: bool,

    #[serde(rename = "chart_type", default)]
    pub chart_directive: ChartDirective,

    #[serde(rename = "level", default)]
    pub level_hint: Option<u32>,

    /// 节点在原始序列中的位置，是最终拼装的唯一排序键
    #[serde(skip_deserializing)]
    pub order_index: usize,
}

impl OutlineNode {
    pub fn new(title: impl Into<String>, target_word_count: i64) -> Self {
        Self {
            title: title.into(),
            is_parent: false,
            target_word_count,
            use_data_flag: false,
            chart_directive: ChartDirective::None,
            level_hint: None,
            order_index: 0,
        }
    }

    pub fn parent(title: impl Into<String>) -> Self {
        Self {
            is_parent: true,
            ..Self::new(title, 0)
        }
    }

    pub fn kind(&self) -> SectionKind {
        SectionKind::classify(&self.title)
    }

    /// 不需要生成正文的结构性节点
    pub fn is_header_only(&self) -> bool {
        self.is_parent || self.target_word_count <= 0
    }

    /// Markdown标题前缀，层级 + 1 后限制在 2..=6
    pub fn header_prefix(&self) -> String {
        let level = self.level_hint.map(|l| l as usize + 1).unwrap_or(2);
        "#".repeat(level.clamp(2, 6))
    }

    /// 标题开头的章号，例如 "3.2 实证分析" -> "3"
    pub fn chapter_number(&self) -> Option<&str> {
        let trimmed = self.title.trim();
        let end = trimmed
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());
        (end > 0).then(|| &trimmed[..end])
    }
}

/// 有序大纲
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    nodes: Vec<OutlineNode>,
}

impl Outline {
    /// 按输入顺序重新编号
    pub fn new(nodes: Vec<OutlineNode>) -> Self {
        let nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(order_index, node)| OutlineNode {
                order_index,
                ..node
            })
            .collect();
        Self { nodes }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let nodes: Vec<OutlineNode> =
            serde_json::from_str(json).context("Failed to parse outline JSON")?;
        Ok(Self::new(nodes))
    }

    pub fn nodes(&self) -> &[OutlineNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [OutlineNode] {
        &mut self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 需要生成正文的叶子节点标题
    pub fn leaf_titles(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| !node.is_parent)
            .map(|node| node.title.clone())
            .collect()
    }

    /// 提供给提示词的全文大纲
    pub fn format_outline(&self) -> String {
        self.nodes
            .iter()
            .map(|node| format!("- {}", node.title))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 章节类型，由标题一次性分类得到，提示词模板依此分派
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Abstract,
    Background,
    Significance,
    LiteratureReview,
    Methodology,
    Conclusion,
    References,
    Acknowledgment,
    Generic,
}

impl SectionKind {
    pub fn classify(title: &str) -> Self {
        let has = |keywords: &[&str]| keywords.iter().any(|k| title.contains(k));

        if has(&["参考文献", "References", "Bibliography"]) {
            SectionKind::References
        } else if has(&["致谢", "Acknowledg"]) {
            SectionKind::Acknowledgment
        } else if has(&["摘要", "Abstract"]) {
            SectionKind::Abstract
        } else if has(&["现状", "综述", "文献述评", "Review", "Status", "Literature"]) {
            SectionKind::LiteratureReview
        } else if has(&["背景", "Background"]) {
            SectionKind::Background
        } else if has(&["意义", "Significance"]) {
            SectionKind::Significance
        } else if has(&["方法", "Method"]) {
            SectionKind::Methodology
        } else if has(&["结论", "总结", "Conclusion"]) {
            SectionKind::Conclusion
        } else {
            SectionKind::Generic
        }
    }

    /// 摘要、参考文献、致谢以外的章节都算正文
    pub fn is_content(&self) -> bool {
        !matches!(
            self,
            SectionKind::Abstract | SectionKind::References | SectionKind::Acknowledgment
        )
    }
}

impl Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            SectionKind::Abstract => "摘要",
            SectionKind::Background => "研究背景",
            SectionKind::Significance => "研究意义",
            SectionKind::LiteratureReview => "文献综述",
            SectionKind::Methodology => "研究方法",
            SectionKind::Conclusion => "结论",
            SectionKind::References => "参考文献",
            SectionKind::Acknowledgment => "致谢",
            SectionKind::Generic => "正文",
        };
        write!(f, "{}", str)
    }
}

/// 文献分配时章节的综述范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewScope {
    Domestic,
    Foreign,
    General,
}

const REVIEW_KEYWORDS: &[&str] = &["现状", "综述", "Review", "Status", "Literature", "背景"];
const DOMESTIC_KEYWORDS: &[&str] = &["国内", "我国", "China", "Domestic"];
const FOREIGN_KEYWORDS: &[&str] = &["国外", "国际", "Foreign", "International"];

impl ReviewScope {
    /// 标题不含综述类关键词时返回 None
    pub fn classify(title: &str) -> Option<Self> {
        let has = |keywords: &[&str]| keywords.iter().any(|k| title.contains(k));

        if !has(REVIEW_KEYWORDS) {
            return None;
        }
        if has(DOMESTIC_KEYWORDS) {
            Some(ReviewScope::Domestic)
        } else if has(FOREIGN_KEYWORDS) {
            Some(ReviewScope::Foreign)
        } else {
            Some(ReviewScope::General)
        }
    }
}
