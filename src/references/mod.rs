//! 参考文献管理：解析、分配与确定性引用编号

use regex::Regex;
use std::sync::LazyLock;

use crate::i18n::TargetLanguage;
use crate::types::reference::Reference;

pub mod allocator;
pub mod resolver;

pub use allocator::{Allocation, ReferenceAllocator};
pub use resolver::CitationResolver;

/// 行首编号：`[1]`、`1.`、`（1）`、`(1)`
static ENUMERATION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\[\d+\]|\d+\.|（\d+）|\(\d+\))\s*").expect("valid enumeration pattern")
});

/// 参考文献库，在一次生成过程中独占全部文献
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    references: Vec<Reference>,
}

impl ReferenceStore {
    /// 按行拆分原始文献文本，去掉空行和行首编号后按清洗后的顺序编号
    pub fn parse(raw_text: &str) -> Self {
        let references = raw_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| ENUMERATION_PREFIX.replace(line, "").into_owned())
            .enumerate()
            .map(|(i, text)| Reference::new(i + 1, text))
            .collect();
        Self { references }
    }

    /// 合并国内、国外两份文献列表，国内在前
    pub fn from_lists(domestic: &str, foreign: &str) -> Self {
        Self::parse(&format!("{}\n{}", domestic, foreign))
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// 按全局编号顺序输出完整的文末参考文献，与正文是否引用无关
    pub fn generate_bibliography(&self, language: &TargetLanguage) -> String {
        if self.references.is_empty() {
            return String::new();
        }
        let mut bibliography = format!("## {}\n\n", language.bibliography_heading());
        for reference in &self.references {
            bibliography.push_str(&format!(
                "{} {}\n\n",
                reference.citation_mark(),
                reference.raw_text
            ));
        }
        bibliography
    }
}
