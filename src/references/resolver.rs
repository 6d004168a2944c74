use std::collections::VecDeque;

use crate::i18n::TargetLanguage;
use crate::types::reference::Reference;

pub const DEFAULT_PLACEHOLDER: &str = "[REF]";

/// 一次解析的统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// 被替换为编号的占位符数量
    pub substituted: usize,
    /// 队列耗尽后被丢弃的占位符数量
    pub dropped_placeholders: usize,
    /// 在补充句中强制引用的文献数量
    pub appended: usize,
}

/// 单章节引用解析器：按队列顺序把位置型占位符替换为全局编号
#[derive(Debug)]
pub struct CitationResolver {
    queue: VecDeque<Reference>,
    placeholder: String,
    language: TargetLanguage,
    stats: ResolutionStats,
}

impl CitationResolver {
    /// 文献列表被移入解析器，并按顺序被消费
    pub fn new(assigned: Vec<Reference>, language: TargetLanguage) -> Self {
        Self::with_placeholder(assigned, language, DEFAULT_PLACEHOLDER)
    }

    pub fn with_placeholder(
        assigned: Vec<Reference>,
        language: TargetLanguage,
        placeholder: &str,
    ) -> Self {
        Self {
            queue: assigned.into(),
            placeholder: placeholder.to_string(),
            language,
            stats: ResolutionStats::default(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    pub fn resolve(&mut self, generated_text: &str) -> String {
        let mut result = String::with_capacity(generated_text.len() + 16);
        let mut segments = generated_text.split(self.placeholder.as_str()).peekable();

        while let Some(segment) = segments.next() {
            result.push_str(segment);
            if segments.peek().is_none() {
                break;
            }
            match self.queue.pop_front() {
                Some(reference) => {
                    result.push_str(&reference.citation_mark());
                    self.stats.substituted += 1;
                }
                None => self.stats.dropped_placeholders += 1,
            }
        }

        if !self.queue.is_empty() {
            result.push_str("\n\n");
            result.push_str(&self.closing_sentence());
        }
        result
    }

    /// 模型少写了占位符时，用一句补充说明引用剩余文献并清空队列
    fn closing_sentence(&mut self) -> String {
        let phrases = self.language.citation_connectives();
        let rotation = self
            .queue
            .front()
            .map(|r| r.global_index % phrases.len())
            .unwrap_or(0);

        self.stats.appended += self.queue.len();
        let marks: String = self
            .queue
            .drain(..)
            .map(|reference| reference.citation_mark())
            .collect();

        phrases[rotation].replace("{}", &marks)
    }
}
