//! 单章节生成任务

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::generator::cleaner::{clean_chapter, convert_cn_numbers};
use crate::generator::prompts::{SectionSpec, build_prompt, build_research_prompt};
use crate::i18n::TargetLanguage;
use crate::llm::TextGenerator;
use crate::references::CitationResolver;
use crate::types::outline::{OutlineNode, SectionKind};
use crate::types::reference::Reference;
use crate::utils::text_metrics::{content_char_count, tail_chars};

/// 章节结果类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterKind {
    HeaderOnly,
    Content,
    Error,
}

/// 章节任务的产出，按 `order_index` 归位
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterResult {
    pub order_index: usize,
    pub kind: ChapterKind,
    pub rendered_markdown: String,
    pub raw_text_tail: String,
    pub log_messages: Vec<String>,
}

impl ChapterResult {
    /// 任务崩溃等无法得到正常结果时的占位
    pub fn error(order_index: usize, log_message: String) -> Self {
        Self {
            order_index,
            kind: ChapterKind::Error,
            rendered_markdown: String::new(),
            raw_text_tail: String::new(),
            log_messages: vec![log_message],
        }
    }
}

/// 章节任务开始时看到的前文摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot(pub String);

impl ContextSnapshot {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 同一次生成中所有章节共享的只读信息
#[derive(Debug, Clone)]
pub struct ChapterShared {
    pub thesis_title: String,
    pub full_outline: String,
    pub user_data: String,
    pub extra_instructions: String,
    pub config: GenerationConfig,
}

/// 单章节任务，独占自己的文献队列
pub struct ChapterTask {
    node: OutlineNode,
    assigned: Vec<Reference>,
    context: ContextSnapshot,
    shared: Arc<ChapterShared>,
}

struct Generated {
    markdown: String,
    tail: String,
}

impl ChapterTask {
    pub fn new(
        node: OutlineNode,
        assigned: Vec<Reference>,
        context: ContextSnapshot,
        shared: Arc<ChapterShared>,
    ) -> Self {
        Self {
            node,
            assigned,
            context,
            shared,
        }
    }

    /// 执行任务，所有失败都转换为 `Error` 类型的结果
    pub async fn run(self, generator: Arc<dyn TextGenerator>) -> ChapterResult {
        let order_index = self.node.order_index;
        let title = self.node.title.clone();
        let header_prefix = self.node.header_prefix();

        if self.node.is_header_only() {
            return ChapterResult {
                order_index,
                kind: ChapterKind::HeaderOnly,
                rendered_markdown: format!("{} {}\n\n", header_prefix, title),
                raw_text_tail: String::new(),
                log_messages: vec![format!("生成标题: {}", title)],
            };
        }

        let mut logs = vec![format!("🚀 [并发启动] 正在撰写: {}", title)];
        match self.try_run(generator.as_ref(), &mut logs).await {
            Ok(generated) => ChapterResult {
                order_index,
                kind: ChapterKind::Content,
                rendered_markdown: generated.markdown,
                raw_text_tail: generated.tail,
                log_messages: logs,
            },
            Err(e) => {
                let message = format!("❌ {} 异常: {:#}", title, e);
                tracing::error!("{}", message);
                logs.push(message);
                ChapterResult {
                    order_index,
                    kind: ChapterKind::Error,
                    rendered_markdown: String::new(),
                    raw_text_tail: String::new(),
                    log_messages: logs,
                }
            }
        }
    }

    async fn try_run(
        self,
        generator: &dyn TextGenerator,
        logs: &mut Vec<String>,
    ) -> Result<Generated> {
        let config = &self.shared.config;
        let kind = self.node.kind();
        let language = TargetLanguage::detect(&self.node.title);
        let target = self.node.target_word_count;

        let data_payload = self.data_payload(generator, kind).await;

        let references = self
            .assigned
            .iter()
            .take(config.max_prompt_references)
            .map(|r| r.raw_text.clone())
            .collect();
        if !self.assigned.is_empty() {
            logs.push(format!(
                "   - 📚 分配参考文献 {} 篇",
                self.assigned.len()
            ));
        }

        let spec = SectionSpec {
            thesis_title: self.shared.thesis_title.clone(),
            section_title: self.node.title.clone(),
            kind,
            chapter_number: self.node.chapter_number().unwrap_or_default().to_string(),
            target_words: target,
            chart_directive: self.node.chart_directive,
            language,
            references,
            placeholder: config.placeholder.clone(),
            full_outline: self.shared.full_outline.clone(),
            context: self.context.as_str().to_string(),
            data_payload,
            extra_instructions: self.shared.extra_instructions.clone(),
        };
        let (system_prompt, user_prompt) = build_prompt(&spec);

        let mut raw_content = generator
            .generate(&system_prompt, &user_prompt)
            .await
            .context("章节生成调用失败")?;

        let current_len = content_char_count(&raw_content);
        if kind != SectionKind::Abstract
            && target > config.expansion_min_target
            && (current_len as f64) < target as f64 * config.min_length_ratio
        {
            logs.push(format!(
                "   - ✏️ 字数不足 ({}/{})，扩写一次",
                current_len, target
            ));
            let expanded_prompt = format!(
                "{}\n\n{}",
                user_prompt,
                language.expansion_instruction()
            );
            match generator.generate(&system_prompt, &expanded_prompt).await {
                Ok(expanded) => raw_content = expanded,
                Err(e) => {
                    tracing::warn!("⚠️ {} 扩写失败，保留初稿: {}", self.node.title, e);
                }
            }
        }

        let mut resolver =
            CitationResolver::with_placeholder(self.assigned, language, &config.placeholder);
        let body = clean_chapter(&raw_content, &self.node.title, kind, &mut resolver);
        let stats = resolver.stats();
        if stats.dropped_placeholders > 0 {
            logs.push(format!(
                "   - ⚠️ 多余的引用占位符 {} 个已移除",
                stats.dropped_placeholders
            ));
        }
        if stats.appended > 0 {
            logs.push(format!("   - 🔗 补充引用 {} 篇", stats.appended));
        }

        let markdown = format!(
            "{} {}\n\n{}\n\n",
            self.node.header_prefix(),
            self.node.title,
            body
        );
        let tail = tail_chars(&body, config.context_tail_chars).to_string();
        Ok(Generated { markdown, tail })
    }

    /// 用户数据与检索事实，只用于需要数据的非摘要章节
    async fn data_payload(&self, generator: &dyn TextGenerator, kind: SectionKind) -> String {
        if !self.node.use_data_flag || kind == SectionKind::Abstract {
            return String::new();
        }

        let mut payload = String::new();
        let user_data = self.shared.user_data.trim();
        if user_data.chars().count() > 5 {
            payload.push_str(&format!("\n【用户真实数据】:\n{}\n", convert_cn_numbers(user_data)));
        }

        if self.shared.config.fact_research {
            let (system_prompt, user_prompt) =
                build_research_prompt(&self.shared.thesis_title, &self.node.title);
            match generator.generate(&system_prompt, &user_prompt).await {
                Ok(facts) if !facts.trim().is_empty() => {
                    payload.push_str(&format!("\n【联网补充数据】:\n{}\n", facts.trim()));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("事实检索失败，忽略: {}", e),
            }
        }
        payload
    }
}
