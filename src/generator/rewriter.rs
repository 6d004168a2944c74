//! 章节重写
//!
//! 在生成流程之外，按用户的修改意见重写单个章节。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::generator::cleaner::strip_self_title;
use crate::generator::prompts::build_rewrite_prompt;
use crate::i18n::TargetLanguage;
use crate::llm::TextGenerator;

/// 一次章节重写的输入
#[derive(Debug, Clone, Default)]
pub struct RewriteRequest {
    pub title: String,
    pub section_title: String,
    /// 用户的修改意见
    pub instruction: String,
    /// 前文，构建提示词时只保留末尾部分
    pub context: String,
    pub custom_data: String,
    /// 原文，为空时直接撰写
    pub original_content: String,
    pub language: TargetLanguage,
}

/// 命令行指定的重写目标
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteTarget {
    pub section_title: String,
    pub instruction: String,
    pub original_path: Option<PathBuf>,
    pub context_path: Option<PathBuf>,
}

pub struct ChapterRewriter {
    generator: Arc<dyn TextGenerator>,
}

impl ChapterRewriter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// 重写章节，返回去掉重复标题后的正文
    pub async fn rewrite(&self, request: &RewriteRequest) -> Result<String> {
        tracing::info!("✏️ 正在重写章节: {}", request.section_title);
        let (system_prompt, user_prompt) = build_rewrite_prompt(request);
        let raw = self
            .generator
            .generate(&system_prompt, &user_prompt)
            .await
            .with_context(|| format!("章节重写失败: {}", request.section_title))?;

        // 保留段首的全角缩进
        let text = strip_self_title(&raw, &request.section_title)
            .trim_matches(|c: char| c.is_ascii_whitespace())
            .to_string();
        if text.is_empty() {
            bail!("模型没有返回章节“{}”的内容", request.section_title);
        }
        tracing::info!(
            "✅ 章节重写完成: {} (len={})",
            request.section_title,
            text.chars().count()
        );
        Ok(text)
    }
}
