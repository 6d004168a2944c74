use crate::config::{Config, LLMProvider};
use crate::generator::rewriter::RewriteTarget;
use crate::i18n::TargetLanguage;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// 未显式指定配置文件时尝试加载的默认文件名
pub const DEFAULT_CONFIG_FILE: &str = "paperwriter.toml";

/// PaperWriter-RS - 由Rust与AI驱动的并发长篇论文生成引擎
#[derive(Parser, Debug)]
#[command(name = "PaperWriter (paperwriter-rs)")]
#[command(
    about = "Concurrent academic paper generation engine. It distributes references across the outline, writes chapters in parallel through LLMs, resolves citations deterministically and streams the document in outline order."
)]
#[command(version)]
pub struct Args {
    /// 论文题目
    #[arg(short, long)]
    pub title: Option<String>,

    /// 大纲JSON文件
    #[arg(long)]
    pub outline: Option<PathBuf>,

    /// 国内参考文献列表文件
    #[arg(long)]
    pub ref_domestic: Option<PathBuf>,

    /// 国外参考文献列表文件
    #[arg(long)]
    pub ref_foreign: Option<PathBuf>,

    /// 用户数据文本文件
    #[arg(long)]
    pub custom_data: Option<PathBuf>,

    /// 数据文件，可重复指定，支持通配符
    #[arg(long = "data-file")]
    pub data_files: Vec<String>,

    /// 输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 初始上下文
    #[arg(long)]
    pub initial_context: Option<String>,

    /// 附加写作要求
    #[arg(long)]
    pub extra_instructions: Option<String>,

    /// 全文总字数，指定后由模型规划各章节字数
    #[arg(long)]
    pub total_words: Option<u32>,

    /// 目标语言 (zh, en)
    #[arg(long)]
    pub target_language: Option<String>,

    /// 用户标识
    #[arg(long)]
    pub user_id: Option<String>,

    /// 任务标识
    #[arg(long)]
    pub task_id: Option<String>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 高能效模型，优先用于章节撰写
    #[arg(long)]
    pub model_efficient: Option<String>,

    /// 高质量模型，作为efficient失效情况下的兜底
    #[arg(long)]
    pub model_powerful: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 并发撰写的章节数上限
    #[arg(long)]
    pub max_parallels: Option<usize>,

    /// LLM Provider (openai, moonshot, deepseek, mistral, openrouter, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 不为数据章节额外检索事实资料
    #[arg(long)]
    pub no_fact_research: bool,

    /// 重写指定章节，不生成全文
    #[arg(long, requires = "rewrite_instruction")]
    pub rewrite_section: Option<String>,

    /// 对该章节的修改意见
    #[arg(long, requires = "rewrite_section")]
    pub rewrite_instruction: Option<String>,

    /// 章节原文文件
    #[arg(long, requires = "rewrite_section")]
    pub rewrite_original: Option<PathBuf>,

    /// 章节之前的正文文件，用于衔接
    #[arg(long, requires = "rewrite_section")]
    pub rewrite_context: Option<PathBuf>,
}

impl Args {
    /// 指定了重写章节时返回重写目标
    pub fn rewrite_target(&self) -> Option<RewriteTarget> {
        let section_title = self.rewrite_section.clone()?;
        Some(RewriteTarget {
            section_title,
            instruction: self.rewrite_instruction.clone().unwrap_or_default(),
            original_path: self.rewrite_original.clone(),
            context_path: self.rewrite_context.clone(),
        })
    }

    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<Config> {
        let config_path = match self.config {
            Some(config_path) => Some(config_path),
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);
                default_config_path.exists().then_some(default_config_path)
            }
        };
        let mut config = match &config_path {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("无法读取配置文件 {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(title) = self.title {
            config.title = title;
        }
        if let Some(outline) = self.outline {
            config.outline_path = Some(outline);
        }
        if let Some(ref_domestic) = self.ref_domestic {
            config.ref_domestic_path = Some(ref_domestic);
        }
        if let Some(ref_foreign) = self.ref_foreign {
            config.ref_foreign_path = Some(ref_foreign);
        }
        if let Some(custom_data) = self.custom_data {
            config.custom_data_path = Some(custom_data);
        }
        if !self.data_files.is_empty() {
            config.data_files = self.data_files;
        }
        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }
        if let Some(initial_context) = self.initial_context {
            config.initial_context = initial_context;
        }
        if let Some(extra_instructions) = self.extra_instructions {
            config.extra_instructions = extra_instructions;
        }
        if self.total_words.is_some() {
            config.total_words = self.total_words;
        }
        if let Some(user_id) = self.user_id {
            config.user_id = user_id;
        }
        if self.task_id.is_some() {
            config.task_id = self.task_id;
        }

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => tracing::warn!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    provider_str
                ),
            }
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        match (self.model_efficient, self.model_powerful) {
            (Some(efficient), None) => {
                config.llm.model_powerful = efficient.clone();
                config.llm.model_efficient = efficient;
            }
            (efficient, powerful) => {
                if let Some(efficient) = efficient {
                    config.llm.model_efficient = efficient;
                }
                if let Some(powerful) = powerful {
                    config.llm.model_powerful = powerful;
                }
            }
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        if let Some(max_parallels) = self.max_parallels {
            config.generation.max_parallels = max_parallels.max(1);
        }
        if self.no_fact_research {
            config.generation.fact_research = false;
        }

        // 目标语言配置
        match self.target_language {
            Some(target_language_str) => match target_language_str.parse::<TargetLanguage>() {
                Ok(target_language) => config.target_language = target_language,
                Err(_) => tracing::warn!(
                    "⚠️ 警告: 未知的目标语言: {}，使用 {}",
                    target_language_str,
                    config.target_language.display_name()
                ),
            },
            // 未指定时按题目推断
            None if config_path.is_none() && !config.title.trim().is_empty() => {
                config.target_language = TargetLanguage::detect(&config.title);
            }
            None => {}
        }

        config.verbose = self.verbose || config.verbose;

        Ok(config)
    }
}

// Include tests
#[cfg(test)]
mod tests;
