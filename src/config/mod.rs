use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::i18n::TargetLanguage;
use crate::references::resolver::DEFAULT_PLACEHOLDER;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Mistral => write!(f, "mistral"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "mistral" => Ok(LLMProvider::Mistral),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 论文题目
    pub title: String,

    /// 大纲JSON文件路径
    pub outline_path: Option<PathBuf>,

    /// 国内（中文）参考文献列表
    pub ref_domestic_path: Option<PathBuf>,

    /// 国外（英文）参考文献列表
    pub ref_foreign_path: Option<PathBuf>,

    /// 用户数据文本
    pub custom_data_path: Option<PathBuf>,

    /// 额外的数据文件，支持glob通配
    pub data_files: Vec<String>,

    /// 初始上下文，为空时使用论文题目
    pub initial_context: String,

    /// 附加写作要求
    pub extra_instructions: String,

    /// 全文总字数，设置后先由模型规划各章节字数
    pub total_words: Option<u32>,

    /// 输出路径
    pub output_path: PathBuf,

    /// 文档语言（影响参考文献标题等固定文本）
    pub target_language: TargetLanguage,

    /// 用户标识
    pub user_id: String,

    /// 任务标识，为空时自动生成
    pub task_id: Option<String>,

    /// 是否启用详细日志
    pub verbose: bool,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 生成流程配置
    pub generation: GenerationConfig,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，优先使用
    pub model_efficient: String,

    /// 高质量模型，用于超长提示词以及efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 单次调用超时时间（秒）
    pub timeout_seconds: u64,
}

/// 生成流程配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// 并发撰写的章节数上限
    pub max_parallels: usize,

    /// 等待章节结果时检查控制状态的间隔（毫秒）
    pub poll_interval_ms: u64,

    /// 传给章节任务的上下文长度上限（字符）
    pub context_window_chars: usize,

    /// 每章追加到滚动上下文的尾部长度（字符）
    pub context_tail_chars: usize,

    /// 正文字数低于目标的该比例时触发一次扩写
    pub min_length_ratio: f64,

    /// 目标字数不超过该值的章节不做扩写
    pub expansion_min_target: i64,

    /// 提示词中最多列出的参考文献条数
    pub max_prompt_references: usize,

    /// 引用占位符
    pub placeholder: String,

    /// 需要数据的章节是否额外检索事实资料
    pub fact_research: bool,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 获取任务标识，未配置时生成新的UUID
    pub fn resolve_task_id(&self) -> String {
        match &self.task_id {
            Some(task_id) if !task_id.trim().is_empty() => task_id.trim().to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 生成时使用的初始上下文
    pub fn effective_initial_context(&self) -> String {
        if self.initial_context.trim().is_empty() {
            format!("论文题目：《{}》", self.title.trim())
        } else {
            self.initial_context.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: String::new(),
            outline_path: None,
            ref_domestic_path: None,
            ref_foreign_path: None,
            custom_data_path: None,
            data_files: vec![],
            initial_context: String::new(),
            extra_instructions: String::new(),
            total_words: None,
            output_path: PathBuf::from("./paperwriter.out"),
            target_language: TargetLanguage::default(),
            user_id: String::from("local"),
            task_id: None,
            verbose: false,
            llm: LLMConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("PAPERWRITER_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.deepseek.com/v1"),
            model_efficient: String::from("deepseek-chat"),
            model_powerful: String::from("deepseek-chat"),
            max_tokens: 8192,
            temperature: 0.7,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 120,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_parallels: 8,
            poll_interval_ms: 1000,
            context_window_chars: 800,
            context_tail_chars: 200,
            min_length_ratio: 0.5,
            expansion_min_target: 300,
            max_prompt_references: 8,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            fact_research: true,
        }
    }
}
