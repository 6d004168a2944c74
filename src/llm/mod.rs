//! 文本生成协作方

use anyhow::Result;
use async_trait::async_trait;

pub mod client;

pub use client::LLMClient;

/// 文本生成接口：给定系统指令与用户提示词返回生成文本
///
/// 传输层错误的重试由实现方负责，调用方只把失败当作本次生成失败。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_instruction: &str, user_prompt: &str) -> Result<String>;
}
