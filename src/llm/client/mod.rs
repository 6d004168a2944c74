//! LLM客户端 - 提供统一的LLM服务接口

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::{
    config::LLMConfig,
    llm::{TextGenerator, client::utils::evaluate_befitting_model},
};

mod providers;
pub mod utils;

use providers::ProviderClient;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(config)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 检查模型连接是否正常
    pub async fn check_connection(&self) -> Result<()> {
        tracing::info!("🔄 正在检查模型连接...");
        match self.prompt("You are a helpful assistant.", "Hello").await {
            Ok(_) => {
                tracing::info!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 通用重试逻辑，单次调用受超时限制
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay = Duration::from_millis(self.config.retry_delay_ms);
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let mut retries = 0;

        loop {
            let outcome = match tokio::time::timeout(timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("模型调用超时 ({}s)", timeout.as_secs())),
            };
            match outcome {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    tracing::warn!(
                        "❌ 调用模型服务出错，重试中 (第 {} / {}次尝试): {}",
                        retries,
                        max_retries,
                        err
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    /// 单轮对话，首选模型失败后切换到备选模型
    pub async fn prompt(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let (befitting_model, fallover_model) =
            evaluate_befitting_model(&self.config, system_prompt, user_prompt);

        let agent = self
            .client
            .create_agent(&befitting_model, system_prompt, &self.config);
        match self
            .retry_with_backoff(|| async { agent.prompt(user_prompt).await })
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => match fallover_model {
                Some(model) => {
                    tracing::warn!(
                        "❌ 调用模型服务出错，尝试 {} 次均失败，尝试使用备选模型{}...{}",
                        self.config.retry_attempts,
                        model,
                        e
                    );
                    let agent = self.client.create_agent(&model, system_prompt, &self.config);
                    self.retry_with_backoff(|| async { agent.prompt(user_prompt).await })
                        .await
                }
                None => Err(e),
            },
        }
    }

    /// 数据提取方法
    pub async fn extract<T>(&self, system_prompt: &str, user_prompt: &str) -> Result<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let (befitting_model, fallover_model) =
            evaluate_befitting_model(&self.config, system_prompt, user_prompt);

        let extractor =
            self.client
                .create_extractor::<T>(&befitting_model, system_prompt, &self.config);
        match self
            .retry_with_backoff(|| async { extractor.extract(user_prompt).await })
            .await
        {
            Ok(r) => Ok(r),
            Err(e) => match fallover_model {
                Some(model) => {
                    tracing::warn!(
                        "❌ 结构化提取失败，尝试使用备选模型{}...{}",
                        model,
                        e
                    );
                    let user_prompt_with_fixer = format!(
                        "{}\n\n**注意事项**此前我调用大模型过程时存在错误，错误信息为“{}”，你注意你这一次要规避这个错误",
                        user_prompt, e
                    );
                    let extractor =
                        self.client
                            .create_extractor::<T>(&model, system_prompt, &self.config);
                    self.retry_with_backoff(|| async {
                        extractor.extract(&user_prompt_with_fixer).await
                    })
                    .await
                }
                None => Err(e),
            },
        }
    }
}

#[async_trait]
impl TextGenerator for LLMClient {
    async fn generate(&self, system_instruction: &str, user_prompt: &str) -> Result<String> {
        self.prompt(system_instruction, user_prompt).await
    }
}
