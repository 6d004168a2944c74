use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::control::TaskManager;
use crate::generator::orchestrator::GenerationOrchestrator;
use crate::llm::client::LLMClient;

#[derive(Clone)]
pub struct GeneratorContext {
    /// LLM调用器，用于与AI通信。
    pub llm_client: LLMClient,
    /// 配置
    pub config: Config,
    /// 任务控制表
    pub task_manager: Arc<TaskManager>,
}

impl GeneratorContext {
    /// 创建新的生成器上下文
    pub fn new(config: Config) -> Result<Self> {
        let llm_client = LLMClient::new(&config.llm)?;
        Ok(Self {
            llm_client,
            config,
            task_manager: TaskManager::new(),
        })
    }

    /// 以当前模型客户端构建章节调度器
    pub fn orchestrator(&self) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            Arc::new(self.llm_client.clone()),
            self.config.generation.clone(),
            self.config.target_language,
        )
    }
}
