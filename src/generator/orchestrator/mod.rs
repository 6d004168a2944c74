//! 并发章节生成调度
//!
//! 章节任务并发执行，结果严格按大纲顺序输出；暂停与停止通过轮询控制状态实现，
//! 已提交的任务在停止时被放弃而不是强制终止。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;

use crate::config::GenerationConfig;
use crate::control::{ControlSignal, TaskStatus};
use crate::generator::chapter::{
    ChapterKind, ChapterResult, ChapterShared, ChapterTask, ContextSnapshot,
};
use crate::generator::events::StreamEvent;
use crate::i18n::TargetLanguage;
use crate::llm::TextGenerator;
use crate::references::{ReferenceAllocator, ReferenceStore};
use crate::types::outline::Outline;
use crate::utils::text_metrics::tail_chars;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 一次生成所需的输入
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub title: String,
    pub outline: Outline,
    pub store: ReferenceStore,
    /// 用户数据与数据文件提取出的文本
    pub user_data: String,
    pub initial_context: String,
    pub extra_instructions: String,
}

/// 生成过程统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSummary {
    pub streamed: usize,
    pub failed: usize,
    pub stopped: bool,
    /// 滚动上下文的最终内容
    pub context: String,
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    generator: Arc<dyn TextGenerator>,
    config: GenerationConfig,
    language: TargetLanguage,
}

impl GenerationOrchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        config: GenerationConfig,
        language: TargetLanguage,
    ) -> Self {
        Self {
            generator,
            config,
            language,
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(1))
    }

    /// 在后台启动生成，返回事件流
    pub fn generate(
        &self,
        request: GenerationRequest,
        control: Arc<dyn ControlSignal>,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run(request, control, tx).await;
        });
        rx
    }

    /// 暂停时阻塞等待，返回是否已停止
    async fn wait_while_paused(&self, control: &dyn ControlSignal) -> bool {
        loop {
            match control.check_status() {
                TaskStatus::Paused => tokio::time::sleep(self.poll_interval()).await,
                TaskStatus::Stopped => return true,
                TaskStatus::Running | TaskStatus::Completed => return false,
            }
        }
    }

    /// 执行生成并把事件写入 `tx`；消费方关闭通道时视为停止
    pub async fn run(
        &self,
        request: GenerationRequest,
        control: Arc<dyn ControlSignal>,
        tx: mpsc::Sender<StreamEvent>,
    ) -> GenerationSummary {
        let mut summary = GenerationSummary::default();
        let GenerationRequest {
            title,
            outline,
            store,
            user_data,
            initial_context,
            extra_instructions,
        } = request;

        let max_parallels = self.config.max_parallels.max(1);
        let start_message = format!("🚀 启动高并发生成引擎 (Max Threads={})...", max_parallels);
        tracing::info!("{}", start_message);
        if !emit(&tx, StreamEvent::log(start_message)).await {
            summary.stopped = true;
            return summary;
        }

        let mut allocation =
            ReferenceAllocator::new().allocate(store.references(), outline.nodes());
        if !allocation.unplaced.is_empty() {
            let message = format!("⚠️ {} 篇参考文献未能分配", allocation.unplaced.len());
            tracing::warn!("{}", message);
            if !emit(&tx, StreamEvent::log(message)).await {
                summary.stopped = true;
                return summary;
            }
        }

        let mut context = if initial_context.trim().is_empty() {
            format!("论文题目：《{}》", title)
        } else {
            initial_context
        };

        let shared = Arc::new(ChapterShared {
            thesis_title: title,
            full_outline: outline.format_outline(),
            user_data,
            extra_instructions,
            config: self.config.clone(),
        });
        let permits = Arc::new(Semaphore::new(max_parallels));

        let mut handles: Vec<(usize, JoinHandle<ChapterResult>)> =
            Vec::with_capacity(outline.len());
        for node in outline.nodes() {
            if self.wait_while_paused(control.as_ref()).await {
                break;
            }
            let order_index = node.order_index;
            let task = ChapterTask::new(
                node.clone(),
                allocation.take(order_index),
                ContextSnapshot(tail_chars(&context, self.config.context_window_chars).to_string()),
                Arc::clone(&shared),
            );
            let handle = tokio::spawn(self.clone().execute(
                task,
                order_index,
                Arc::clone(&permits),
                Arc::clone(&control),
            ));
            handles.push((order_index, handle));
        }

        for (order_index, mut handle) in handles {
            if self.wait_while_paused(control.as_ref()).await {
                summary.stopped = true;
                return summary;
            }

            loop {
                match tokio::time::timeout(self.poll_interval(), &mut handle).await {
                    Ok(Ok(result)) => {
                        if result.kind == ChapterKind::Error {
                            summary.failed += 1;
                        }
                        for message in &result.log_messages {
                            if !emit(&tx, StreamEvent::log(message.clone())).await {
                                summary.stopped = true;
                                return summary;
                            }
                        }
                        if matches!(result.kind, ChapterKind::Content | ChapterKind::HeaderOnly) {
                            if !emit(&tx, StreamEvent::content(result.rendered_markdown)).await {
                                summary.stopped = true;
                                return summary;
                            }
                            summary.streamed += 1;
                            context.push_str(&result.raw_text_tail);
                        }
                        break;
                    }
                    Ok(Err(join_error)) => {
                        summary.failed += 1;
                        let message = format!(
                            "❌ 主线程异常: 第 {} 节任务崩溃: {}",
                            order_index, join_error
                        );
                        tracing::error!("{}", message);
                        if !emit(&tx, StreamEvent::log(message)).await {
                            summary.stopped = true;
                            return summary;
                        }
                        break;
                    }
                    Err(_) => {
                        if !emit(&tx, StreamEvent::KeepAlive).await
                            || self.wait_while_paused(control.as_ref()).await
                        {
                            summary.stopped = true;
                            return summary;
                        }
                    }
                }
            }
        }

        summary.context = context;
        if control.check_status() == TaskStatus::Stopped {
            summary.stopped = true;
            return summary;
        }

        let bibliography = store.generate_bibliography(&self.language);
        if !bibliography.is_empty() && !emit(&tx, StreamEvent::content(bibliography)).await {
            summary.stopped = true;
            return summary;
        }
        emit(&tx, StreamEvent::Done).await;
        tracing::info!(
            "✅ 生成完成，共输出 {} 节，失败 {} 节",
            summary.streamed,
            summary.failed
        );
        summary
    }

    /// 工作任务：暂停时不占用并发名额
    async fn execute(
        self,
        task: ChapterTask,
        order_index: usize,
        permits: Arc<Semaphore>,
        control: Arc<dyn ControlSignal>,
    ) -> ChapterResult {
        if self.wait_while_paused(control.as_ref()).await {
            return ChapterResult::error(order_index, "⏹️ 任务已停止".to_string());
        }
        let _permit = match permits.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => return ChapterResult::error(order_index, format!("❌ 并发控制异常: {}", e)),
        };
        task.run(Arc::clone(&self.generator)).await
    }
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}
