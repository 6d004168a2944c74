//! 后台任务：把生成事件写入控制表，供流式消费方读取

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;

use crate::control::{ControlHandle, ControlSignal, TaskStatus};
use crate::generator::events::StreamEvent;
use crate::generator::orchestrator::{GenerationOrchestrator, GenerationRequest, GenerationSummary};

/// 准备输入并驱动生成，直到事件流结束或任务被停止
///
/// `prepare` 中的失败（输入加载等）作为日志事件写入控制表。
/// 退出时仍处于运行状态的任务被标记为完成。
pub async fn background_worker<F>(
    orchestrator: GenerationOrchestrator,
    prepare: F,
    handle: ControlHandle,
) -> Option<GenerationSummary>
where
    F: Future<Output = Result<GenerationRequest>>,
{
    let summary = pump(orchestrator, prepare, &handle).await;
    if handle.check_status() == TaskStatus::Running {
        handle.set_status(TaskStatus::Completed);
    }
    summary
}

async fn pump<F>(
    orchestrator: GenerationOrchestrator,
    prepare: F,
    handle: &ControlHandle,
) -> Option<GenerationSummary>
where
    F: Future<Output = Result<GenerationRequest>>,
{
    let request = match prepare.await {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("❌ 后台任务异常: {:#}", e);
            handle.append_event(StreamEvent::log(format!("❌ 后台任务异常: {:#}", e)).to_sse());
            return None;
        }
    };

    let control: Arc<dyn ControlSignal> = Arc::new(handle.clone());
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let run = orchestrator.run(request, control, tx);
    tokio::pin!(run);

    let mut summary = None;
    loop {
        tokio::select! {
            finished = &mut run, if summary.is_none() => {
                summary = Some(finished);
            }
            event = rx.recv() => match event {
                Some(event) => {
                    if handle.check_status() == TaskStatus::Stopped {
                        tracing::info!("[Worker] 检测到停止信号，正在退出: {}", handle.task_id());
                        return summary;
                    }
                    // done 与心跳由消费方自行输出
                    if matches!(event, StreamEvent::Done | StreamEvent::KeepAlive) {
                        continue;
                    }
                    handle.append_event(event.to_sse());
                }
                None => return summary,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::control::TaskManager;
    use crate::i18n::TargetLanguage;
    use crate::llm::TextGenerator;
    use crate::types::outline::{Outline, OutlineNode};
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            Ok("正文内容".to_string())
        }
    }

    fn orchestrator() -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            Arc::new(EchoGenerator),
            GenerationConfig {
                poll_interval_ms: 10,
                fact_research: false,
                ..Default::default()
            },
            TargetLanguage::Chinese,
        )
    }

    #[tokio::test]
    async fn test_worker_records_events_and_completes() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "t1");
        let request = GenerationRequest {
            title: "测试论文".to_string(),
            outline: Outline::new(vec![OutlineNode::new("结论", 200)]),
            ..Default::default()
        };

        let summary = background_worker(
            orchestrator(),
            async { Ok::<_, anyhow::Error>(request) },
            handle,
        )
        .await;
        assert_eq!(summary.map(|s| s.streamed), Some(1));
        assert_eq!(manager.get_status("u1", "t1"), TaskStatus::Completed);

        let mut received = Vec::new();
        manager
            .stream_progress("u1", "t1", Duration::from_millis(5), |line| received.push(line))
            .await;
        let events: Vec<_> = received
            .iter()
            .filter_map(|line| StreamEvent::parse_sse(line))
            .filter(|e| *e != StreamEvent::KeepAlive)
            .collect();
        assert!(events.iter().any(
            |e| matches!(e, StreamEvent::Content { md } if md.starts_with("## 结论"))
        ));
        // 消费方在任务结束后补发 done
        assert_eq!(events.last(), Some(&StreamEvent::Done));
        assert_eq!(events.iter().filter(|e| **e == StreamEvent::Done).count(), 1);
    }

    #[tokio::test]
    async fn test_worker_reports_preparation_failure() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "broken");

        let summary = background_worker(
            orchestrator(),
            async { Err::<GenerationRequest, _>(anyhow::anyhow!("大纲文件不存在")) },
            handle,
        )
        .await;
        assert!(summary.is_none());
        assert_eq!(manager.get_status("u1", "broken"), TaskStatus::Completed);

        let (events, _) = manager.drain_from("u1", "broken", 0);
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("❌ 后台任务异常: 大纲文件不存在"));
    }

    #[tokio::test]
    async fn test_stopped_worker_keeps_stopped_status() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "halt");
        manager.set_status("u1", "halt", TaskStatus::Stopped).unwrap();
        let request = GenerationRequest {
            title: "测试论文".to_string(),
            outline: Outline::new(vec![OutlineNode::new("结论", 200)]),
            ..Default::default()
        };

        background_worker(orchestrator(), async { Ok::<_, anyhow::Error>(request) }, handle).await;
        assert_eq!(manager.get_status("u1", "halt"), TaskStatus::Stopped);
        let (events, _) = manager.drain_from("u1", "halt", 0);
        assert!(events.iter().all(|e| !e.contains("\"done\"")));
    }
}
