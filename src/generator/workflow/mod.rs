use crate::config::Config;
use crate::control::{ControlAction, TaskManager};
use crate::generator::context::GeneratorContext;
use crate::generator::events::StreamEvent;
use crate::generator::inputs::{expand_data_files, load_user_data, prepare_request, read_optional};
use crate::generator::orchestrator::{GenerationOrchestrator, GenerationRequest};
use crate::generator::outlet::{DiskOutlet, DocumentAssembler, Outlet};
use crate::generator::planner::WordPlanner;
use crate::generator::rewriter::{ChapterRewriter, RewriteRequest, RewriteTarget};
use crate::generator::worker::background_worker;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 消费方轮询控制表的间隔
const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// 输出目录下的控制文件，写入 pause / resume / stop 即可控制运行中的任务
pub const CONTROL_FILENAME: &str = "control";

/// 章节重写结果的文件名
pub const REWRITE_FILENAME: &str = "rewrite.md";

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: HashMap<&'static str, Instant>,
    phase_durations: Vec<(&'static str, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &'static str) {
        self.phase_start_times.insert(phase_name, Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &'static str) -> Option<Duration> {
        let duration = self.phase_start_times.remove(phase_name)?.elapsed();
        self.phase_durations.push((phase_name, duration));
        Some(duration)
    }

    pub fn phase_durations(&self) -> &[(&'static str, Duration)] {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒\n",
            self.start_time.elapsed().as_secs_f64()
        );
        if !self.phase_durations.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for (phase, duration) in &self.phase_durations {
                report.push_str(&format!("- {}: {:.3}秒\n", phase, duration.as_secs_f64()));
            }
        }
        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const GENERATION: &'static str = "generation";
    pub const OUTPUT: &'static str = "output";
}

/// 启动论文生成工作流
pub async fn launch(config: &Config) -> Result<()> {
    let context = GeneratorContext::new(config.clone())?;

    // 启动时检查模型连接
    context.llm_client.check_connection().await?;

    let planner = WordPlanner::new(context.llm_client.clone());
    let prepare_config = config.clone();
    let prepare = async move {
        let mut request = prepare_request(&prepare_config)?;
        if let Some(total_words) = prepare_config.total_words {
            plan_word_counts(&planner, total_words, &mut request).await;
        }
        Ok::<_, anyhow::Error>(request)
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("⚠️ 无法监听中断信号: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let paper_path = run_task(
        config,
        context.orchestrator(),
        &context.task_manager,
        prepare,
        interrupt,
    )
    .await?;
    println!("✅ 论文已生成: {}", paper_path.display());
    Ok(())
}

/// 按修改意见重写单个章节
pub async fn rewrite(config: &Config, target: &RewriteTarget) -> Result<()> {
    let context = GeneratorContext::new(config.clone())?;
    context.llm_client.check_connection().await?;

    let rewriter = ChapterRewriter::new(Arc::new(context.llm_client.clone()));
    let rewrite_path = run_rewrite(config, &rewriter, target).await?;
    println!("✅ 章节已重写: {}", rewrite_path.display());
    Ok(())
}

/// 读取原文、前文与用户数据，重写后写入输出目录
pub async fn run_rewrite(
    config: &Config,
    rewriter: &ChapterRewriter,
    target: &RewriteTarget,
) -> Result<PathBuf> {
    let data_files = expand_data_files(&config.data_files)?;
    let request = RewriteRequest {
        title: config.title.trim().to_string(),
        section_title: target.section_title.trim().to_string(),
        instruction: target.instruction.trim().to_string(),
        context: read_optional(target.context_path.as_deref())?,
        custom_data: load_user_data(config.custom_data_path.as_deref(), &data_files)?,
        original_content: read_optional(target.original_path.as_deref())?,
        language: config.target_language,
    };

    let text = rewriter.rewrite(&request).await?;

    std::fs::create_dir_all(&config.output_path).with_context(|| {
        format!("Failed to create output dir: {}", config.output_path.display())
    })?;
    let rewrite_path = config.output_path.join(REWRITE_FILENAME);
    std::fs::write(&rewrite_path, format!("{}\n", text))
        .with_context(|| format!("Failed to write {}", rewrite_path.display()))?;
    tracing::info!("💾 已保存重写结果: {}", rewrite_path.display());
    Ok(rewrite_path)
}

/// 规划失败时沿用大纲中的字数
async fn plan_word_counts(
    planner: &WordPlanner,
    total_words: u32,
    request: &mut GenerationRequest,
) {
    tracing::info!("📐 正在规划全文 {} 字的章节分配...", total_words);
    match planner.plan(total_words, &request.outline).await {
        Ok(plan) => {
            let updated = plan.apply_to_outline(&mut request.outline);
            tracing::info!("📐 字数规划完成，更新 {} 个章节", updated);
        }
        Err(e) => tracing::warn!("⚠️ 字数规划失败，沿用大纲字数: {:#}", e),
    }
}

/// 在控制表中登记任务，驱动后台生成并消费事件流，最后写出文档
///
/// `interrupt` 完成时任务被停止；运行期间输出目录下的控制文件也会被读取并执行。
pub async fn run_task<F, I>(
    config: &Config,
    orchestrator: GenerationOrchestrator,
    manager: &Arc<TaskManager>,
    prepare: F,
    interrupt: I,
) -> Result<PathBuf>
where
    F: Future<Output = Result<GenerationRequest>>,
    I: Future<Output = ()>,
{
    let mut timing = TimingScope::new();
    let task_id = config.resolve_task_id();
    tracing::info!("📝 任务 {} / {} 开始", config.user_id, task_id);
    let handle = manager.start(&config.user_id, &task_id);

    let mut document = DocumentAssembler::new(config.title.trim());
    timing.start_phase(TimingKeys::GENERATION);
    let control_path = config.output_path.join(CONTROL_FILENAME);
    let (summary, (), ()) = tokio::join!(
        background_worker(orchestrator, prepare, handle),
        manager.stream_progress(&config.user_id, &task_id, STREAM_POLL_INTERVAL, |line| {
            if let Some(event) = StreamEvent::parse_sse(&line) {
                match &event {
                    StreamEvent::Log { msg } => tracing::info!("{}", msg),
                    StreamEvent::Content { md } => {
                        tracing::debug!("收到文档片段 (len={})", md.chars().count())
                    }
                    StreamEvent::KeepAlive | StreamEvent::Done => {}
                }
                document.push(&event);
            }
        }),
        watch_controls(manager, &config.user_id, &task_id, &control_path, interrupt)
    );
    timing.end_phase(TimingKeys::GENERATION);

    if let Some(summary) = &summary {
        tracing::info!(
            "📊 输出 {} 节，失败 {} 节{}",
            summary.streamed,
            summary.failed,
            if summary.stopped { "（已停止）" } else { "" }
        );
    }

    timing.start_phase(TimingKeys::OUTPUT);
    let paper_path = DiskOutlet::new(&config.output_path).save(&document).await?;
    timing.end_phase(TimingKeys::OUTPUT);

    tracing::info!("⏱️ {}", timing.generate_timing_report());
    Ok(paper_path)
}

/// 在任务结束前响应中断信号与控制文件
async fn watch_controls<I>(
    manager: &TaskManager,
    user_id: &str,
    task_id: &str,
    control_path: &Path,
    interrupt: I,
) where
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                tracing::warn!("⏹️ 收到中断信号，正在停止任务 {}", task_id);
                if let Err(e) = manager.apply(user_id, task_id, ControlAction::Stop) {
                    tracing::warn!("⚠️ 停止任务失败: {}", e);
                }
            }
            _ = tokio::time::sleep(STREAM_POLL_INTERVAL) => {
                if manager.get_status(user_id, task_id).is_terminal() {
                    return;
                }
                apply_control_file(manager, user_id, task_id, control_path);
            }
        }
    }
}

/// 读取并删除控制文件，执行其中的动作
fn apply_control_file(manager: &TaskManager, user_id: &str, task_id: &str, control_path: &Path) {
    let Ok(content) = std::fs::read_to_string(control_path) else {
        return;
    };
    if let Err(e) = std::fs::remove_file(control_path) {
        tracing::warn!("⚠️ 无法删除控制文件 {}: {}", control_path.display(), e);
    }
    match content
        .parse::<ControlAction>()
        .and_then(|action| manager.apply(user_id, task_id, action))
    {
        Ok(status) => tracing::info!("🎛️ 控制文件生效，当前状态: {}", status),
        Err(e) => tracing::warn!("⚠️ 控制文件无效: {}", e),
    }
}
