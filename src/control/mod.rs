//! 生成任务的控制状态表
//!
//! 按 `(user_id, task_id)` 维护任务状态与事件日志，供后台任务、控制请求
//! 以及流式消费方共同访问。所有访问都经过同一把可重入锁。

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::generator::events::StreamEvent;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Paused,
    Stopped,
    Completed,
}

impl TaskStatus {
    /// 终止状态：不会再产生新的事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Stopped | TaskStatus::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Paused => write!(f, "paused"),
            TaskStatus::Stopped => write!(f, "stopped"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// 外部控制动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Resume,
    Stop,
}

impl ControlAction {
    fn target_status(&self) -> TaskStatus {
        match self {
            ControlAction::Pause => TaskStatus::Paused,
            ControlAction::Resume => TaskStatus::Running,
            ControlAction::Stop => TaskStatus::Stopped,
        }
    }
}

impl std::str::FromStr for ControlAction {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pause" => Ok(ControlAction::Pause),
            "resume" => Ok(ControlAction::Resume),
            "stop" => Ok(ControlAction::Stop),
            other => Err(ControlError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("任务不存在: {user_id}/{task_id}")]
    UnknownTask { user_id: String, task_id: String },
    #[error("未知的控制动作: {0}")]
    UnknownAction(String),
}

/// 生成任务在执行过程中查询控制状态的接口
pub trait ControlSignal: Send + Sync {
    fn check_status(&self) -> TaskStatus;
}

type TaskKey = (String, String);

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    events: Vec<String>,
    created_at: DateTime<Utc>,
    epoch: u64,
}

/// 任务状态表
#[derive(Default)]
pub struct TaskManager {
    tasks: ReentrantMutex<RefCell<HashMap<TaskKey, TaskState>>>,
    next_epoch: AtomicU64,
}

impl TaskManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(user_id: &str, task_id: &str) -> TaskKey {
        (user_id.to_string(), task_id.to_string())
    }

    /// 登记新任务。同一任务仍在运行时先强制停止旧任务。
    pub fn start(self: &Arc<Self>, user_id: &str, task_id: &str) -> ControlHandle {
        let guard = self.tasks.lock();
        let key = Self::key(user_id, task_id);

        if let Some(previous) = guard.borrow_mut().get_mut(&key)
            && previous.status == TaskStatus::Running
        {
            tracing::warn!("⚠️ 任务 {}/{} 仍在运行，强制停止旧任务", user_id, task_id);
            previous.status = TaskStatus::Stopped;
        }

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;

        guard.borrow_mut().insert(
            key,
            TaskState {
                status: TaskStatus::Running,
                events: Vec::new(),
                created_at: Utc::now(),
                epoch,
            },
        );

        ControlHandle {
            manager: Arc::clone(self),
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            epoch,
        }
    }

    /// 设置任务状态
    pub fn set_status(
        &self,
        user_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), ControlError> {
        let guard = self.tasks.lock();
        let mut tasks = guard.borrow_mut();
        match tasks.get_mut(&Self::key(user_id, task_id)) {
            Some(state) => {
                state.status = status;
                Ok(())
            }
            None => Err(ControlError::UnknownTask {
                user_id: user_id.to_string(),
                task_id: task_id.to_string(),
            }),
        }
    }

    /// 查询任务状态，条目不存在时视为已停止
    pub fn get_status(&self, user_id: &str, task_id: &str) -> TaskStatus {
        let guard = self.tasks.lock();
        let tasks = guard.borrow();
        tasks
            .get(&Self::key(user_id, task_id))
            .map(|state| state.status)
            .unwrap_or(TaskStatus::Stopped)
    }

    fn status_for_epoch(&self, user_id: &str, task_id: &str, epoch: u64) -> TaskStatus {
        let guard = self.tasks.lock();
        let tasks = guard.borrow();
        match tasks.get(&Self::key(user_id, task_id)) {
            Some(state) if state.epoch == epoch => state.status,
            _ => TaskStatus::Stopped,
        }
    }

    /// 执行暂停/继续/停止动作，返回变更后的状态
    pub fn apply(
        &self,
        user_id: &str,
        task_id: &str,
        action: ControlAction,
    ) -> Result<TaskStatus, ControlError> {
        let guard = self.tasks.lock();
        let current = guard
            .borrow()
            .get(&Self::key(user_id, task_id))
            .map(|state| state.status);

        match current {
            None => Err(ControlError::UnknownTask {
                user_id: user_id.to_string(),
                task_id: task_id.to_string(),
            }),
            // 已结束的任务不再接受控制
            Some(status) if status.is_terminal() => Ok(status),
            Some(_) => {
                let target = action.target_status();
                self.set_status(user_id, task_id, target)?;
                tracing::info!("🎛️ 任务 {}/{} 状态变更为 {}", user_id, task_id, target);
                Ok(target)
            }
        }
    }

    /// 追加一条已渲染的事件
    pub fn append_event(&self, user_id: &str, task_id: &str, event: String) {
        let guard = self.tasks.lock();
        if let Some(state) = guard.borrow_mut().get_mut(&Self::key(user_id, task_id)) {
            state.events.push(event);
        }
    }

    /// 从给定位置起读取事件，同时返回当前状态
    pub fn drain_from(
        &self,
        user_id: &str,
        task_id: &str,
        index: usize,
    ) -> (Vec<String>, TaskStatus) {
        let guard = self.tasks.lock();
        let tasks = guard.borrow();
        match tasks.get(&Self::key(user_id, task_id)) {
            Some(state) => {
                let events = state
                    .events
                    .get(index..)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                (events, state.status)
            }
            None => (Vec::new(), TaskStatus::Stopped),
        }
    }

    /// 任务创建时间
    pub fn created_at(&self, user_id: &str, task_id: &str) -> Option<DateTime<Utc>> {
        let guard = self.tasks.lock();
        let tasks = guard.borrow();
        tasks.get(&Self::key(user_id, task_id)).map(|state| state.created_at)
    }

    /// 移除任务条目
    pub fn evict(&self, user_id: &str, task_id: &str) -> bool {
        let guard = self.tasks.lock();
        let removed = guard.borrow_mut().remove(&Self::key(user_id, task_id)).is_some();
        removed
    }

    pub fn len(&self) -> usize {
        let guard = self.tasks.lock();
        let len = guard.borrow().len();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 消费方轮询：持续读出事件直到任务进入终止状态且事件读尽，
    /// 最后输出 done 事件并移除条目。
    pub async fn stream_progress<F>(
        &self,
        user_id: &str,
        task_id: &str,
        poll_interval: Duration,
        mut sink: F,
    ) where
        F: FnMut(String),
    {
        let mut cursor = 0;
        loop {
            let (events, status) = self.drain_from(user_id, task_id, cursor);
            if events.is_empty() {
                if status.is_terminal() {
                    sink(StreamEvent::Done.to_sse());
                    self.evict(user_id, task_id);
                    return;
                }
                sink(StreamEvent::KeepAlive.to_sse());
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            cursor += events.len();
            for event in events {
                sink(event);
            }
        }
    }
}

/// 某一次运行持有的控制句柄
///
/// 同一任务被重新启动后，旧句柄读到的状态恒为 `Stopped`。
#[derive(Clone)]
pub struct ControlHandle {
    manager: Arc<TaskManager>,
    user_id: String,
    task_id: String,
    epoch: u64,
}

impl ControlHandle {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn manager(&self) -> &Arc<TaskManager> {
        &self.manager
    }

    /// 是否仍是该任务当前的运行实例
    pub fn is_current(&self) -> bool {
        let guard = self.manager.tasks.lock();
        let tasks = guard.borrow();
        tasks
            .get(&TaskManager::key(&self.user_id, &self.task_id))
            .is_some_and(|state| state.epoch == self.epoch)
    }

    /// 追加事件，旧实例的事件会被丢弃
    pub fn append_event(&self, event: String) {
        let _guard = self.manager.tasks.lock();
        if self.is_current() {
            self.manager.append_event(&self.user_id, &self.task_id, event);
        }
    }

    /// 设置状态，旧实例不会影响新任务
    pub fn set_status(&self, status: TaskStatus) {
        let _guard = self.manager.tasks.lock();
        if self.is_current() {
            let _ = self.manager.set_status(&self.user_id, &self.task_id, status);
        }
    }
}

impl ControlSignal for ControlHandle {
    fn check_status(&self) -> TaskStatus {
        self.manager
            .status_for_epoch(&self.user_id, &self.task_id, self.epoch)
    }
}

#[cfg(test)]
mod tests;
