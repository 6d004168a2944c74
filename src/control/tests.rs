#[cfg(test)]
mod tests {
    use crate::control::{ControlAction, ControlError, ControlSignal, TaskManager, TaskStatus};
    use std::time::Duration;

    #[test]
    fn test_start_registers_running_task() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "t1");

        assert_eq!(manager.get_status("u1", "t1"), TaskStatus::Running);
        assert_eq!(handle.check_status(), TaskStatus::Running);
        assert!(manager.created_at("u1", "t1").is_some());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_missing_entry_reads_as_stopped() {
        let manager = TaskManager::new();
        assert_eq!(manager.get_status("nobody", "none"), TaskStatus::Stopped);

        let handle = manager.start("u1", "t1");
        assert!(manager.evict("u1", "t1"));
        assert_eq!(handle.check_status(), TaskStatus::Stopped);
        assert!(!manager.evict("u1", "t1"));
    }

    #[test]
    fn test_apply_pause_resume_stop() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "t1");

        assert_eq!(
            manager.apply("u1", "t1", ControlAction::Pause),
            Ok(TaskStatus::Paused)
        );
        assert_eq!(handle.check_status(), TaskStatus::Paused);

        assert_eq!(
            manager.apply("u1", "t1", ControlAction::Resume),
            Ok(TaskStatus::Running)
        );
        assert_eq!(
            manager.apply("u1", "t1", ControlAction::Stop),
            Ok(TaskStatus::Stopped)
        );
        // 已停止的任务不能再恢复
        assert_eq!(
            manager.apply("u1", "t1", ControlAction::Resume),
            Ok(TaskStatus::Stopped)
        );
    }

    #[test]
    fn test_apply_unknown_task() {
        let manager = TaskManager::new();
        let err = manager.apply("u1", "ghost", ControlAction::Pause).unwrap_err();
        assert_eq!(
            err,
            ControlError::UnknownTask {
                user_id: "u1".to_string(),
                task_id: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_control_action_from_str() {
        assert_eq!("pause".parse::<ControlAction>(), Ok(ControlAction::Pause));
        assert_eq!(" Resume ".parse::<ControlAction>(), Ok(ControlAction::Resume));
        assert_eq!("STOP".parse::<ControlAction>(), Ok(ControlAction::Stop));
        assert!("restart".parse::<ControlAction>().is_err());
    }

    #[test]
    fn test_restart_invalidates_previous_handle() {
        let manager = TaskManager::new();
        let old = manager.start("u1", "t1");
        old.append_event("old-1".to_string());

        let new = manager.start("u1", "t1");
        assert_eq!(old.check_status(), TaskStatus::Stopped);
        assert_eq!(new.check_status(), TaskStatus::Running);

        // 旧实例写入的事件与状态不会影响新任务
        old.append_event("old-2".to_string());
        old.set_status(TaskStatus::Completed);
        let (events, status) = manager.drain_from("u1", "t1", 0);
        assert!(events.is_empty());
        assert_eq!(status, TaskStatus::Running);
        assert!(!old.is_current());
        assert!(new.is_current());
    }

    #[test]
    fn test_drain_from_index() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "t1");
        for i in 0..3 {
            handle.append_event(format!("e{}", i));
        }

        let (all, _) = manager.drain_from("u1", "t1", 0);
        assert_eq!(all, vec!["e0", "e1", "e2"]);

        let (tail, _) = manager.drain_from("u1", "t1", 2);
        assert_eq!(tail, vec!["e2"]);

        let (beyond, status) = manager.drain_from("u1", "t1", 10);
        assert!(beyond.is_empty());
        assert_eq!(status, TaskStatus::Running);
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(TaskStatus::Stopped.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn test_concurrent_writers() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "t1");

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        handle.append_event(format!("{}-{}", i, j));
                        let _ = handle.check_status();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let (events, _) = manager.drain_from("u1", "t1", 0);
        assert_eq!(events.len(), 400);
    }

    #[tokio::test]
    async fn test_stream_progress_ends_with_done_and_evicts() {
        let manager = TaskManager::new();
        let handle = manager.start("u1", "t1");
        handle.append_event("data: {\"type\":\"log\",\"msg\":\"a\"}\n\n".to_string());

        let writer = {
            let handle = handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                handle.append_event("data: {\"type\":\"log\",\"msg\":\"b\"}\n\n".to_string());
                handle.set_status(TaskStatus::Completed);
            })
        };

        let mut received = Vec::new();
        manager
            .stream_progress("u1", "t1", Duration::from_millis(5), |line| {
                received.push(line)
            })
            .await;
        writer.await.unwrap();

        let payload: Vec<_> = received
            .iter()
            .filter(|line| !line.starts_with(':'))
            .cloned()
            .collect();
        assert_eq!(payload.len(), 3);
        assert!(payload[0].contains("\"a\""));
        assert!(payload[1].contains("\"b\""));
        assert_eq!(payload[2], "data: {\"type\":\"done\"}\n\n");
        assert!(manager.is_empty());
    }
}
