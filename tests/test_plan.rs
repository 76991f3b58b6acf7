// Integration tests for the plan executor
// Run with cargo test --test test_plan

mod common;

use cmdrelay::backend::ExecutionResult;
use cmdrelay::limits::LimitEnforcer;
use cmdrelay::plan::{
    BlockReason, Plan, PlanCommand, PlanError, PlanExecutor, PlanOutcome, RunOptions, SseFrame,
};
use cmdrelay::policy::SafetyEvaluator;
use common::{MockBackend, Scripted, init_tracing, limits};
use std::sync::Arc;
use std::time::Duration;

fn plan(cmds: &[&str]) -> Plan {
    Plan::new(
        "mock-model",
        "mock",
        cmds.iter().map(|c| PlanCommand::new(*c, "step")).collect(),
    )
}

fn executor(backend: Arc<MockBackend>, max_output: usize) -> PlanExecutor {
    PlanExecutor::new(
        backend,
        Arc::new(SafetyEvaluator::default()),
        LimitEnforcer::new(limits(10_000, max_output)),
    )
    .with_heartbeat(Duration::from_secs(60))
}

fn event_names(frames: &[SseFrame]) -> Vec<&'static str> {
    frames.iter().filter_map(|f| f.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_fast_stops_after_failed_step() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let outcome = executor(backend.clone(), 10_000)
            .run_sync(plan(&["false", "echo never"]), RunOptions::default())
            .await;

        assert_eq!(outcome.http_status(), 200);
        assert_eq!(outcome.results().len(), 1);
        assert_eq!(outcome.results()[0].result.exit_code, 1);
        assert_eq!(backend.calls(), vec!["false"]);
    }

    #[tokio::test]
    async fn test_all_steps_run_in_order() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let outcome = executor(backend.clone(), 10_000)
            .run_sync(plan(&["echo one", "echo two", "echo three"]), RunOptions::default())
            .await;

        let stdout: Vec<&str> = outcome.results().iter().map(|r| r.result.stdout.trim()).collect();
        assert_eq!(stdout, vec!["one", "two", "three"]);
        assert!(!outcome.terminated());
    }

    #[tokio::test]
    async fn test_hard_deny_blocks_whole_plan() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let outcome = executor(backend.clone(), 10_000)
            .run_sync(
                plan(&["echo ok", "rm -rf /"]),
                RunOptions {
                    dry_run: false,
                    confirm: true,
                },
            )
            .await;

        match &outcome {
            PlanOutcome::Blocked { reason, safety, .. } => {
                assert_eq!(*reason, BlockReason::HardDeny);
                assert!(!safety[0].decision.hard_deny);
                assert!(safety[1].decision.hard_deny);
            }
            other => panic!("expected blocked, got {:?}", other),
        }
        assert_eq!(outcome.http_status(), 403);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disk_tools_blocked_even_when_confirmed() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let exec = executor(backend.clone(), 10_000);
        for cmds in [["echo start", "fdisk /dev/sda"], ["echo start", "init 0"]] {
            let outcome = exec
                .run_sync(
                    plan(&cmds),
                    RunOptions {
                        dry_run: false,
                        confirm: true,
                    },
                )
                .await;
            assert!(matches!(
                outcome,
                PlanOutcome::Blocked {
                    reason: BlockReason::HardDeny,
                    ..
                }
            ));
            assert_eq!(outcome.http_status(), 403);
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_gate() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let exec = executor(backend.clone(), 10_000);

        let blocked = exec.run_sync(plan(&["systemctl stop nginx"]), RunOptions::default()).await;
        assert!(matches!(
            blocked,
            PlanOutcome::Blocked {
                reason: BlockReason::NeedsConfirmation,
                ..
            }
        ));
        assert_eq!(blocked.http_status(), 409);
        assert!(backend.calls().is_empty());

        let confirmed = exec
            .run_sync(
                plan(&["systemctl stop nginx"]),
                RunOptions {
                    dry_run: false,
                    confirm: true,
                },
            )
            .await;
        assert_eq!(confirmed.results().len(), 1);
        assert_eq!(backend.calls(), vec!["systemctl stop nginx"]);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let outcome = executor(backend.clone(), 10_000)
            .run_sync(
                plan(&["echo a", "rm -rf /"]),
                RunOptions {
                    dry_run: true,
                    confirm: false,
                },
            )
            .await;

        match outcome {
            PlanOutcome::Done { results, safety, .. } => {
                assert!(results.is_empty());
                assert_eq!(safety.len(), 2);
                assert!(safety[1].decision.hard_deny);
            }
            other => panic!("expected done, got {:?}", other),
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_output_budget_terminates_plan() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let outcome = executor(backend.clone(), 10)
            .run_sync(
                plan(&["echo 0123456789abcdef", "echo more", "echo skipped"]),
                RunOptions::default(),
            )
            .await;

        let results = outcome.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].result.stdout, "0123456789");
        assert!(results[0].result.truncated);
        assert!(!results[0].result.terminated);
        assert!(results[1].result.terminated);
        assert!(outcome.terminated());
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_connection_failure_aborts() {
        init_tracing();

        let backend = Arc::new(MockBackend::new().script("uptime", Scripted::ConnectionLost));
        let outcome = executor(backend.clone(), 10_000)
            .run_sync(plan(&["echo first", "uptime", "echo never"]), RunOptions::default())
            .await;

        match &outcome {
            PlanOutcome::Aborted { results, message, .. } => {
                assert_eq!(results.len(), 1);
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected aborted, got {:?}", other),
        }
        assert_eq!(outcome.http_status(), 502);
        assert_eq!(backend.calls(), vec!["echo first", "uptime"]);
    }

    #[tokio::test]
    async fn test_scripted_failure_carries_stderr() {
        init_tracing();

        let backend = Arc::new(MockBackend::new().script(
            "make",
            Scripted::Output(ExecutionResult::from_output(
                String::new(),
                "no rule to make target".to_string(),
                2,
            )),
        ));
        let outcome = executor(backend, 10_000)
            .run_sync(plan(&["make", "echo after"]), RunOptions::default())
            .await;

        assert_eq!(outcome.results().len(), 1);
        assert_eq!(outcome.results()[0].result.stderr, "no rule to make target");
        assert!(outcome.results()[0].ai_analysis.is_none());
    }

    #[tokio::test]
    async fn test_stream_event_order() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let stream = executor(backend, 10_000)
            .run_stream(plan(&["echo a", "echo b"]), RunOptions::default())
            .unwrap();
        let frames = stream.collect_frames().await;

        assert_eq!(frames[0], SseFrame::connected());
        assert_eq!(
            event_names(&frames),
            vec!["plan", "step", "step", "step", "step", "done"]
        );
        let done = frames.last().unwrap().data().unwrap();
        assert_eq!(done["status"], "done");
        assert_eq!(done["executed"], 2);
    }

    #[tokio::test]
    async fn test_stream_blocked_plan() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let stream = executor(backend.clone(), 10_000)
            .run_stream(plan(&["mkfs.ext4 /dev/sdb"]), RunOptions::default())
            .unwrap();
        let frames = stream.collect_frames().await;

        assert_eq!(event_names(&frames), vec!["plan", "policy", "done"]);
        let policy = frames.iter().find(|f| f.name() == Some("policy")).unwrap();
        assert_eq!(policy.data().unwrap()["reason"], "hard-deny");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stream_failed_generation() {
        init_tracing();

        let backend = Arc::new(MockBackend::new());
        let stream = executor(backend.clone(), 10_000)
            .run_stream_with(
                async { Err(PlanError::EngineStreamingUnsupported("x".to_string())) },
                RunOptions::default(),
            )
            .unwrap();
        let frames = stream.collect_frames().await;

        assert_eq!(event_names(&frames), vec!["error", "done"]);
        assert_eq!(frames.last().unwrap().data().unwrap()["status"], "failed");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_unsupported_backend() {
        init_tracing();

        let backend = Arc::new(MockBackend::ssm_like());
        let result = executor(backend.clone(), 10_000).run_stream(plan(&["echo a"]), RunOptions::default());

        assert!(matches!(result, Err(PlanError::StreamingUnsupported(_))));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_during_slow_step() {
        init_tracing();

        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(300)));
        let exec = executor(backend, 10_000).with_heartbeat(Duration::from_millis(50));
        let frames = exec
            .run_stream(plan(&["echo slow"]), RunOptions::default())
            .unwrap()
            .collect_frames()
            .await;

        assert!(frames.contains(&SseFrame::keep_alive()));
        assert_eq!(frames.last().unwrap().name(), Some("done"));
    }

    #[tokio::test]
    async fn test_disconnect_stops_dispatch() {
        init_tracing();

        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(100)));
        let mut stream = executor(backend.clone(), 10_000)
            .run_stream(
                plan(&["echo 1", "echo 2", "echo 3", "echo 4", "echo 5", "echo 6"]),
                RunOptions::default(),
            )
            .unwrap();

        while let Some(frame) = stream.next_frame().await {
            if frame.name() == Some("step") && frame.data().unwrap()["status"] == "complete" {
                break;
            }
        }
        drop(stream);

        tokio::time::sleep(Duration::from_millis(800)).await;
        let calls = backend.calls().len();
        assert!(calls < 6, "dispatch continued after disconnect: {} calls", calls);
    }
}
