#[cfg(test)]
mod orchestrator_integration {
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Duration;
    use veildesk_contract::{Action, ActionKind, ActionPayload, Adapter, AdapterRegistry, ExecutionResult};
    use veildesk_orchestrator::{
        ApprovalBroker, OrchestratorConfig, TaskOrchestrator, TaskStatus,
    };
    use veildesk_sandbox::{Sandbox, SandboxOptions};
    use veildesk_stealth::StealthPolicy;

    struct RecordingAdapter {
        executed: AtomicUsize,
    }

    #[async_trait]
    impl Adapter for RecordingAdapter {
        fn name(&self) -> &str {
            "recording"
        }

        fn can_handle(&self, action: &Action) -> bool {
            matches!(action.kind(), ActionKind::Ui | ActionKind::Custom | ActionKind::App)
        }

        async fn execute(&self, action: &Action) -> ExecutionResult {
            self.executed.fetch_add(1, Ordering::SeqCst);
            if action.name() == "await otp" {
                return ExecutionResult::needs_input("enter the one-time code");
            }
            ExecutionResult::success(json!({ "step": action.name() }))
        }
    }

    fn build(approval_timeout: Duration) -> (Arc<TaskOrchestrator>, Arc<ApprovalBroker>, Arc<RecordingAdapter>) {
        let adapter = Arc::new(RecordingAdapter {
            executed: AtomicUsize::new(0),
        });
        let mut registry = AdapterRegistry::new();
        registry.register(adapter.clone());

        let broker = ApprovalBroker::new();
        let config = OrchestratorConfig {
            approval_timeout,
            quiet_timeout: Duration::from_millis(10),
            ..OrchestratorConfig::default()
        };
        let orchestrator = Arc::new(TaskOrchestrator::new(
            Arc::new(Sandbox::new(Arc::new(registry))),
            SandboxOptions::permissive(),
            Arc::new(StealthPolicy::new()),
            broker.clone(),
            config,
        ));
        (orchestrator, broker, adapter)
    }

    #[tokio::test]
    async fn full_flow_pause_approve_complete() {
        let (orchestrator, broker, adapter) = build(Duration::from_secs(5));

        let id = orchestrator
            .submit(
                "checkout",
                vec![
                    Action::new("open cart", ActionPayload::Ui(json!({ "target": "cart" }))),
                    Action::new("await otp", ActionPayload::Custom(json!({}))),
                    Action::new("confirm purchase", ActionPayload::Custom(json!({}))),
                ],
            )
            .await;

        // First drain stops at the step asking for a one-time code.
        orchestrator.run_until_idle().await;
        let task = orchestrator.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::WaitingForUser);
        assert_eq!(task.interaction_step_index, Some(1));
        assert_eq!(adapter.executed.load(Ordering::SeqCst), 2);

        orchestrator.resume(&id, json!({ "otp": "931042" })).await.unwrap();

        // The final step is high-impact ("purchase"); approve it from a
        // side task while the orchestrator blocks on the prompt.
        let approver = {
            let broker = broker.clone();
            tokio::spawn(async move {
                loop {
                    let pending = broker.list_pending().await;
                    if let Some(prompt) = pending.first() {
                        broker.resolve(&prompt.id, "approve").await.unwrap();
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        orchestrator.run_until_idle().await;
        approver.await.unwrap();

        let task = orchestrator.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 1.0);
        assert_eq!(task.step_results[1], Some(json!({ "otp": "931042" })));
        // open cart + await otp + confirm purchase; the paused step ran
        // exactly once.
        assert_eq!(adapter.executed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unapproved_high_impact_step_fails_the_task() {
        let (orchestrator, _broker, adapter) = build(Duration::from_millis(50));

        let id = orchestrator
            .submit(
                "payout",
                vec![Action::new("transfer funds", ActionPayload::Custom(json!({})))],
            )
            .await;
        orchestrator.run_until_idle().await;

        let task = orchestrator.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("approval_denied"));
        assert_eq!(adapter.executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blocked_app_category_consumes_retries_and_fails() {
        let adapter = Arc::new(RecordingAdapter {
            executed: AtomicUsize::new(0),
        });
        let mut registry = AdapterRegistry::new();
        registry.register(adapter.clone());

        // Default options fail closed: app launches are not allowed.
        let config = OrchestratorConfig {
            quiet_timeout: Duration::from_millis(10),
            default_max_retries: 1,
            ..OrchestratorConfig::default()
        };
        let orchestrator = TaskOrchestrator::new(
            Arc::new(Sandbox::new(Arc::new(registry))),
            SandboxOptions::default().with_simulate(false),
            Arc::new(StealthPolicy::new()),
            ApprovalBroker::new(),
            config,
        );

        let id = orchestrator
            .submit(
                "launch",
                vec![Action::new(
                    "start browser",
                    ActionPayload::App {
                        path: "/usr/bin/browser".into(),
                        args: vec![],
                        workspace: None,
                    },
                )],
            )
            .await;
        orchestrator.run_until_idle().await;

        let task = orchestrator.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 1);
        assert_eq!(task.error.as_deref(), Some("app_not_allowed"));
        assert_eq!(adapter.executed.load(Ordering::SeqCst), 0);
    }
}
