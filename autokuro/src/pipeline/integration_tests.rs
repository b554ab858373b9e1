//! End-to-end tests for the sequencer over a scripted runner.

#[cfg(test)]
mod tests {
    use crate::command::RunFailure;
    use crate::context::RunContext;
    use crate::core::{SkipReason, StageStatus};
    use crate::errors::ReconError;
    use crate::events::{CollectingEventSink, PipelineEvent};
    use crate::pipeline::{Sequencer, StageId, MERGED_URLS, REPORT_FILE};
    use crate::testing::{test_context, RecordingNotifier, Script, ScriptedRunner};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(root: &Path) -> RunContext {
        let wordlist = root.join("wordlist.txt");
        std::fs::write(&wordlist, "admin\nbackup\n").unwrap();
        let mut ctx = test_context(root);
        ctx.wordlist_path = wordlist;
        ctx.wordlist_fallback = None;
        ctx
    }

    fn nonzero(program: &str) -> RunFailure {
        RunFailure::NonZeroExit {
            program: program.to_string(),
            code: Some(1),
            stderr: "rate limited".to_string(),
        }
    }

    fn sequencer(ctx: RunContext, runner: &Arc<ScriptedRunner>) -> Sequencer {
        Sequencer::new(Arc::new(ctx), Arc::clone(runner) as Arc<_>)
    }

    #[tokio::test]
    async fn test_full_run_executes_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let target_dir = ctx.target_dir.clone();
        let runner = Arc::new(ScriptedRunner::new());

        let summary = sequencer(ctx, &runner).run().await.unwrap();

        assert!(!summary.has_failures(), "{:?}", summary.failures());
        assert_eq!(summary.outcomes.len(), StageId::ALL.len());
        for outcome in &summary.outcomes {
            assert_eq!(outcome.status, StageStatus::Done, "{}", outcome.stage);
            assert_eq!(outcome.attempts, 1);
        }
        assert_eq!(runner.calls().len(), StageId::ALL.len());
        assert_eq!(runner.steps()[0], "recon");
        assert_eq!(runner.steps().last().map(String::as_str), Some("secrets"));
        assert_eq!(summary.tolerance.total_stages, StageId::ALL.len() + 2);
        assert_eq!(summary.tolerance.completed_stages, StageId::ALL.len() + 2);

        let merged = std::fs::read_to_string(target_dir.join(MERGED_URLS)).unwrap();
        assert!(merged.contains("https://www.example.com/admin"));
        assert!(merged.contains("https://www.example.com/item?id=FUZZ"));
        assert!(!merged.contains("logo.png"));
        assert_eq!(summary.report, Some(target_dir.join(REPORT_FILE)));

        let report: serde_json::Value =
            serde_json::from_slice(&std::fs::read(target_dir.join(REPORT_FILE)).unwrap()).unwrap();
        assert_eq!(report["target"], "example.com");
        assert_eq!(report["scan_date"], "2024-05-17");
        assert_eq!(report["recon"]["live_hosts"].as_array().unwrap().len(), 3);
        assert_eq!(report["discovery"]["crawled_urls_count"], 6);
    }

    #[tokio::test]
    async fn test_second_run_is_fully_checkpointed() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(ScriptedRunner::new());
        sequencer(context(dir.path()), &first).run().await.unwrap();
        let report_path = context(dir.path()).target_dir.join(REPORT_FILE);
        let first_report = std::fs::read(&report_path).unwrap();

        let second = Arc::new(ScriptedRunner::new());
        let summary = sequencer(context(dir.path()), &second).run().await.unwrap();

        assert!(second.calls().is_empty());
        assert!(summary.outcomes.iter().all(|o| o.status
            == StageStatus::Skipped(SkipReason::Checkpoint)));
        assert!(summary.merge.is_none());
        assert_eq!(summary.tolerance.skipped_stages, StageId::ALL.len() + 1);
        assert_eq!(summary.tolerance.completed_stages, 1);
        assert_eq!(std::fs::read(&report_path).unwrap(), first_report);
    }

    #[tokio::test]
    async fn test_empty_recon_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.notify = true;
        let target_dir = ctx.target_dir.clone();
        let runner = Arc::new(ScriptedRunner::new().with_script("recon", Script::Empty));
        let events = Arc::new(CollectingEventSink::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let err = sequencer(ctx, &runner)
            .with_event_sink(Arc::clone(&events) as Arc<_>)
            .with_notifier(Arc::clone(&notifier) as Arc<_>)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ReconError::CriticalStageFailure { ref stage, .. } if stage == "recon"));
        assert_eq!(runner.steps(), vec!["recon"]);
        assert!(!target_dir.join(REPORT_FILE).exists());
        assert_eq!(events.events_of_type("run.failed").len(), 1);
        assert!(events.events_of_type("group.completed").is_empty());

        let messages = notifier.messages();
        assert!(messages[0].contains("Scan Started"));
        assert!(messages.last().unwrap().contains("Scan Failed"));
    }

    #[tokio::test]
    async fn test_recon_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().failing("recon", &nonzero("httpx-toolkit"), 3));

        let err = sequencer(context(dir.path()), &runner).run().await.unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(runner.call_count("recon"), 1);
        assert!(!context(dir.path()).artifact("live_hosts.txt").path().exists());
    }

    #[tokio::test]
    async fn test_recon_timeout_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let target_dir = ctx.target_dir.clone();
        let runner = Arc::new(
            ScriptedRunner::new().failing("recon", &RunFailure::Timeout(Duration::from_secs(60)), 3),
        );
        let events = Arc::new(CollectingEventSink::new());

        let err = sequencer(ctx, &runner)
            .with_event_sink(Arc::clone(&events) as Arc<_>)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ReconError::CriticalStageFailure { ref stage, .. } if stage == "recon"));
        assert_eq!(runner.steps(), vec!["recon"]);
        assert!(!target_dir.join("live_hosts.txt").exists());
        assert!(!target_dir.join(MERGED_URLS).exists());
        assert!(!target_dir.join(REPORT_FILE).exists());
        assert_eq!(events.events_of_type("run.failed").len(), 1);
        assert!(events.events_of_type("run.completed").is_empty());
    }

    #[tokio::test]
    async fn test_optional_failure_is_tolerated_and_retried_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let nuclei_report = ctx.artifact("nuclei_report.txt");
        let runner = Arc::new(ScriptedRunner::new().failing("vulns", &nonzero("nuclei"), 3));

        let summary = sequencer(ctx, &runner).run().await.unwrap();

        let vulns = summary.outcome(StageId::Vulns).unwrap();
        assert_eq!(vulns.status, StageStatus::Failed);
        assert_eq!(vulns.attempts, 3);
        assert_eq!(summary.failures().len(), 1);
        assert_eq!(summary.failures()[0].stage, "vulns");
        assert_eq!(summary.tolerance.failed_stages, 1);
        assert!(summary.tolerance.success_rate() < 1.0);
        assert!(!nuclei_report.path().exists(), "partial artifact must be removed");
        assert!(summary.report.is_some());

        let rates: Vec<Option<u32>> = runner
            .calls()
            .iter()
            .filter(|c| c.step == "vulns")
            .map(|c| c.head.args.tunable_value("-rl"))
            .collect();
        assert_eq!(rates, vec![Some(150), Some(75), Some(37)]);

        let rerun = Arc::new(ScriptedRunner::new());
        let summary = sequencer(context(dir.path()), &rerun).run().await.unwrap();

        assert_eq!(rerun.steps(), vec!["vulns"]);
        assert!(!summary.has_failures());
        assert!(nuclei_report.is_usable());
    }

    #[tokio::test]
    async fn test_non_adaptive_stage_fails_after_one_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().failing("ports", &RunFailure::Timeout(Duration::from_secs(60)), 3),
        );

        let summary = sequencer(context(dir.path()), &runner).run().await.unwrap();

        let ports = summary.outcome(StageId::Ports).unwrap();
        assert_eq!(ports.status, StageStatus::Failed);
        assert_eq!(ports.attempts, 1);
        assert_eq!(summary.failures()[0].error_type, "OptionalStageFailure");
    }

    #[tokio::test]
    async fn test_zero_byte_artifact_reruns() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().with_script("tech", Script::Empty));

        let summary = sequencer(context(dir.path()), &runner).run().await.unwrap();

        let tech = summary.outcome(StageId::Tech).unwrap();
        assert_eq!(tech.status, StageStatus::Done);
        assert!(tech.artifact.is_none());
        assert_eq!(
            summary.outcome(StageId::ContextVulns).unwrap().status,
            StageStatus::Skipped(SkipReason::NoInput)
        );

        let rerun = Arc::new(ScriptedRunner::new());
        sequencer(context(dir.path()), &rerun).run().await.unwrap();

        assert_eq!(rerun.steps(), vec!["tech", "context_vulns"]);
    }

    #[tokio::test]
    async fn test_findings_raise_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.notify = true;
        let runner = Arc::new(ScriptedRunner::new().with_script("takeover", Script::Empty));
        let events = Arc::new(CollectingEventSink::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let summary = sequencer(ctx, &runner)
            .with_event_sink(Arc::clone(&events) as Arc<_>)
            .with_notifier(Arc::clone(&notifier) as Arc<_>)
            .run()
            .await
            .unwrap();

        let findings: Vec<String> = events
            .events_of_type("stage.findings")
            .iter()
            .filter_map(|e| e.stage().map(ToString::to_string))
            .collect();
        assert!(findings.contains(&"vulns".to_string()));
        assert!(!findings.contains(&"takeover".to_string()));
        assert!(!findings.contains(&"tech".to_string()));
        assert_eq!(summary.outcome(StageId::Vulns).unwrap().findings, 1);

        let messages = notifier.messages();
        assert!(messages.iter().any(|m| m.contains("*Nuclei Vulns*")));
        assert!(!messages.iter().any(|m| m.contains("*Subdomain Takeover*")));
        assert!(messages.last().unwrap().contains("Scan Finished"));
    }

    #[tokio::test]
    async fn test_notifications_off_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let notifier = Arc::new(RecordingNotifier::new());

        sequencer(context(dir.path()), &runner)
            .with_notifier(Arc::clone(&notifier) as Arc<_>)
            .run()
            .await
            .unwrap();

        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_group_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let events = Arc::new(CollectingEventSink::new());

        sequencer(context(dir.path()), &runner)
            .with_event_sink(Arc::clone(&events) as Arc<_>)
            .run()
            .await
            .unwrap();

        let progress: Vec<(usize, usize, u64)> = events
            .events_of_type("group.completed")
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::GroupCompleted {
                    step,
                    total,
                    output_bytes,
                    ..
                } => Some((step, total, output_bytes)),
                _ => None,
            })
            .collect();

        assert_eq!(progress.len(), 7);
        assert_eq!(progress.iter().map(|p| p.0).collect::<Vec<_>>(), (1..=7).collect::<Vec<_>>());
        assert!(progress.iter().all(|p| p.1 == 7));
        assert!(progress.windows(2).all(|w| w[0].2 <= w[1].2));
        assert_eq!(events.events_of_type("run.started").len(), 1);
        assert_eq!(events.events_of_type("run.completed").len(), 1);
    }

    #[tokio::test]
    async fn test_admission_gate_bounds_parallelism() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.hardware.max_parallel = 2;
        let runner = Arc::new(ScriptedRunner::new().with_delay(Duration::from_millis(20)));

        sequencer(ctx, &runner).run().await.unwrap();

        assert_eq!(runner.peak_concurrency(), 2);
    }

    #[tokio::test]
    async fn test_missing_wordlist_skips_dirscan() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.wordlist_path = dir.path().join("missing.txt");
        let runner = Arc::new(ScriptedRunner::new());

        let summary = sequencer(ctx, &runner).run().await.unwrap();

        assert_eq!(
            summary.outcome(StageId::Dirscan).unwrap().status,
            StageStatus::Skipped(SkipReason::NoInput)
        );
        assert_eq!(runner.call_count("dirscan"), 0);
        assert!(!summary.has_failures());
    }
}
