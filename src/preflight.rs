//! Readiness-gated task submission.
//!
//! Before a task starts, a *fresh* snapshot is fetched and compared; a stale
//! "ready" result is never trusted across attempts. When the environment is
//! blocked, the caller is handed the snapshot to route into remediation
//! instead of silently proceeding.

use crate::diagnostics::DiagnosticsController;
use crate::model::StartupDiagnostics;
use crate::runner::TaskRunner;

#[derive(Debug)]
pub enum PreflightOutcome {
    /// The run was accepted and is now in flight.
    Started,
    /// The environment is not ready; show the remediation wizard.
    Blocked(StartupDiagnostics),
    /// The runner refused (empty URL or a run already active).
    Rejected,
}

/// Re-check readiness and submit. A refresh that fails outright does not
/// block submission: the gate is advisory and the backend will fail the run
/// with a concrete error if the environment really is broken.
pub async fn submit_with_preflight(
    diagnostics: &DiagnosticsController,
    runner: &TaskRunner,
    url: &str,
    download_video: bool,
) -> PreflightOutcome {
    if let Some(snapshot) = diagnostics.refresh().await {
        if !snapshot.ready {
            return PreflightOutcome::Blocked(snapshot);
        }
    }

    if runner.run_task(url, download_video) {
        PreflightOutcome::Started
    } else {
        PreflightOutcome::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::model::{DiagnosticItem, ItemKind, ItemStatus, TaskStatus};
    use crate::ports::{DiagnosticsBackend, RemediationBackend, TaskBackend};
    use anyhow::{anyhow, Result};
    use std::sync::{Arc, Mutex};

    struct StubTask;

    #[async_trait::async_trait]
    impl TaskBackend for StubTask {
        async fn submit(&self, _url: &str, _audio_only: bool) -> Result<String> {
            Ok("Saved to: /tmp/note.md".to_string())
        }

        async fn cancel(&self) -> Result<()> {
            Ok(())
        }
    }

    struct StubDiag {
        responses: Mutex<Vec<Result<StartupDiagnostics>>>,
    }

    #[async_trait::async_trait]
    impl DiagnosticsBackend for StubDiag {
        async fn fetch(&self) -> Result<StartupDiagnostics> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(anyhow!("exhausted")))
        }
    }

    struct StubRemediation;

    #[async_trait::async_trait]
    impl RemediationBackend for StubRemediation {
        async fn start_service(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn stop_service(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn select_vault_path(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn select_model_path(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn update_vault_path(&self, _path: &str) -> Result<()> {
            Ok(())
        }
        async fn update_model_path(&self, _path: &str) -> Result<()> {
            Ok(())
        }
        async fn update_api_key(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        async fn read_clipboard_text(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn open_external_url(&self, _url: &str) -> Result<()> {
            Ok(())
        }
    }

    fn ready_snapshot() -> StartupDiagnostics {
        StartupDiagnostics {
            generated_at: "now".to_string(),
            provider: "ollama".to_string(),
            blockers: Vec::new(),
            ready: true,
            items: Vec::new(),
        }
    }

    fn blocked_snapshot() -> StartupDiagnostics {
        StartupDiagnostics {
            generated_at: "now".to_string(),
            provider: "ollama".to_string(),
            blockers: Vec::new(),
            ready: true, // ingestion recomputes this from the item below
            items: vec![DiagnosticItem {
                id: "model_path".to_string(),
                name: "Whisper Model Path".to_string(),
                status: ItemStatus::Misconfigured,
                required_for: vec!["transcribe".to_string()],
                detected_path: String::new(),
                fix_suggestion: String::new(),
                fix_commands: Vec::new(),
                can_auto_fix: false,
                is_blocker: true,
                kind: ItemKind::Other,
            }],
        }
    }

    fn setup(responses: Vec<Result<StartupDiagnostics>>) -> (DiagnosticsController, TaskRunner) {
        let diagnostics = DiagnosticsController::new(
            Arc::new(StubDiag {
                responses: Mutex::new(responses),
            }),
            Arc::new(StubRemediation),
        );
        let runner = TaskRunner::new(Arc::new(StubTask), &EventBus::new());
        (diagnostics, runner)
    }

    #[tokio::test]
    async fn blocked_environment_refuses_submission() {
        let (diagnostics, runner) = setup(vec![Ok(blocked_snapshot())]);

        let outcome =
            submit_with_preflight(&diagnostics, &runner, "https://youtu.be/x", false).await;
        match outcome {
            PreflightOutcome::Blocked(snapshot) => {
                assert_eq!(snapshot.blockers, vec!["model_path".to_string()]);
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
        assert_eq!(runner.status(), TaskStatus::Idle);
    }

    #[tokio::test]
    async fn ready_environment_starts_the_run() {
        let (diagnostics, runner) = setup(vec![Ok(ready_snapshot())]);

        let outcome =
            submit_with_preflight(&diagnostics, &runner, "https://youtu.be/x", false).await;
        assert!(matches!(outcome, PreflightOutcome::Started));
        assert_ne!(runner.status(), TaskStatus::Idle);
    }

    #[tokio::test]
    async fn unavailable_diagnostics_do_not_block() {
        let (diagnostics, runner) = setup(vec![Err(anyhow!("ipc down"))]);

        let outcome =
            submit_with_preflight(&diagnostics, &runner, "https://youtu.be/x", false).await;
        assert!(matches!(outcome, PreflightOutcome::Started));
    }

    #[tokio::test]
    async fn gate_is_reevaluated_on_every_attempt() {
        // Newest-first pop order: first attempt sees ready, second blocked.
        let (diagnostics, runner) = setup(vec![Ok(blocked_snapshot()), Ok(ready_snapshot())]);

        let outcome =
            submit_with_preflight(&diagnostics, &runner, "https://youtu.be/x", false).await;
        assert!(matches!(outcome, PreflightOutcome::Started));

        // A blocked refresh now wins over the cached ready snapshot from the
        // previous attempt.
        let outcome =
            submit_with_preflight(&diagnostics, &runner, "https://youtu.be/y", false).await;
        assert!(matches!(outcome, PreflightOutcome::Blocked(_)));
    }

    #[tokio::test]
    async fn empty_url_is_rejected_even_when_ready() {
        let (diagnostics, runner) = setup(vec![Ok(ready_snapshot())]);

        let outcome = submit_with_preflight(&diagnostics, &runner, "", false).await;
        assert!(matches!(outcome, PreflightOutcome::Rejected));
    }
}
