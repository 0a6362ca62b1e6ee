//! External collaborator ports.
//!
//! Everything the client core needs from the outside world is behind one of
//! these traits. The composition root injects IPC-backed implementations;
//! tests inject mocks. No transport details leak into this crate.

use crate::model::StartupDiagnostics;
use anyhow::Result;
use async_trait::async_trait;

/// The backend process that runs the download/transcribe/analyze pipeline.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Submit a task. Resolves with a human-readable result on success.
    async fn submit(&self, url: &str, audio_only: bool) -> Result<String>;

    /// Request cancellation of the running task. Resolving means the request
    /// was accepted, not that the task has stopped.
    async fn cancel(&self) -> Result<()>;
}

/// Source of startup readiness snapshots.
#[async_trait]
pub trait DiagnosticsBackend: Send + Sync {
    async fn fetch(&self) -> Result<StartupDiagnostics>;
}

/// Host-side remediation operations: service control, native dialogs,
/// config updates, clipboard and browser access.
#[async_trait]
pub trait RemediationBackend: Send + Sync {
    /// Start the local model runtime. Resolves with a status message.
    async fn start_service(&self) -> Result<String>;

    /// Stop the local model runtime. Resolves with a status message.
    async fn stop_service(&self) -> Result<String>;

    /// Open a directory picker for the vault. Empty string means dismissed.
    async fn select_vault_path(&self) -> Result<String>;

    /// Open a file picker for the transcription model. Empty string means
    /// dismissed.
    async fn select_model_path(&self) -> Result<String>;

    async fn update_vault_path(&self, path: &str) -> Result<()>;

    async fn update_model_path(&self, path: &str) -> Result<()>;

    async fn update_api_key(&self, key: &str) -> Result<()>;

    async fn read_clipboard_text(&self) -> Result<String>;

    async fn open_external_url(&self, url: &str) -> Result<()>;
}
