//! Startup health reconciliation.
//!
//! Owns retrieval and caching of the readiness snapshot and drives the
//! remediation workflow. All backend failures degrade to "no change": a
//! stale snapshot is preferable to a false "everything is broken" flicker,
//! so nothing here ever propagates an error to callers.

use crate::model::StartupDiagnostics;
use crate::ports::{DiagnosticsBackend, RemediationBackend};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const MODEL_LIBRARY_URL: &str = "https://ollama.com/library";

/// Caches the latest snapshot, re-derives readiness, and exposes the
/// remediation actions. Snapshots are replaced whole, never patched.
pub struct DiagnosticsController {
    backend: Arc<dyn DiagnosticsBackend>,
    remediation: Arc<dyn RemediationBackend>,
    cached: Mutex<Option<StartupDiagnostics>>,
    // Issue counter for refreshes; only the latest-issued request may apply
    // its response, so reordered resolutions cannot clobber newer data.
    refresh_seq: AtomicU64,
    fixing: Mutex<HashSet<String>>,
    publisher: watch::Sender<Option<StartupDiagnostics>>,
}

impl DiagnosticsController {
    pub fn new(
        backend: Arc<dyn DiagnosticsBackend>,
        remediation: Arc<dyn RemediationBackend>,
    ) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            backend,
            remediation,
            cached: Mutex::new(None),
            refresh_seq: AtomicU64::new(0),
            fixing: Mutex::new(HashSet::new()),
            publisher,
        }
    }

    /// Fetch a fresh snapshot. On success the cache is replaced atomically
    /// and listeners are notified; on failure the cache is left untouched.
    /// Either way the best snapshot currently known is returned.
    pub async fn refresh(&self) -> Option<StartupDiagnostics> {
        let token = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;

        match self.backend.fetch().await {
            Ok(mut snapshot) => {
                if self.refresh_seq.load(Ordering::SeqCst) != token {
                    debug!(token, "dropping stale diagnostics response");
                    return self.last();
                }
                snapshot.ingest();
                *self.cached.lock().expect("diagnostics lock poisoned") = Some(snapshot.clone());
                let _ = self.publisher.send(Some(snapshot.clone()));
                Some(snapshot)
            }
            Err(err) => {
                warn!(error = %err, "diagnostics refresh failed, keeping last snapshot");
                self.last()
            }
        }
    }

    /// Last known snapshot, if any.
    pub fn last(&self) -> Option<StartupDiagnostics> {
        self.cached.lock().expect("diagnostics lock poisoned").clone()
    }

    /// Observe snapshot replacements, e.g. to pop the remediation wizard
    /// whenever a refresh comes back not ready.
    pub fn watch(&self) -> watch::Receiver<Option<StartupDiagnostics>> {
        self.publisher.subscribe()
    }

    /// Whether an auto-fix for the given item is in flight. Views disable
    /// the trigger while set; the contract is cooperative, not a lock.
    pub fn is_fixing(&self, id: &str) -> bool {
        self.fixing.lock().expect("diagnostics lock poisoned").contains(id)
    }

    fn begin_fix(&self, id: &str) -> FixingGuard<'_> {
        self.fixing
            .lock()
            .expect("diagnostics lock poisoned")
            .insert(id.to_string());
        FixingGuard {
            controller: self,
            id: id.to_string(),
        }
    }

    /// Start the local model runtime, then re-check.
    pub async fn start_service(&self) {
        let _fixing = self.begin_fix("ollama");
        match self.remediation.start_service().await {
            Ok(status) => info!(%status, "local runtime start requested"),
            Err(err) => warn!(error = %err, "failed to start local runtime"),
        }
        self.refresh().await;
    }

    /// Stop the local model runtime, then re-check.
    pub async fn stop_service(&self) {
        let _fixing = self.begin_fix("ollama");
        match self.remediation.stop_service().await {
            Ok(status) => info!(%status, "local runtime stop requested"),
            Err(err) => warn!(error = %err, "failed to stop local runtime"),
        }
        self.refresh().await;
    }

    /// Pick a vault directory and persist it. A dismissed dialog is a silent
    /// no-op; any failure still ends in a re-check so the UI cannot get
    /// stuck on a stale blocked state.
    pub async fn browse_vault_path(&self) {
        let _fixing = self.begin_fix("vault_path");
        match self.remediation.select_vault_path().await {
            Ok(path) if path.trim().is_empty() => return,
            Ok(path) => {
                if let Err(err) = self.remediation.update_vault_path(path.trim()).await {
                    warn!(error = %err, "failed to update vault path");
                }
            }
            Err(err) => warn!(error = %err, "vault path selection failed"),
        }
        self.refresh().await;
    }

    /// Pick a transcription model file and persist it.
    pub async fn browse_model_path(&self) {
        let _fixing = self.begin_fix("model_path");
        match self.remediation.select_model_path().await {
            Ok(path) if path.trim().is_empty() => return,
            Ok(path) => {
                if let Err(err) = self.remediation.update_model_path(path.trim()).await {
                    warn!(error = %err, "failed to update model path");
                }
            }
            Err(err) => warn!(error = %err, "model path selection failed"),
        }
        self.refresh().await;
    }

    /// Open the model library page in the default browser. Informational
    /// only; downloading a model cannot be observed, so no re-check.
    pub async fn open_model_library(&self) {
        let _fixing = self.begin_fix("ollama_models");
        if let Err(err) = self.remediation.open_external_url(MODEL_LIBRARY_URL).await {
            warn!(error = %err, "failed to open model library");
        }
    }

    /// Store an API key from explicit input or, when absent, the clipboard.
    /// Returns the stored key ("" when nothing was stored); masking for
    /// display is the caller's concern via [`crate::model::mask_secret`].
    pub async fn set_api_key(&self, input: Option<String>) -> String {
        let _fixing = self.begin_fix("openai_key");

        let key = match input {
            Some(key) => key,
            None => match self.remediation.read_clipboard_text().await {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "failed to read clipboard");
                    self.refresh().await;
                    return String::new();
                }
            },
        };

        let key = key.trim().to_string();
        if key.is_empty() {
            return String::new();
        }

        if let Err(err) = self.remediation.update_api_key(&key).await {
            warn!(error = %err, "failed to update API key");
            self.refresh().await;
            return String::new();
        }

        self.refresh().await;
        key
    }
}

/// Clears the per-item fixing flag on every exit path, including panics.
struct FixingGuard<'a> {
    controller: &'a DiagnosticsController,
    id: String,
}

impl Drop for FixingGuard<'_> {
    fn drop(&mut self) {
        self.controller
            .fixing
            .lock()
            .expect("diagnostics lock poisoned")
            .remove(&self.id);
    }
}
