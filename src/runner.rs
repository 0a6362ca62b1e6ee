//! Task run lifecycle.
//!
//! Owns the state of at most one active task: submission, live event
//! ingestion, best-effort cancellation, and terminal reporting. UI layers
//! read cloned snapshots and never mutate.

use crate::bus::{EventBus, TaskEvent};
use crate::model::{TaskSnapshot, TaskStatus};
use crate::ports::TaskBackend;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

struct RunnerState {
    snapshot: TaskSnapshot,
    // Bumped on every submission; a completion whose generation no longer
    // matches belongs to a superseded run and is dropped.
    generation: u64,
}

/// Client-side coordinator for the task pipeline.
///
/// Subscribes to the event bus for its whole lifetime; `shutdown` (or drop)
/// releases the subscription, after which no further mutation occurs.
pub struct TaskRunner {
    backend: Arc<dyn TaskBackend>,
    state: Arc<Mutex<RunnerState>>,
    pump: Option<JoinHandle<()>>,
}

impl TaskRunner {
    pub fn new(backend: Arc<dyn TaskBackend>, bus: &EventBus) -> Self {
        let state = Arc::new(Mutex::new(RunnerState {
            snapshot: TaskSnapshot::default(),
            generation: 0,
        }));

        let mut rx = bus.subscribe();
        let pump_state = state.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                apply_event(&pump_state, event);
            }
        });

        Self {
            backend,
            state,
            pump: Some(pump),
        }
    }

    /// Current state, cloned out for rendering.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.lock().expect("runner lock poisoned").snapshot.clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().expect("runner lock poisoned").snapshot.status
    }

    /// Start a new run. Returns false without side effects when the URL is
    /// empty or a run is already in flight; the check and the flip to
    /// `Running` happen under one lock, so a rapid double invocation cannot
    /// start two concurrent runs.
    pub fn run_task(&self, url: &str, download_video: bool) -> bool {
        let url = url.trim().to_string();
        if url.is_empty() {
            return false;
        }
        let audio_only = !download_video;

        let generation;
        {
            let mut st = self.state.lock().expect("runner lock poisoned");
            if st.snapshot.status == TaskStatus::Running {
                return false;
            }
            st.generation += 1;
            generation = st.generation;
            st.snapshot.status = TaskStatus::Running;
            st.snapshot.log_lines.clear();
            st.snapshot.analysis_text.clear();
            st.snapshot.progress = 0;
            st.snapshot.result_message = "Processing...".to_string();
            push_log(
                &mut st.snapshot,
                &format!("Processing URL: {url} (AudioOnly: {audio_only})"),
            );
        }

        let backend = self.backend.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let result = backend.submit(&url, audio_only).await;

            let mut st = state.lock().expect("runner lock poisoned");
            if st.generation != generation || st.snapshot.status != TaskStatus::Running {
                // Cancelled or superseded while the call was in flight.
                debug!(generation, "dropping completion of a stale run");
                return;
            }
            match result {
                Ok(response) => {
                    push_log(&mut st.snapshot, &format!("Backend Response: {response}"));
                    st.snapshot.status = TaskStatus::Completed;
                    st.snapshot.result_message = "Task completed".to_string();
                }
                Err(err) => {
                    push_log(&mut st.snapshot, &format!("Error: {err:#}"));
                    st.snapshot.status = TaskStatus::Failed;
                    st.snapshot.result_message = "Task failed".to_string();
                }
            }
            // The bar is a per-run gauge, not a history.
            st.snapshot.progress = 0;
        });

        true
    }

    /// Request cancellation of the active run. Best-effort: the run is marked
    /// cancelled once the request itself is accepted, independent of whether
    /// the backend actually stops. A failed request leaves the run untouched.
    pub async fn cancel(&self) {
        {
            let st = self.state.lock().expect("runner lock poisoned");
            if st.snapshot.status != TaskStatus::Running {
                return;
            }
        }

        match self.backend.cancel().await {
            Ok(()) => {
                let mut st = self.state.lock().expect("runner lock poisoned");
                // The run may have reached a terminal state while the cancel
                // request was in flight; terminal transitions happen once.
                if st.snapshot.status != TaskStatus::Running {
                    return;
                }
                push_log(&mut st.snapshot, "User requested cancellation...");
                st.snapshot.status = TaskStatus::Cancelled;
                st.snapshot.result_message = "Cancelled".to_string();
                st.snapshot.progress = 0;
            }
            Err(err) => {
                let mut st = self.state.lock().expect("runner lock poisoned");
                push_log(&mut st.snapshot, &format!("Failed to cancel: {err:#}"));
            }
        }
    }

    /// Release the event subscription. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn apply_event(state: &Mutex<RunnerState>, event: TaskEvent) {
    let mut st = state.lock().expect("runner lock poisoned");
    match event {
        TaskEvent::Log(msg) => push_log(&mut st.snapshot, &msg),
        TaskEvent::Analysis(chunk) => st.snapshot.analysis_text.push_str(&chunk),
        TaskEvent::Progress(p) => {
            if (0..=100).contains(&p) {
                st.snapshot.progress = p as u8;
            }
        }
    }
}

fn push_log(snapshot: &mut TaskSnapshot, msg: &str) {
    snapshot.log_lines.push(format!("[{}] {msg}", timestamp_hms()));
}

/// Local wall-clock `HH:MM:SS`, falling back to UTC when the local offset
/// cannot be determined (e.g. in a multi-threaded test runner).
fn timestamp_hms() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let format = time::macros::format_description!("[hour]:[minute]:[second]");
    now.format(&format).unwrap_or_else(|_| "00:00:00".to_string())
}
