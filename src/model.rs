use serde::{Deserialize, Serialize};

/// Lifecycle of a single task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Read-only view of the runner's accumulated state, cloned out for UI layers.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    pub log_lines: Vec<String>,
    pub analysis_text: String,
    pub progress: u8,
    pub result_message: String,
}

impl Default for TaskSnapshot {
    fn default() -> Self {
        Self {
            status: TaskStatus::Idle,
            log_lines: Vec::new(),
            analysis_text: String::new(),
            progress: 0,
            result_message: String::new(),
        }
    }
}

/// Health of one checked precondition. Statuses the backend may grow later
/// deserialize as `Unknown` and count as non-ok.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Missing,
    Misconfigured,
    #[serde(other)]
    Unknown,
}

impl ItemStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, ItemStatus::Ok)
    }
}

/// Remediation capabilities per item, resolved once from the item id when a
/// snapshot is ingested instead of branching on id strings at every render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemKind {
    VaultPath,
    ModelPath,
    Ollama,
    OllamaModels,
    OpenAiKey,
    #[default]
    Other,
}

impl ItemKind {
    pub fn from_id(id: &str) -> Self {
        match id {
            "vault_path" => ItemKind::VaultPath,
            "model_path" => ItemKind::ModelPath,
            "ollama" => ItemKind::Ollama,
            "ollama_models" => ItemKind::OllamaModels,
            "openai_key" => ItemKind::OpenAiKey,
            _ => ItemKind::Other,
        }
    }

    /// Start/stop the local runtime service.
    pub fn has_toggle_action(self) -> bool {
        matches!(self, ItemKind::Ollama)
    }

    /// Pick a path with a native dialog, then persist it.
    pub fn has_browse_action(self) -> bool {
        matches!(self, ItemKind::VaultPath | ItemKind::ModelPath)
    }

    /// Accept a secret from clipboard or direct input.
    pub fn has_paste_action(self) -> bool {
        matches!(self, ItemKind::OpenAiKey)
    }

    /// Open an external page instead of fixing locally.
    pub fn has_open_link_action(self) -> bool {
        matches!(self, ItemKind::OllamaModels)
    }
}

/// One checked environment dependency, as reported by the backend.
///
/// Field names follow the backend's JSON tags so port implementations can
/// deserialize IPC payloads directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    pub id: String,
    pub name: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub required_for: Vec<String>,
    #[serde(default)]
    pub detected_path: String,
    #[serde(default)]
    pub fix_suggestion: String,
    #[serde(default)]
    pub fix_commands: Vec<String>,
    #[serde(default)]
    pub can_auto_fix: bool,
    #[serde(default)]
    pub is_blocker: bool,
    #[serde(skip)]
    pub kind: ItemKind,
}

impl DiagnosticItem {
    pub fn blocks(&self) -> bool {
        self.is_blocker && !self.status.is_ok()
    }
}

/// A whole-object readiness report. Never patched item-by-item; the
/// controller always replaces the entire snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupDiagnostics {
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub items: Vec<DiagnosticItem>,
}

impl StartupDiagnostics {
    /// Resolve item kinds and re-derive `blockers`/`ready` from the items.
    ///
    /// The backend sends both, but `ready == blockers.is_empty()` is an
    /// invariant we re-establish locally rather than trust over the wire.
    pub fn ingest(&mut self) {
        for item in &mut self.items {
            item.kind = ItemKind::from_id(&item.id);
        }
        self.recompute();
    }

    pub fn recompute(&mut self) {
        self.blockers = self
            .items
            .iter()
            .filter(|item| item.blocks())
            .map(|item| item.id.clone())
            .collect();
        self.ready = self.blockers.is_empty();
    }

    pub fn item(&self, id: &str) -> Option<&DiagnosticItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Whether a fix command should get an "open" affordance rather than "copy".
pub fn is_openable_command(cmd: &str) -> bool {
    cmd.starts_with("http://") || cmd.starts_with("https://")
}

/// Mask a secret for display: first 4 and last 4 characters kept, interior
/// replaced with `*`. Values of 8 characters or fewer are shown verbatim
/// (too short to be a real key). Display-only; never stored.
pub fn mask_secret(value: &str) -> String {
    let text = value.trim();
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 8 {
        return text.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}
