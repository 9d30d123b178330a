// Save progress payload

use std::path::PathBuf;

use serde::Serialize;

/// Reported once per finished image, and once more if a save is cancelled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgress {
    pub phase: String,
    pub current: u64,
    pub total: u64,
    pub percent: f64,
    pub path: Option<PathBuf>,
    pub is_cancelled: bool,
    pub is_error: bool,
    pub error_message: Option<String>,
}

impl SaveProgress {
    pub fn new(phase: impl Into<String>, current: u64, total: u64) -> Self {
        let total_safe = total.max(1);
        let percent = (current as f64 / total_safe as f64) * 100.0;
        Self {
            phase: phase.into(),
            current,
            total,
            percent: percent.min(100.0),
            path: None,
            is_cancelled: false,
            is_error: false,
            error_message: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.is_cancelled = true;
        self
    }

    pub fn error(mut self, msg: impl Into<String>) -> Self {
        self.is_error = true;
        self.error_message = Some(msg.into());
        self
    }
}
