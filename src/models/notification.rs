//! User-facing notifications raised by the board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    /// Sticky notifications stay until dismissed
    pub sticky: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            sticky: false,
            created_at: Utc::now(),
        }
    }

    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }
}
