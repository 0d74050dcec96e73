//! WebSocket event types for live board updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::counts::UnclassifiedCounts;
use super::notification::Notification;

/// Event sent to connected clients whenever the board changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum BoardEvent {
    /// New pushes entered the collection.
    PushesAdded(PushesAddedPayload),
    /// A job batch was merged into a push.
    JobsMerged(JobsMergedPayload),
    /// Unclassified failure counts were recomputed.
    CountsUpdated(UnclassifiedCounts),
    /// The confirmed selection changed.
    SelectionChanged(SelectionChangedPayload),
    /// The push range was replaced; clients should refetch the board.
    RangeReset(RangeResetPayload),
    /// A notification was raised.
    Notification(Notification),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushesAddedPayload {
    pub push_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsMergedPayload {
    pub push_id: i64,
    pub added: usize,
    pub replaced: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionChangedPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeResetPayload {
    pub query: String,
}

/// Wrapper that includes timestamp with every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardEventMessage {
    #[serde(flatten)]
    pub event: BoardEvent,
    pub timestamp: DateTime<Utc>,
}

impl BoardEventMessage {
    /// Create a new event message with the current timestamp.
    pub fn new(event: BoardEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

impl BoardEvent {
    pub fn pushes_added(push_ids: Vec<i64>) -> Self {
        BoardEvent::PushesAdded(PushesAddedPayload { push_ids })
    }

    pub fn jobs_merged(push_id: i64, added: usize, replaced: usize) -> Self {
        BoardEvent::JobsMerged(JobsMergedPayload {
            push_id,
            added,
            replaced,
        })
    }

    pub fn selection_changed(job_id: Option<i64>) -> Self {
        BoardEvent::SelectionChanged(SelectionChangedPayload { job_id })
    }

    pub fn range_reset(query: impl Into<String>) -> Self {
        BoardEvent::RangeReset(RangeResetPayload {
            query: query.into(),
        })
    }
}
