//! Domain models for the push board.

pub mod board;
pub mod counts;
pub mod job;
pub mod notification;
pub mod platform;
pub mod push;
pub mod url_state;
pub mod ws_event;

// Re-export commonly used types
pub use board::{BoardSnapshot, GroupCount, GroupView, PlatformView, PushView};
pub use counts::{JobCounts, UnclassifiedCounts};
pub use job::{
    FAILURE_RESULTS, FIXED_BY_COMMIT_ID, Job, JobState, RUNNABLE, SUPERSEDED, UNCLASSIFIED_IDS,
};
pub use notification::{Notification, Severity};
pub use platform::{Group, Platform};
pub use push::{Push, PushFetchParams, PushPage, PushRange, Revision, RevisionTip};
pub use url_state::UrlState;
pub use ws_event::{BoardEvent, BoardEventMessage};
