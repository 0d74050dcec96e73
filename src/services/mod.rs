//! Board engine and its services.

pub mod board;
pub mod counts;
pub mod event_broadcaster;
pub mod filter;
pub mod group_summary;
pub mod grouping;
pub mod merge;
pub mod normalizer;
pub mod notifier;
pub mod poller;
pub mod runnable;
pub mod selection;
pub mod store;
pub mod upstream;
pub mod visibility;

pub use board::{Board, BoardSettings, PollOutcome};
pub use event_broadcaster::EventBroadcaster;
pub use filter::{AcceptAll, FilterAction, JobFilter, UrlFilterModel};
pub use group_summary::CoalesceRule;
pub use notifier::Notifier;
pub use poller::{PollerConfig, start_poll_task};
pub use selection::{ClickAction, ClickOutcome, Direction, SelectionChange};
pub use store::BoardState;
pub use upstream::{HttpPushSource, PushSource, RunnableQuery};
