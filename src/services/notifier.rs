//! Bounded log of user notifications, mirrored to live subscribers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::event_broadcaster::EventBroadcaster;
use crate::models::{BoardEvent, Notification, Severity};

/// Notifications kept for late-joining clients.
const MAX_NOTIFICATIONS: usize = 100;

#[derive(Clone)]
pub struct Notifier {
    log: Arc<Mutex<VecDeque<Notification>>>,
    broadcaster: EventBroadcaster,
}

impl Notifier {
    pub fn new(broadcaster: EventBroadcaster) -> Self {
        Self {
            log: Arc::new(Mutex::new(VecDeque::new())),
            broadcaster,
        }
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        self.push(Notification::new(message, severity));
    }

    pub fn push(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => info!(message = %notification.message, "Notification"),
            Severity::Warning | Severity::Danger => {
                warn!(message = %notification.message, severity = ?notification.severity, "Notification")
            }
        }

        // A poisoned log only loses history; keep broadcasting.
        if let Ok(mut log) = self.log.lock() {
            if log.len() == MAX_NOTIFICATIONS {
                log.pop_front();
            }
            log.push_back(notification.clone());
        }
        self.broadcaster.send(BoardEvent::Notification(notification));
    }

    /// Notifications, oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.log
            .lock()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every non-sticky notification.
    pub fn clear_transient(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.retain(|n| n.sticky);
        }
    }
}
