//! Hover-dwell tracking.
//!
//! At most one session is live. A new pointer-enter cancels the previous
//! timer rather than queueing behind it, and leaving the link cancels it too.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dom::NodePath;

struct HoverSession {
    id: u64,
    link: NodePath,
    timer: JoinHandle<()>,
}

pub struct HoverTracker {
    dwell: Duration,
    expired: mpsc::UnboundedSender<u64>,
    current: Option<HoverSession>,
    next_id: u64,
}

impl HoverTracker {
    /// Expired session ids are sent on `expired` for the owner to `fire`.
    pub fn new(dwell: Duration, expired: mpsc::UnboundedSender<u64>) -> Self {
        Self {
            dwell,
            expired,
            current: None,
            next_id: 0,
        }
    }

    pub fn enter(&mut self, link: NodePath) -> u64 {
        self.cancel();
        self.next_id += 1;
        let id = self.next_id;

        let dwell = self.dwell;
        let expired = self.expired.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            let _ = expired.send(id);
        });

        self.current = Some(HoverSession { id, link, timer });
        id
    }

    /// Pointer left `link`; cancels the session only if it is the current one.
    pub fn leave(&mut self, link: &NodePath) {
        if self.current.as_ref().is_some_and(|s| &s.link == link) {
            self.cancel();
        }
    }

    pub fn cancel(&mut self) {
        if let Some(session) = self.current.take() {
            session.timer.abort();
        }
    }

    /// Consume an expired session. Stale ids (superseded or cancelled
    /// sessions whose message was already in flight) yield `None`.
    pub fn fire(&mut self, id: u64) -> Option<NodePath> {
        match &self.current {
            Some(session) if session.id == id => self.current.take().map(|s| s.link),
            _ => None,
        }
    }

    pub fn current_link(&self) -> Option<&NodePath> {
        self.current.as_ref().map(|s| &s.link)
    }
}

impl Drop for HoverTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}
