//! Cross-context message protocol.
//!
//! The background coordinator and each page agent share nothing; they talk
//! only through these messages. A request may carry a one-shot reply
//! channel; without one it is fire-and-forget.

use tokio::sync::{mpsc, oneshot};

use crate::error::MessageError;
use crate::page::extract::ExtractedContext;
use crate::page::PageEvent;

pub type TabId = u32;

/// Background → page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Readiness probe.
    Ping,
    ExtractContext { link_url: String },
    ShowLoading,
    ShowSummary { text: String },
    ShowError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageReply {
    Ready,
    Context(ExtractedContext),
    Received,
}

#[derive(Debug)]
pub struct Envelope {
    pub request: PageRequest,
    pub reply: Option<oneshot::Sender<PageReply>>,
}

impl Envelope {
    pub fn post(request: PageRequest) -> Self {
        Self {
            request,
            reply: None,
        }
    }

    pub fn with_reply(request: PageRequest) -> (Self, oneshot::Receiver<PageReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                request,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// Answer the sender, if it is still waiting.
    pub fn respond(self, reply: PageReply) {
        if let Some(tx) = self.reply {
            let _ = tx.send(reply);
        }
    }
}

/// Everything a page agent's inbox can receive.
#[derive(Debug)]
pub enum Inbound {
    Message(Envelope),
    Event(PageEvent),
}

/// Page (or host UI) → background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundMessage {
    HoverSummarize {
        url: String,
        tab: TabId,
    },
    ContextMenuClicked {
        link_url: Option<String>,
        selection_text: Option<String>,
        tab: TabId,
    },
}

/// Sending half of a page agent's inbox.
#[derive(Clone, Debug)]
pub struct PageHandle {
    tab: TabId,
    tx: mpsc::Sender<Inbound>,
}

impl PageHandle {
    pub fn new(tab: TabId, tx: mpsc::Sender<Inbound>) -> Self {
        Self { tab, tx }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn deliver(&self, envelope: Envelope) -> Result<(), MessageError> {
        self.tx
            .send(Inbound::Message(envelope))
            .await
            .map_err(|_| MessageError::NoReceiver(self.tab))
    }

    pub async fn dispatch(&self, event: PageEvent) -> Result<(), MessageError> {
        self.tx
            .send(Inbound::Event(event))
            .await
            .map_err(|_| MessageError::NoReceiver(self.tab))
    }
}
