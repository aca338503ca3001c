//! The browser side the background coordinator drives: open tabs, message
//! delivery into them, and page-agent injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use url::Url;

use crate::dom::DomTree;
use crate::engine::message::{Envelope, PageHandle, PageReply, PageRequest, TabId};
use crate::error::{MessageError, Result, UsherError};
use crate::page::{AgentDeps, PageAgent, PageEvent};
use crate::render::placement::Viewport;

#[async_trait]
pub trait PageHost: Send + Sync {
    /// Hand `envelope` to the tab's page agent.
    async fn deliver(&self, tab: TabId, envelope: Envelope) -> std::result::Result<(), MessageError>;

    /// Start a page agent in `tab`.
    async fn inject(&self, tab: TabId) -> Result<()>;

    /// Fire-and-forget message.
    async fn post(&self, tab: TabId, request: PageRequest) -> std::result::Result<(), MessageError> {
        self.deliver(tab, Envelope::post(request)).await
    }

    /// Request/response with a bounded wait. A page torn down mid-request
    /// surfaces as `ReplyDropped` or `Timeout`, never as a hang.
    async fn request(
        &self,
        tab: TabId,
        request: PageRequest,
        timeout: Duration,
    ) -> std::result::Result<PageReply, MessageError> {
        let (envelope, rx) = Envelope::with_reply(request);
        self.deliver(tab, envelope).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(MessageError::ReplyDropped),
            Err(_) => Err(MessageError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

struct Tab {
    document: Arc<DomTree>,
    viewport: Viewport,
    agent: Option<PageHandle>,
}

/// Registry of open tabs. Injection spawns a `PageAgent` for the tab's
/// document; tabs on non-web schemes refuse injection.
pub struct Tabs {
    tabs: RwLock<HashMap<TabId, Tab>>,
    next_id: AtomicU32,
    deps: AgentDeps,
}

impl Tabs {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            tabs: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            deps,
        }
    }

    /// Open a tab without a page agent; the first request will inject one.
    pub fn open(&self, document: DomTree, viewport: Viewport) -> TabId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.tabs.write().insert(
            id,
            Tab {
                document: Arc::new(document),
                viewport,
                agent: None,
            },
        );
        id
    }

    /// Open a tab whose page agent starts with the document, as when the
    /// agent is declared to load on every page.
    pub async fn open_with_agent(&self, document: DomTree, viewport: Viewport) -> Result<TabId> {
        let id = self.open(document, viewport);
        self.inject(id).await?;
        Ok(id)
    }

    pub fn close(&self, tab: TabId) {
        // Dropping the handle closes the inbox and stops the agent.
        self.tabs.write().remove(&tab);
    }

    pub fn agent(&self, tab: TabId) -> Option<PageHandle> {
        self.tabs.read().get(&tab).and_then(|t| t.agent.clone())
    }

    /// Forward a host event (pointer, click, geometry) to the tab's agent.
    pub async fn dispatch(&self, tab: TabId, event: PageEvent) -> std::result::Result<(), MessageError> {
        if let PageEvent::Viewport(viewport) = &event {
            if let Some(t) = self.tabs.write().get_mut(&tab) {
                t.viewport = *viewport;
            }
        }
        let handle = self.agent(tab).ok_or(MessageError::NoReceiver(tab))?;
        handle.dispatch(event).await
    }
}

#[async_trait]
impl PageHost for Tabs {
    async fn deliver(&self, tab: TabId, envelope: Envelope) -> std::result::Result<(), MessageError> {
        let handle = {
            let tabs = self.tabs.read();
            let t = tabs.get(&tab).ok_or(MessageError::TabClosed(tab))?;
            t.agent.clone().ok_or(MessageError::NoReceiver(tab))?
        };
        handle.deliver(envelope).await
    }

    async fn inject(&self, tab: TabId) -> Result<()> {
        let mut tabs = self.tabs.write();
        let t = tabs
            .get_mut(&tab)
            .ok_or_else(|| UsherError::Injection(format!("tab {} is closed", tab)))?;

        let scheme = Url::parse(&t.document.url)
            .map(|u| u.scheme().to_string())
            .unwrap_or_default();
        if scheme != "http" && scheme != "https" {
            return Err(UsherError::Injection(format!(
                "cannot access contents of {}",
                t.document.url
            )));
        }

        if t.agent.as_ref().is_some_and(|a| !a.is_closed()) {
            return Ok(());
        }

        log::info!("Injecting page agent into tab {}", tab);
        t.agent = Some(PageAgent::spawn(
            tab,
            t.document.clone(),
            t.viewport,
            self.deps.clone(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UsherConfig;
    use crate::dom::parser::parse_html;
    use crate::page::storage::MemoryLocalStorage;
    use tokio::sync::mpsc;

    fn tabs() -> Tabs {
        let (background, _bg_rx) = mpsc::channel(8);
        let (surface, _surface_rx) = mpsc::unbounded_channel();
        Tabs::new(AgentDeps {
            background,
            surface,
            storage: Arc::new(MemoryLocalStorage::new()),
            config: Arc::new(UsherConfig::default()),
        })
    }

    fn doc(url: &str) -> DomTree {
        parse_html("<html><body><p><a href=\"/a\">a</a></p></body></html>", url)
    }

    #[tokio::test]
    async fn uninjected_tab_has_no_receiver() {
        let tabs = tabs();
        let id = tabs.open(doc("https://example.com/x"), Viewport::default());
        let err = tabs
            .request(id, PageRequest::Ping, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, MessageError::NoReceiver(id));
    }

    #[tokio::test]
    async fn injected_tab_answers_ping() {
        let tabs = tabs();
        let id = tabs.open(doc("https://example.com/x"), Viewport::default());
        tabs.inject(id).await.unwrap();
        let reply = tabs
            .request(id, PageRequest::Ping, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(reply, PageReply::Ready);
    }

    #[tokio::test]
    async fn restricted_and_closed_tabs_refuse_injection() {
        let tabs = tabs();
        let id = tabs.open(doc("chrome://settings/"), Viewport::default());
        assert_eq!(tabs.inject(id).await.unwrap_err().phase(), "inject");

        let id = tabs.open(doc("https://example.com/x"), Viewport::default());
        tabs.close(id);
        assert!(tabs.inject(id).await.is_err());
        assert_eq!(
            tabs.post(id, PageRequest::ShowError).await,
            Err(MessageError::TabClosed(id))
        );
    }
}
