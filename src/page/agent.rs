//! Per-tab page agent.
//!
//! A single task per document; all page state is owned here and only
//! reachable through the agent's inbox. Classification runs once at startup
//! and is never recomputed for the life of the page.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{UsherConfig, ERROR_TEXT, LOADING_TEXT};
use crate::dom::{DomTree, NodePath};
use crate::engine::message::{
    BackgroundMessage, Envelope, Inbound, PageHandle, PageReply, PageRequest, TabId,
};
use crate::page::classify::{toggle_visible, HoverPreference};
use crate::page::extract::extract_link_context;
use crate::page::hover::HoverTracker;
use crate::page::storage::LocalStorage;
use crate::page::PageEvent;
use crate::render::layout::{compute_layout, measure_popup_height, LayoutNode};
use crate::render::overlay::Overlay;
use crate::render::placement::{Rect, Viewport};
use crate::render::{SurfaceEvent, SurfaceUpdate};

const INBOX_CAPACITY: usize = 64;

/// What a page agent needs from the outside world.
#[derive(Clone)]
pub struct AgentDeps {
    pub background: mpsc::Sender<BackgroundMessage>,
    pub surface: mpsc::UnboundedSender<SurfaceUpdate>,
    pub storage: Arc<dyn LocalStorage>,
    pub config: Arc<UsherConfig>,
}

pub struct PageAgent {
    tab: TabId,
    doc: Arc<DomTree>,
    layout: LayoutNode,
    viewport: Viewport,
    /// Link last right-clicked or dwelled on; anchors popups and extraction.
    last_interacted: Option<NodePath>,
    preference: HoverPreference,
    hover: HoverTracker,
    overlay: Overlay,
    deps: AgentDeps,
}

impl PageAgent {
    pub fn new(
        tab: TabId,
        doc: Arc<DomTree>,
        viewport: Viewport,
        deps: AgentDeps,
    ) -> (Self, mpsc::UnboundedReceiver<u64>) {
        let (dwell_tx, dwell_rx) = mpsc::unbounded_channel();
        let cfg = &deps.config;
        let agent = Self {
            tab,
            layout: compute_layout(&doc.root, viewport.width),
            preference: HoverPreference::load(&doc, deps.storage.clone()),
            hover: HoverTracker::new(Duration::from_millis(cfg.hover.dwell_ms), dwell_tx),
            overlay: Overlay::new(cfg.hover.clone(), cfg.placement),
            doc,
            viewport,
            last_interacted: None,
            deps,
        };
        (agent, dwell_rx)
    }

    /// Start the agent on its own task and return its inbox.
    pub fn spawn(tab: TabId, doc: Arc<DomTree>, viewport: Viewport, deps: AgentDeps) -> PageHandle {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let (agent, dwell_rx) = Self::new(tab, doc, viewport, deps);
        tokio::spawn(agent.run(rx, dwell_rx));
        PageHandle::new(tab, tx)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Inbound>, mut dwell: mpsc::UnboundedReceiver<u64>) {
        self.announce();
        loop {
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(Inbound::Message(envelope)) => self.handle_message(envelope),
                    Some(Inbound::Event(event)) => self.handle_event(event),
                    None => break,
                },
                Some(session) = dwell.recv() => self.on_dwell(session).await,
            }
        }
        log::debug!("Page agent for tab {} stopped", self.tab);
    }

    fn announce(&self) {
        let c = self.preference.classification();
        log::info!(
            "Tab {}: auto-detected={}, override={:?}, hover enabled={}",
            self.tab,
            c.auto_detected,
            c.override_enabled,
            c.enabled()
        );
        if toggle_visible(&self.doc.path()) {
            self.emit_toggle_state();
        }
    }

    pub fn handle_message(&mut self, envelope: Envelope) {
        let reply = match &envelope.request {
            PageRequest::Ping => PageReply::Ready,
            PageRequest::ExtractContext { link_url } => PageReply::Context(extract_link_context(
                &self.doc,
                self.last_interacted.as_ref(),
                link_url,
            )),
            PageRequest::ShowLoading => {
                self.render(LOADING_TEXT);
                PageReply::Received
            }
            PageRequest::ShowSummary { text } => {
                self.render(text);
                PageReply::Received
            }
            PageRequest::ShowError => {
                self.render(ERROR_TEXT);
                PageReply::Received
            }
        };
        envelope.respond(reply);
    }

    pub fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::PointerEnter { target } => {
                let Some(link) = self.closest_link(&target) else {
                    return;
                };
                // Right-click still works everywhere
                if !self.preference.enabled() {
                    return;
                }
                self.hover.enter(link);
            }
            PageEvent::PointerLeave { target } => {
                if let Some(link) = self.closest_link(&target) {
                    self.hover.leave(&link);
                }
            }
            PageEvent::ContextMenu { target } => {
                if let Some(link) = self.closest_link(&target) {
                    self.last_interacted = Some(link);
                }
            }
            PageEvent::ToggleClicked => {
                let enabled = self.preference.toggle();
                self.emit_toggle_state();
                let text = if enabled {
                    "✓ Hover summaries enabled for this site"
                } else {
                    "✗ Hover summaries disabled for this site"
                };
                self.emit(SurfaceEvent::Toast { text: text.into() });
            }
            PageEvent::Click(target) => {
                if let Some(event) = self.overlay.click(&target) {
                    self.emit(event);
                }
            }
            PageEvent::ClosePopup => {
                if let Some(event) = self.overlay.close() {
                    self.emit(event);
                }
            }
            PageEvent::PopupMeasured { height } => self.settle(height),
            PageEvent::Viewport(viewport) => {
                if viewport.width != self.viewport.width {
                    self.layout = compute_layout(&self.doc.root, viewport.width);
                }
                self.viewport = viewport;
            }
        }
    }

    async fn on_dwell(&mut self, session: u64) {
        let Some(link) = self.hover.fire(session) else {
            return;
        };
        let Some(url) = self.doc.link_address(&link) else {
            return;
        };
        self.last_interacted = Some(link);
        log::debug!("Tab {}: hover dwell on {}", self.tab, url);
        let msg = BackgroundMessage::HoverSummarize { url, tab: self.tab };
        if self.deps.background.send(msg).await.is_err() {
            log::warn!("Background context is gone; hover trigger dropped");
        }
    }

    /// Show `message` in the popup, then run the second placement pass with
    /// the height it actually renders at.
    fn render(&mut self, message: &str) {
        let anchor = self
            .last_interacted
            .clone()
            .and_then(|path| self.link_rect(&path).map(|rect| (path, rect)));
        for event in self.overlay.show(message, anchor, &self.viewport) {
            self.emit(event);
        }

        let measured = measure_popup_height(message, self.deps.config.placement.box_width);
        self.settle(measured);
    }

    fn settle(&mut self, height: f32) {
        let rect = self
            .overlay
            .popup()
            .and_then(|p| p.anchor.clone())
            .and_then(|path| self.link_rect(&path));
        if let Some(event) = self.overlay.settle(height, rect, &self.viewport) {
            self.emit(event);
        }
    }

    /// Nearest anchor with an href at or above `target`.
    fn closest_link(&self, target: &NodePath) -> Option<NodePath> {
        if self.doc.link_address(target).is_some() {
            return Some(target.clone());
        }
        self.doc
            .root
            .closest_ancestor(target, &["a"])
            .filter(|path| self.doc.link_address(path).is_some())
    }

    fn link_rect(&self, path: &NodePath) -> Option<Rect> {
        self.layout
            .node_at(path)
            .map(|node| node.bounds.to_viewport(&self.viewport))
    }

    fn emit_toggle_state(&self) {
        let c = self.preference.classification();
        self.emit(SurfaceEvent::ToggleUpdated {
            enabled: c.enabled(),
            override_active: c.override_enabled.is_some(),
        });
    }

    fn emit(&self, event: SurfaceEvent) {
        let _ = self.deps.surface.send(SurfaceUpdate { tab: self.tab, event });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parser::parse_html;
    use crate::page::storage::MemoryLocalStorage;
    use crate::render::placement::Direction;

    const ARTICLE: &str = r#"<html><head><title>Post</title></head><body>
        <article><p>Background first. See <a href="/ref">the reference</a> for more. It helps.</p></article>
    </body></html>"#;

    struct Harness {
        handle: PageHandle,
        surface: mpsc::UnboundedReceiver<SurfaceUpdate>,
        background: mpsc::Receiver<BackgroundMessage>,
        link: NodePath,
    }

    fn start(html: &str, url: &str) -> Harness {
        let doc = Arc::new(parse_html(html, url));
        let link = doc.links()[0].0.clone();
        let (bg_tx, background) = mpsc::channel(8);
        let (surface_tx, surface) = mpsc::unbounded_channel();
        let deps = AgentDeps {
            background: bg_tx,
            surface: surface_tx,
            storage: Arc::new(MemoryLocalStorage::new()),
            config: Arc::new(UsherConfig::default()),
        };
        let handle = PageAgent::spawn(1, doc, Viewport::new(1280.0, 800.0), deps);
        Harness { handle, surface, background, link }
    }

    async fn ask(handle: &PageHandle, request: PageRequest) -> PageReply {
        let (env, rx) = Envelope::with_reply(request);
        handle.deliver(env).await.unwrap();
        rx.await.unwrap()
    }

    async fn next_event(h: &mut Harness) -> SurfaceEvent {
        h.surface.recv().await.unwrap().event
    }

    #[tokio::test]
    async fn answers_ping_and_extracts_context() {
        let mut h = start(ARTICLE, "https://example.com/p/1");
        assert!(matches!(next_event(&mut h).await, SurfaceEvent::ToggleUpdated { enabled: true, .. }));

        assert_eq!(ask(&h.handle, PageRequest::Ping).await, PageReply::Ready);
        let reply = ask(
            &h.handle,
            PageRequest::ExtractContext { link_url: "https://example.com/ref".into() },
        )
        .await;
        let PageReply::Context(ctx) = reply else { panic!("expected context") };
        assert!(ctx.success);
        assert_eq!(ctx.anchor_text, "the reference");
        assert_eq!(ctx.surrounding_context, "Background first See the reference for more It helps");
    }

    #[tokio::test]
    async fn summary_popup_points_at_last_right_clicked_link() {
        let mut h = start(ARTICLE, "https://example.com/p/1");
        next_event(&mut h).await;

        h.handle
            .dispatch(PageEvent::ContextMenu { target: h.link.clone() })
            .await
            .unwrap();
        let reply = ask(&h.handle, PageRequest::ShowSummary { text: "Short.".into() }).await;
        assert_eq!(reply, PageReply::Received);

        match next_event(&mut h).await {
            SurfaceEvent::PopupShown { message, placement, anchor } => {
                assert_eq!(message, "Short.");
                assert_eq!(anchor, Some(h.link.clone()));
                assert_eq!(placement.direction, Direction::Right);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn long_summary_is_repositioned_after_measuring() {
        let mut h = start(ARTICLE, "https://example.com/p/1");
        next_event(&mut h).await;
        h.handle
            .dispatch(PageEvent::ContextMenu { target: h.link.clone() })
            .await
            .unwrap();

        let long = "A detailed sentence about the linked page. ".repeat(30);
        ask(&h.handle, PageRequest::ShowSummary { text: long }).await;
        assert!(matches!(next_event(&mut h).await, SurfaceEvent::PopupShown { .. }));
        assert!(matches!(next_event(&mut h).await, SurfaceEvent::PopupMoved { .. }));
    }

    #[tokio::test]
    async fn loading_then_error_replace_each_other() {
        let mut h = start(ARTICLE, "https://example.com/p/1");
        next_event(&mut h).await;

        ask(&h.handle, PageRequest::ShowLoading).await;
        assert!(matches!(
            next_event(&mut h).await,
            SurfaceEvent::PopupShown { message, anchor: None, .. } if message == LOADING_TEXT
        ));
        ask(&h.handle, PageRequest::ShowError).await;
        assert_eq!(next_event(&mut h).await, SurfaceEvent::PopupClosed);
        assert!(matches!(
            next_event(&mut h).await,
            SurfaceEvent::PopupShown { message, .. } if message == ERROR_TEXT
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hover_dwell_triggers_background() {
        let mut h = start(ARTICLE, "https://example.com/p/1");
        // Hovering the text inside the anchor resolves to the anchor.
        let mut inner = h.link.clone();
        inner.push(0);
        h.handle
            .dispatch(PageEvent::PointerEnter { target: inner })
            .await
            .unwrap();

        let msg = h.background.recv().await.unwrap();
        assert_eq!(
            msg,
            BackgroundMessage::HoverSummarize { url: "https://example.com/ref".into(), tab: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_before_dwell_cancels_trigger() {
        let mut h = start(ARTICLE, "https://example.com/p/1");
        h.handle
            .dispatch(PageEvent::PointerEnter { target: h.link.clone() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        h.handle
            .dispatch(PageEvent::PointerLeave { target: h.link.clone() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(h.background.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn hover_ignored_when_disabled_until_toggled() {
        let plain = r#"<html><body><p>See <a href="/x">x</a>.</p></body></html>"#;
        let mut h = start(plain, "https://example.com/p/1");
        assert!(matches!(next_event(&mut h).await, SurfaceEvent::ToggleUpdated { enabled: false, .. }));

        h.handle
            .dispatch(PageEvent::PointerEnter { target: h.link.clone() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.background.try_recv().is_err());

        h.handle.dispatch(PageEvent::ToggleClicked).await.unwrap();
        assert_eq!(
            next_event(&mut h).await,
            SurfaceEvent::ToggleUpdated { enabled: true, override_active: true }
        );
        assert!(matches!(next_event(&mut h).await, SurfaceEvent::Toast { .. }));

        h.handle
            .dispatch(PageEvent::PointerEnter { target: h.link.clone() })
            .await
            .unwrap();
        assert!(matches!(
            h.background.recv().await.unwrap(),
            BackgroundMessage::HoverSummarize { .. }
        ));
    }
}
