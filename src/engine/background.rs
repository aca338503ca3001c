//! The long-lived coordinator. Consumes trigger messages from page agents and
//! the host UI, and runs one pipeline task per trigger.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::message::BackgroundMessage;
use crate::engine::pipeline::{Outcome, Pipeline};

pub struct Background {
    pipeline: Pipeline,
}

impl Background {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Start the coordinator loop; it ends when every sender is dropped.
    pub fn spawn(self, inbox: mpsc::Receiver<BackgroundMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(inbox))
    }

    pub async fn run(self, mut inbox: mpsc::Receiver<BackgroundMessage>) {
        while let Some(msg) = inbox.recv().await {
            self.handle(msg);
        }
        log::debug!("Background inbox closed");
    }

    /// Start the pipeline for `msg` on its own task. Triggers never wait on
    /// each other; a newer one does not cancel an older one.
    pub fn handle(&self, msg: BackgroundMessage) -> Option<JoinHandle<Outcome>> {
        let (url, tab) = match msg {
            BackgroundMessage::HoverSummarize { url, tab } => (url, tab),
            BackgroundMessage::ContextMenuClicked {
                link_url: Some(url),
                tab,
                ..
            } => (url, tab),
            BackgroundMessage::ContextMenuClicked {
                link_url: None,
                selection_text,
                ..
            } => {
                log::info!("No link detected.");
                if let Some(text) = selection_text {
                    log::debug!("Ignoring selection without link: {:?}", text);
                }
                return None;
            }
        };

        log::info!("Summarize {} for tab {}", url, tab);
        let pipeline = self.pipeline.clone();
        Some(tokio::spawn(async move { pipeline.summarize(&url, tab).await }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{CacheConfig, UsherConfig};
    use crate::dom::parser::parse_html;
    use crate::engine::host::Tabs;
    use crate::engine::message::TabId;
    use crate::error::FetchError;
    use crate::net::cache::CacheStore;
    use crate::net::store::MemoryStore;
    use crate::net::summarize::{SummaryRequest, SummaryResponse, Summarizer};
    use crate::page::storage::MemoryLocalStorage;
    use crate::page::{AgentDeps, PageEvent};
    use crate::render::placement::Viewport;
    use crate::render::{SurfaceEvent, SurfaceUpdate};

    const PAGE: &str = r#"<html><body><article>
        <p>Intro sentence. Read <a href="/guide">the guide</a> first. Then practice.</p>
    </article></body></html>"#;

    struct Echo;

    #[async_trait]
    impl Summarizer for Echo {
        async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, FetchError> {
            Ok(SummaryResponse {
                summary: Some(format!("About {} ({})", request.url, request.anchor_text)),
            })
        }
    }

    struct World {
        tabs: Arc<Tabs>,
        background: Background,
        surface: mpsc::UnboundedReceiver<SurfaceUpdate>,
        triggers: mpsc::Receiver<BackgroundMessage>,
    }

    fn world() -> World {
        let config = Arc::new(UsherConfig::default());
        let (bg_tx, triggers) = mpsc::channel(8);
        let (surface_tx, surface) = mpsc::unbounded_channel();
        let tabs = Arc::new(Tabs::new(AgentDeps {
            background: bg_tx,
            surface: surface_tx,
            storage: Arc::new(MemoryLocalStorage::new()),
            config: config.clone(),
        }));
        let cache = CacheStore::new(Arc::new(MemoryStore::new()), CacheConfig::default());
        let pipeline = Pipeline::new(tabs.clone(), cache, Arc::new(Echo), config.pipeline.clone());
        World {
            tabs,
            background: Background::new(pipeline),
            surface,
            triggers,
        }
    }

    async fn wait_for_popup(surface: &mut mpsc::UnboundedReceiver<SurfaceUpdate>, tab: TabId) -> String {
        loop {
            let update = surface.recv().await.expect("surface closed");
            assert_eq!(update.tab, tab);
            if let SurfaceEvent::PopupShown { message, .. } = update.event {
                if message.starts_with("About") {
                    return message;
                }
            }
        }
    }

    #[tokio::test]
    async fn context_menu_on_link_renders_summary() {
        let mut w = world();
        let doc = parse_html(PAGE, "https://example.com/docs/start");
        let link = doc.links()[0].0.clone();
        let tab = w.tabs.open_with_agent(doc, Viewport::default()).await.unwrap();

        w.tabs
            .dispatch(tab, PageEvent::ContextMenu { target: link })
            .await
            .unwrap();
        let job = w
            .background
            .handle(BackgroundMessage::ContextMenuClicked {
                link_url: Some("https://example.com/guide".into()),
                selection_text: None,
                tab,
            })
            .unwrap();

        let outcome = job.await.unwrap();
        assert!(outcome.is_delivered());
        assert_eq!(
            wait_for_popup(&mut w.surface, tab).await,
            "About https://example.com/guide (the guide)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hover_dwell_round_trips_through_background() {
        let mut w = world();
        let doc = parse_html(PAGE, "https://example.com/docs/start");
        let link = doc.links()[0].0.clone();
        let tab = w.tabs.open_with_agent(doc, Viewport::default()).await.unwrap();

        w.tabs
            .dispatch(tab, PageEvent::PointerEnter { target: link })
            .await
            .unwrap();
        let trigger = w.triggers.recv().await.unwrap();
        assert_eq!(
            trigger,
            BackgroundMessage::HoverSummarize {
                url: "https://example.com/guide".into(),
                tab
            }
        );

        w.background.handle(trigger).unwrap().await.unwrap();
        let message = wait_for_popup(&mut w.surface, tab).await;
        assert!(message.contains("the guide"));
    }

    #[tokio::test]
    async fn uninjected_tab_gets_agent_on_first_request() {
        let mut w = world();
        let doc = parse_html(PAGE, "https://example.com/docs/start");
        let tab = w.tabs.open(doc, Viewport::default());
        assert!(w.tabs.agent(tab).is_none());

        let outcome = w
            .background
            .handle(BackgroundMessage::HoverSummarize {
                url: "https://example.com/guide".into(),
                tab,
            })
            .unwrap()
            .await
            .unwrap();
        assert!(outcome.is_delivered());
        assert!(w.tabs.agent(tab).is_some());
        wait_for_popup(&mut w.surface, tab).await;
    }

    #[tokio::test]
    async fn restricted_tab_fails_at_injection() {
        let w = world();
        let tab = w.tabs.open(
            parse_html("<html><body></body></html>", "chrome://extensions/"),
            Viewport::default(),
        );
        let outcome = w
            .background
            .handle(BackgroundMessage::HoverSummarize {
                url: "https://example.com/guide".into(),
                tab,
            })
            .unwrap()
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Failed { ref error, .. } if error.phase() == "inject"));
    }

    #[tokio::test]
    async fn context_menu_without_link_does_nothing() {
        let w = world();
        let job = w.background.handle(BackgroundMessage::ContextMenuClicked {
            link_url: None,
            selection_text: Some("some words".into()),
            tab: 1,
        });
        assert!(job.is_none());
    }

    #[tokio::test]
    async fn loop_stops_when_senders_drop() {
        let w = world();
        let (tx, rx) = mpsc::channel(1);
        let task = w.background.spawn(rx);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
