use std::sync::Arc;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::engine::host::PageHost;
use crate::engine::message::{PageReply, PageRequest, TabId};
use crate::error::{MessageError, UsherError};
use crate::net::cache::CacheStore;
use crate::net::summarize::{SummaryRequest, Summarizer};
use crate::page::extract::ExtractedContext;

/// Per-request state. `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Readying,
    Loading,
    CacheHit,
    CacheMiss,
    Fetching,
    Delivered,
    Failed,
}

/// How a summarization request ended, with the states it passed through.
#[derive(Debug)]
pub enum Outcome {
    Delivered {
        summary: String,
        from_cache: bool,
        trace: Vec<RequestState>,
    },
    Failed {
        error: UsherError,
        trace: Vec<RequestState>,
    },
}

impl Outcome {
    pub fn trace(&self) -> &[RequestState] {
        match self {
            Outcome::Delivered { trace, .. } | Outcome::Failed { trace, .. } => trace,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered { .. })
    }
}

struct Run {
    url: String,
    tab: TabId,
    trace: Vec<RequestState>,
}

impl Run {
    fn enter(&mut self, state: RequestState) {
        log::debug!("[{} tab {}] {:?}", self.url, self.tab, state);
        self.trace.push(state);
    }
}

/// The summarization pipeline:
/// Ready page → Loading → Cache → Extract context → Fetch → Store → Deliver
///
/// Holds no lock across requests; concurrent calls interleave freely.
#[derive(Clone)]
pub struct Pipeline {
    host: Arc<dyn PageHost>,
    cache: CacheStore,
    summarizer: Arc<dyn Summarizer>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        host: Arc<dyn PageHost>,
        cache: CacheStore,
        summarizer: Arc<dyn Summarizer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            host,
            cache,
            summarizer,
            config,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Summarize `url` for the page in `tab`. Every failure is rendered in
    /// the page as the generic error before being returned.
    pub async fn summarize(&self, url: &str, tab: TabId) -> Outcome {
        let mut run = Run {
            url: url.to_string(),
            tab,
            trace: vec![RequestState::Idle],
        };

        match self.drive(&mut run).await {
            Ok((summary, from_cache)) => {
                run.enter(RequestState::Delivered);
                Outcome::Delivered {
                    summary,
                    from_cache,
                    trace: run.trace,
                }
            }
            Err(error) => {
                log::error!("Summarize failed at {}: {}", error.phase(), error);
                run.enter(RequestState::Failed);
                if let Err(e) = self.host.post(tab, PageRequest::ShowError).await {
                    log::warn!("Could not render error in tab {}: {}", tab, e);
                }
                Outcome::Failed {
                    error,
                    trace: run.trace,
                }
            }
        }
    }

    async fn drive(&self, run: &mut Run) -> Result<(String, bool), UsherError> {
        run.enter(RequestState::Readying);
        self.ensure_agent(run.tab).await?;

        run.enter(RequestState::Loading);
        if let Err(e) = self.host.post(run.tab, PageRequest::ShowLoading).await {
            log::warn!("Loading indicator not shown: {}", e);
        }

        if let Some(summary) = self.cache.lookup(&run.url).await {
            run.enter(RequestState::CacheHit);
            self.deliver(run.tab, &summary).await?;
            return Ok((summary, true));
        }
        run.enter(RequestState::CacheMiss);

        let context = self.extract_context(run).await;

        run.enter(RequestState::Fetching);
        let request = SummaryRequest {
            url: run.url.clone(),
            anchor_text: context.anchor_text,
            surrounding_context: context.surrounding_context,
        };
        let summary = self.summarizer.summarize(&request).await?.into_text();

        self.cache.store(&run.url, &summary).await;
        self.deliver(run.tab, &summary).await?;
        Ok((summary, false))
    }

    /// Probe the page agent; inject one if nothing answers in time.
    async fn ensure_agent(&self, tab: TabId) -> Result<(), UsherError> {
        let probe = Duration::from_millis(self.config.probe_timeout_ms);
        match self.host.request(tab, PageRequest::Ping, probe).await {
            Ok(PageReply::Ready) => return Ok(()),
            Ok(other) => log::debug!("Unexpected probe reply {:?}; injecting", other),
            Err(e) => log::debug!("Probe failed ({}); injecting", e),
        }

        self.host.inject(tab).await?;
        tokio::time::sleep(Duration::from_millis(self.config.injection_grace_ms)).await;
        Ok(())
    }

    /// Context is an enrichment; every failure degrades to empty fields.
    async fn extract_context(&self, run: &Run) -> ExtractedContext {
        let timeout = Duration::from_millis(self.config.extract_timeout_ms);
        let request = PageRequest::ExtractContext {
            link_url: run.url.clone(),
        };
        match self.host.request(run.tab, request, timeout).await {
            Ok(PageReply::Context(ctx)) if ctx.success => ctx,
            Ok(PageReply::Context(_)) => {
                log::warn!("No link element found for {}; sending without context", run.url);
                ExtractedContext::empty()
            }
            Ok(other) => {
                let e = MessageError::UnexpectedReply(format!("{:?}", other));
                log::warn!("Context extraction failed: {}", e);
                ExtractedContext::empty()
            }
            Err(e) => {
                log::warn!("Context extraction failed: {}", e);
                ExtractedContext::empty()
            }
        }
    }

    async fn deliver(&self, tab: TabId, summary: &str) -> Result<(), UsherError> {
        self.host
            .post(
                tab,
                PageRequest::ShowSummary {
                    text: summary.to_string(),
                },
            )
            .await?;
        Ok(())
    }
}
