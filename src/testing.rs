use crate::config::ChainConfig;
use crate::errors::{DomError, Result};
use crate::net::{ByteStream, FetchBackend, FetchRequest, FetchResponse};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted fetch backend for tests and offline demos.
///
/// Serves one canned body for every URL; `failing` makes every request
/// reject with a `NetworkError` after the configured delay. The request
/// deadline is honored: a delay longer than `timeout_ms` rejects with
/// `TimeoutExceeded`, the way the HTTP backend does.
pub struct StaticFetcher {
    body: Vec<u8>,
    delay_ms: u64,
    chunk_size: usize,
    failing: bool,
}

impl StaticFetcher {
    pub fn serving(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            delay_ms: 0,
            chunk_size: 8,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            body: Vec::new(),
            delay_ms: 0,
            chunk_size: 8,
            failing: true,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[async_trait]
impl FetchBackend for StaticFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        if self.delay_ms > 0 {
            let wait = tokio::time::sleep(Duration::from_millis(self.delay_ms));
            let deadline = Duration::from_millis(request.timeout_ms);
            if tokio::time::timeout(deadline, wait).await.is_err() {
                return Err(DomError::TimeoutExceeded(request.url));
            }
        }
        if self.failing {
            return Err(DomError::NetworkError(format!(
                "scripted failure: {}",
                request.url
            )));
        }
        Ok(FetchResponse {
            status: 200,
            body: self.body.clone(),
        })
    }

    async fn fetch_stream(&self, request: FetchRequest) -> Result<ByteStream> {
        if self.failing {
            return Err(DomError::NetworkError(format!(
                "scripted failure: {}",
                request.url
            )));
        }
        let chunks: Vec<Vec<u8>> = self
            .body
            .chunks(self.chunk_size)
            .map(|c| c.to_vec())
            .collect();
        let delay = self.delay_ms;
        let stream = stream::iter(chunks)
            .then(move |chunk| async move {
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Ok(chunk)
            })
            .boxed();
        Ok(stream)
    }
}

/// Error handler capturing `(kind, context)` pairs for assertions
pub fn capturing_handler() -> (ChainConfig, Arc<Mutex<Vec<(&'static str, String)>>>) {
    let reports: Arc<Mutex<Vec<(&'static str, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = reports.clone();
    let config = ChainConfig::new().with_error_handler(Arc::new(move |err, ctx| {
        seen.lock().unwrap_or_else(|e| e.into_inner()).push((err.kind(), ctx.to_string()));
    }));
    (config, reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Handle, Keyframes, TransitionOptions};
    use crate::net::FetchOptions;
    use crate::session::Page;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Stream opens fine, then dies after the first chunk
    struct BrokenStreamFetcher;

    #[async_trait]
    impl FetchBackend for BrokenStreamFetcher {
        async fn fetch(&self, _request: FetchRequest) -> Result<FetchResponse> {
            Ok(FetchResponse {
                status: 200,
                body: Vec::new(),
            })
        }

        async fn fetch_stream(&self, request: FetchRequest) -> Result<ByteStream> {
            let chunks: Vec<Result<Vec<u8>>> = vec![
                Ok(b"partial".to_vec()),
                Err(DomError::NetworkError(format!("reset: {}", request.url))),
            ];
            Ok(stream::iter(chunks).boxed())
        }
    }

    const SAMPLE: &str = r#"<html><body>
        <div id="a">start</div>
        <ul id="list">
            <li class="item">one</li>
            <li class="item special">two</li>
            <li class="item">three</li>
        </ul>
        <div id="f"></div>
    </body></html>"#;

    fn page() -> (Page, Arc<Mutex<Vec<(&'static str, String)>>>) {
        let (config, reports) = capturing_handler();
        (Page::with_config(SAMPLE, config), reports)
    }

    #[tokio::test]
    async fn chained_operations_match_direct_application() {
        let (page, _) = page();
        let handle = page.find("#a").await.unwrap();
        handle
            .text("hello")
            .add_class("x")
            .wait(10)
            .css("color", "blue")
            .set("role", "note")
            .idle()
            .await;

        // same mutations applied directly, in order, on a second document
        let direct = Page::from_html(SAMPLE);
        {
            let doc_arc = direct.document();
            let mut doc = doc_arc.write().await;
            let node = doc.first_match("#a").unwrap();
            doc.set_text(node, "hello");
            doc.with_element(node, |el| el.add_class("x"));
            doc.with_element(node, |el| el.set_style("color", "blue"));
            doc.set_attribute(node, "role", "note");
        }

        let chained = page.attribute("#a", "style").await;
        assert_eq!(chained, direct.attribute("#a", "style").await);
        assert_eq!(
            page.text_content("#a").await,
            direct.text_content("#a").await
        );
        assert_eq!(
            page.attribute("#a", "class").await,
            direct.attribute("#a", "class").await
        );
        assert_eq!(
            page.attribute("#a", "role").await,
            direct.attribute("#a", "role").await
        );
    }

    #[tokio::test]
    async fn wait_delays_later_mutations_but_not_earlier_ones() {
        let (page, _) = page();
        let handle = page.find("#a").await.unwrap();
        let start = Instant::now();
        handle.text("x").wait(50).text("y");

        tokio::time::sleep(Duration::from_millis(15)).await;
        // mid-wait the first mutation is visible, the second is not
        assert_eq!(page.text_content("#a").await.as_deref(), Some("x"));

        handle.idle().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(page.text_content("#a").await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn find_all_over_nothing_reports_once_and_returns_none() {
        let (page, reports) = page();
        let handle = page.find_all(".missing").await;
        assert!(handle.is_none());
        assert_eq!(
            *reports.lock().unwrap(),
            vec![("NoElementsFound", "find_all .missing".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_traversal_keeps_the_prior_target() {
        let (page, reports) = page();
        let handle = page.find("#a").await.unwrap();
        let before = handle.nodes();
        // #a has no element children at all
        handle.first().idle().await;
        assert_eq!(
            *reports.lock().unwrap(),
            vec![("NoElementsFound", "first #a".to_string())]
        );
        assert_eq!(handle.nodes(), before);

        // the failed switch does not stop later steps from running
        handle.add_class("still-here").idle().await;
        assert_eq!(
            page.attribute("#a", "class").await.as_deref(),
            Some("still-here")
        );
    }

    #[tokio::test]
    async fn fixed_sub_handles_refuse_traversal() {
        let (config, reports) = capturing_handler();
        let page = Page::with_config(SAMPLE, config)
            .with_fetcher(Arc::new(StaticFetcher::serving(r#"{"name":"n"}"#)));
        let handle = page.find("#f").await.unwrap();

        let captured: Arc<Mutex<Option<Handle>>> = Arc::new(Mutex::new(None));
        let slot = captured.clone();
        handle
            .from_json(
                "http://test/json",
                Default::default(),
                Arc::new(move |sub, _json| {
                    *slot.lock().unwrap() = Some(sub);
                }),
            )
            .idle()
            .await;

        let sub = captured.lock().unwrap().take().unwrap();
        assert!(sub.is_fixed());
        let before = sub.nodes();
        sub.parent().idle().await;
        assert_eq!(sub.nodes(), before);
        assert!(reports
            .lock()
            .unwrap()
            .iter()
            .any(|(kind, _)| *kind == "HandleIsFixed"));
    }

    #[tokio::test]
    async fn failing_fetch_applies_fallback_reports_and_continues() {
        let (config, reports) = capturing_handler();
        let page = Page::with_config(SAMPLE, config)
            .with_fetcher(Arc::new(StaticFetcher::failing().with_delay(20)));
        let handle = page.find("#f").await.unwrap();

        handle.from_json(
            "http://test/json",
            FetchOptions::new().with_fallback("loading..."),
            Arc::new(|sub, json| {
                sub.text(json["name"].as_str().unwrap_or(""));
            }),
        );
        handle.add_class("ready");

        tokio::time::sleep(Duration::from_millis(10)).await;
        // placeholder lands before the request settles
        assert_eq!(page.text_content("#f").await.as_deref(), Some("loading..."));

        handle.idle().await;
        assert_eq!(
            *reports.lock().unwrap(),
            vec![("NetworkError", "from_json #f".to_string())]
        );
        // the chain keeps going past the failure
        assert_eq!(page.attribute("#f", "class").await.as_deref(), Some("ready"));
    }

    #[tokio::test]
    async fn from_json_fans_out_per_element_after_the_batch_settles() {
        let page = Page::from_html(SAMPLE)
            .with_fetcher(Arc::new(StaticFetcher::serving(r#"{"name":"fetched"}"#)));
        let handle = page.find_all(".item").await.unwrap();

        handle
            .add_class("loading")
            .from_json(
                "http://test/json",
                Default::default(),
                Arc::new(|sub, json| {
                    sub.text(json["name"].as_str().unwrap_or(""))
                        .remove_class("loading");
                }),
            )
            .idle()
            .await;

        let doc_arc = page.document();
        let doc = doc_arc.read().await;
        let sel = crate::SelectorList::parse(".item").unwrap();
        for node in doc.query(doc.root(), &sel) {
            assert_eq!(doc.text(node), "fetched");
            assert!(!doc.has_class(node, "loading"));
        }
    }

    #[tokio::test]
    async fn a_slow_fetch_times_out_and_the_chain_continues() {
        let (config, reports) = capturing_handler();
        let page = Page::with_config(SAMPLE, config)
            .with_fetcher(Arc::new(StaticFetcher::serving("{}").with_delay(500)));
        let handle = page.find("#f").await.unwrap();

        handle.from_json(
            "http://test/slow",
            FetchOptions::new().with_timeout(10),
            Arc::new(|_, _| {}),
        );
        handle.text("after");
        handle.idle().await;

        assert_eq!(
            *reports.lock().unwrap(),
            vec![("TimeoutExceeded", "from_json #f".to_string())]
        );
        assert_eq!(page.text_content("#f").await.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn from_html_prefers_the_per_call_sanitizer() {
        let page = Page::from_html(SAMPLE).with_fetcher(Arc::new(StaticFetcher::serving(
            "<b>bold</b><script>evil()</script>",
        )));
        let handle = page.find("#a").await.unwrap();

        handle
            .from_html(
                "http://test/html",
                FetchOptions::new().with_sanitizer(Arc::new(|_| "<i>scrubbed</i>".to_string())),
            )
            .idle()
            .await;

        let doc_arc = page.document();
        let doc = doc_arc.read().await;
        let node = doc.first_match("#a").unwrap();
        assert_eq!(doc.inner_html(node), "<i>scrubbed</i>");
    }

    #[tokio::test]
    async fn a_mid_stream_failure_applies_the_error_text() {
        let (config, reports) = capturing_handler();
        let page = Page::with_config(SAMPLE, config).with_fetcher(Arc::new(BrokenStreamFetcher));
        let handle = page.find("#a").await.unwrap();

        handle
            .from_stream(
                "http://test/stream",
                FetchOptions::new().with_error_text("connection lost"),
            )
            .idle()
            .await;

        assert_eq!(
            *reports.lock().unwrap(),
            vec![("NetworkError", "from_stream #a".to_string())]
        );
        assert_eq!(
            page.text_content("#a").await.as_deref(),
            Some("connection lost")
        );
    }

    #[tokio::test]
    async fn moving_into_own_subtree_is_rejected_and_traversal_still_works() {
        let (config, reports) = capturing_handler();
        let page = Page::with_config(
            "<html><body><div id='outer'><div id='inner'></div></div></body></html>",
            config,
        );
        let handle = page.find("#outer").await.unwrap();

        handle
            .move_to("#inner")
            .pick("div")
            .add_class("found")
            .idle()
            .await;

        assert_eq!(
            *reports.lock().unwrap(),
            vec![("OperationFailed", "move_to #outer".to_string())]
        );
        // the document stays acyclic, so later queries terminate
        assert!(page.text_content("#outer").await.is_some());
        assert_eq!(
            page.attribute("#inner", "class").await.as_deref(),
            Some("found")
        );
    }

    #[tokio::test]
    async fn from_stream_reapplies_the_accumulated_body() {
        let body = "streamed content arriving in pieces";
        let page = Page::from_html(SAMPLE).with_fetcher(Arc::new(
            StaticFetcher::serving(body).with_chunk_size(7).with_delay(5),
        ));
        let handle = page.find("#a").await.unwrap();

        handle.from_stream("http://test/stream", Default::default());
        tokio::time::sleep(Duration::from_millis(12)).await;
        let partial = page.text_content("#a").await.unwrap();
        assert!(body.starts_with(&partial));
        assert!(!partial.is_empty());

        handle.idle().await;
        assert_eq!(page.text_content("#a").await.as_deref(), Some(body));
    }

    #[tokio::test]
    async fn transition_joins_all_members_of_a_collection() {
        let (page, _) = page();
        let handle = page.find_all(".item").await.unwrap();
        let start = Instant::now();
        handle
            .transition(
                Keyframes::new()
                    .frame(&[("opacity", "0.5")])
                    .frame(&[("opacity", "1")]),
                TransitionOptions::duration(40),
            )
            .idle()
            .await;

        assert!(start.elapsed() >= Duration::from_millis(40));
        let doc_arc = page.document();
        let doc = doc_arc.read().await;
        let sel = crate::SelectorList::parse(".item").unwrap();
        for node in doc.query(doc.root(), &sel) {
            assert_eq!(doc.attribute(node, "style").as_deref(), Some("opacity: 1"));
        }
    }

    #[tokio::test]
    async fn traversal_switches_target_while_keeping_the_chain() {
        let (page, reports) = page();
        let handle = page.find("#list").await.unwrap();
        handle
            .pick(".special")
            .add_class("found")
            .parent()
            .add_class("host")
            .idle()
            .await;

        assert!(reports.lock().unwrap().is_empty());
        assert_eq!(
            page.attribute(".special", "class").await.as_deref(),
            Some("item special found")
        );
        assert_eq!(
            page.attribute("#list", "class").await.as_deref(),
            Some("host")
        );
    }

    #[tokio::test]
    async fn events_fire_through_the_chain() {
        let (page, _) = page();
        let handle = page.find_all(".item").await.unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();

        handle
            .on(
                "activate",
                Arc::new(move |event| {
                    assert_eq!(event.name, "activate");
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .fire("activate", json!({ "by": "test" }))
            .idle()
            .await;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn later_runs_after_the_whole_chain_settles() {
        let (page, _) = page();
        let handle = page.find("#a").await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = order.clone();
        handle.text("first").later(move |h| async move {
            let log2 = log.clone();
            h.now(move |doc, nodes| {
                log2.lock().unwrap().push(format!("later:{}", doc.text(nodes[0])));
            })
            .await;
            Ok(())
        });
        let log = order.clone();
        handle.wait(10).run(move |_| async move {
            log.lock().unwrap().push("main".to_string());
            Ok(())
        });
        handle.idle().await;

        assert_eq!(*order.lock().unwrap(), vec!["main", "later:first"]);
    }
}
