use crate::dom::events;
use crate::handle::Handle;
use crate::net::{FetchOptions, FetchRequest, HttpMethod};
use crate::queue::Lazy;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;

/// Per-element success callback for [`Handle::from_json`]. Receives a fixed
/// sub-handle for the element plus the decoded response body.
pub type JsonCallback = Arc<dyn Fn(Handle, Value) + Send + Sync>;

/// Fetch-driven content loading.
///
/// Each operation applies the `fallback` placeholder (when given) before
/// the request settles, routes failures through the lineage's error handler
/// without halting the rest of the queue, and dispatches the `event` option
/// on success.
impl Handle {
    /// Fetch JSON and fan the decoded body out to each element through the
    /// deferred lane, so callbacks observe a settled document.
    pub fn from_json(&self, url: &str, options: FetchOptions, callback: JsonCallback) -> Handle {
        let url = url.to_string();
        self.enqueue_op("from_json", move |h| async move {
            apply_text(&h, options.fallback.as_deref()).await;
            let request = h.request_for(&url, &options, HttpMethod::Get, None);
            match h.fetcher.fetch(request).await {
                Ok(response) => {
                    let body = response.json()?;
                    let context = h.op_context("from_json");
                    for node in h.nodes() {
                        let sub = h.element_handle(node);
                        let cb = callback.clone();
                        h.seq.defer(
                            context.clone(),
                            vec![Lazy::ready(body.clone())],
                            move |mut args| {
                                Box::pin(async move {
                                    cb(sub, args.remove(0));
                                    Ok(())
                                })
                            },
                        );
                    }
                    fire_event(&h, &options, json!({ "url": url, "status": response.status }))
                        .await;
                    Ok(())
                }
                Err(err) => {
                    apply_text(&h, options.error_text.as_deref()).await;
                    Err(err)
                }
            }
        })
    }

    /// Fetch HTML and write it into each element, sanitized when the
    /// option asks for it
    pub fn from_html(&self, url: &str, options: FetchOptions) -> Handle {
        let url = url.to_string();
        self.enqueue_op("from_html", move |h| async move {
            apply_text(&h, options.fallback.as_deref()).await;
            let request = h.request_for(&url, &options, HttpMethod::Get, None);
            match h.fetcher.fetch(request).await {
                Ok(response) => {
                    let mut body = response.text();
                    if options.sanitize || options.sanitizer.is_some() {
                        let hook = options.sanitizer.as_ref().unwrap_or(&h.config.sanitizer);
                        body = hook(&body);
                    }
                    {
                        let nodes = h.nodes();
                        let mut doc = h.doc.write().await;
                        for node in nodes {
                            doc.set_inner_html(node, &body);
                        }
                    }
                    fire_event(&h, &options, json!({ "url": url, "status": response.status }))
                        .await;
                    Ok(())
                }
                Err(err) => {
                    apply_text(&h, options.error_text.as_deref()).await;
                    Err(err)
                }
            }
        })
    }

    /// Stream a response into each element: every chunk re-applies the full
    /// accumulated text seen so far, not just the delta
    pub fn from_stream(&self, url: &str, options: FetchOptions) -> Handle {
        let url = url.to_string();
        self.enqueue_op("from_stream", move |h| async move {
            apply_text(&h, options.fallback.as_deref()).await;
            let request = h.request_for(&url, &options, HttpMethod::Get, None);
            let mut stream = match h.fetcher.fetch_stream(request).await {
                Ok(stream) => stream,
                Err(err) => {
                    apply_text(&h, options.error_text.as_deref()).await;
                    return Err(err);
                }
            };
            let mut accumulated: Vec<u8> = Vec::new();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        apply_text(&h, options.error_text.as_deref()).await;
                        return Err(err);
                    }
                };
                accumulated.extend_from_slice(&chunk);
                let text = String::from_utf8_lossy(&accumulated).to_string();
                let nodes = h.nodes();
                let mut doc = h.doc.write().await;
                for node in nodes {
                    doc.set_text(node, &text);
                }
            }
            fire_event(&h, &options, json!({ "url": url })).await;
            Ok(())
        })
    }

    /// POST a JSON body; dispatches the `event` option with the response
    /// body on success
    pub fn send(&self, url: &str, body: Value, options: FetchOptions) -> Handle {
        let url = url.to_string();
        self.enqueue_op("send", move |h| async move {
            let serialized = match &options.serializer {
                Some(serializer) => serializer(&body),
                None => body.to_string(),
            };
            let request = h
                .request_for(&url, &options, HttpMethod::Post, Some(serialized))
                .with_header("content-type", "application/json");
            let response = h.fetcher.fetch(request).await?;
            let detail = response
                .json()
                .unwrap_or_else(|_| json!({ "status": response.status }));
            fire_event(&h, &options, detail).await;
            Ok(())
        })
    }

    fn request_for(
        &self,
        url: &str,
        options: &FetchOptions,
        method: HttpMethod,
        body: Option<String>,
    ) -> FetchRequest {
        let mut request = match method {
            HttpMethod::Get => FetchRequest::get(url),
            HttpMethod::Post => FetchRequest::post(url, body.unwrap_or_default()),
        };
        for (name, value) in &options.headers {
            request = request.with_header(name, value);
        }
        request.with_timeout(options.timeout_ms.unwrap_or(self.config.fetch_timeout_ms))
    }
}

async fn apply_text(h: &Handle, text: Option<&str>) {
    let Some(text) = text else { return };
    let nodes = h.nodes();
    let mut doc = h.doc.write().await;
    for node in nodes {
        doc.set_text(node, text);
    }
}

async fn fire_event(h: &Handle, options: &FetchOptions, detail: Value) {
    let Some(event) = &options.event else { return };
    for node in h.nodes() {
        events::dispatch(&h.doc, node, event, detail.clone()).await;
    }
}
