use domq::testing::StaticFetcher;
use domq::{FetchOptions, Keyframes, Page, TransitionOptions};
use serde_json::json;
use std::sync::Arc;

const PAGE: &str = r#"<html><body>
    <h1 id="title">Dashboard</h1>
    <ul id="feed">
        <li class="card">placeholder</li>
        <li class="card">placeholder</li>
        <li class="card">placeholder</li>
    </ul>
    <div id="status"></div>
</body></html>"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // scripted backend so the demo runs offline
    let page = Page::from_html(PAGE).with_fetcher(Arc::new(
        StaticFetcher::serving(r#"{"headline":"three cards loaded"}"#).with_delay(50),
    ));

    if let Some(title) = page.find("#title").await {
        title
            .css("color", "navy")
            .wait(25)
            .text("Dashboard (live)")
            .transition(
                Keyframes::new()
                    .frame(&[("opacity", "0.5")])
                    .frame(&[("opacity", "1")]),
                TransitionOptions::duration(50),
            );
    }

    if let Some(cards) = page.find_all(".card").await {
        cards
            .add_class("loading")
            .from_json(
                "http://demo.local/feed.json",
                FetchOptions::new().with_fallback("fetching...").with_event("loaded"),
                Arc::new(|card, body| {
                    card.text(body["headline"].as_str().unwrap_or("no headline"))
                        .remove_class("loading")
                        .add_class("ready");
                }),
            )
            .idle()
            .await;
    }

    if let Some(status) = page.find("#status").await {
        status
            .on(
                "loaded",
                Arc::new(|event| {
                    tracing::info!(event = %event.name, "feed settled");
                }),
            )
            .fire("loaded", json!({ "source": "demo" }))
            .idle()
            .await;
    }

    println!("{}", page.html().await);
    Ok(())
}
