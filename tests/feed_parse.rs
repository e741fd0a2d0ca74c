// tests/feed_parse.rs
use community_curator::config::FeedSource;
use community_curator::ingest::providers::feed::parse_feed;
use community_curator::ingest::providers::FeedProvider;
use community_curator::ingest::types::{Origin, SourceProvider};
use community_curator::StaticFetcher;

const TWO_ITEMS: &str = include_str!("fixtures/two_items.rss.xml");

fn source() -> FeedSource {
    FeedSource {
        name: "Two Items".into(),
        url: "https://feeds.test/two.xml".into(),
        source: "blog.test".into(),
    }
}

#[test]
fn item_without_title_is_dropped() {
    let out = parse_feed(&source(), TWO_ITEMS.as_bytes(), 12).expect("feed parses");
    assert_eq!(out.len(), 1);

    let c = &out[0];
    assert_eq!(c.title, "Rust 1.80 release notes");
    assert_eq!(c.url, "https://blog.test/rust-180");
    assert_eq!(c.source, "blog.test");
    assert_eq!(c.tags_seed, vec!["Rust".to_string()]);
    assert_eq!(c.origin, Origin::Feed("Two Items".into()));
    assert_eq!(
        c.published_at.map(|t| t.to_rfc3339()).as_deref(),
        Some("2024-10-02T15:00:00+00:00")
    );
}

#[tokio::test]
async fn provider_fetches_through_the_fetcher() {
    let fetcher = StaticFetcher::new().with("https://feeds.test/two.xml", TWO_ITEMS);
    let provider = FeedProvider::new(source(), 12);

    let items = provider.fetch_latest(&fetcher).await.expect("fetch ok");
    assert_eq!(items.len(), 1);
    assert_eq!(provider.name(), "Two Items");
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn missing_feed_is_an_error_for_that_source_only() {
    let provider = FeedProvider::new(source(), 12);
    let err = provider
        .fetch_latest(&StaticFetcher::new())
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
}
