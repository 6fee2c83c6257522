use httpmock::prelude::*;
use serde_json::json;
use zahouse_core::search::{NoopSearchService, SearchService, TavilyClient};

#[tokio::test]
async fn tavily_results_are_mapped() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/search")
            .json_body_partial(r#"{"api_key":"tvly-test","query":"latest streaming rates","max_results":3}"#);
        then.status(200).json_body(json!({
            "query": "latest streaming rates",
            "results": [
                {"title": "Rates 2025", "url": "https://example.com/r", "content": "Spotify pays...", "score": 0.92},
                {"title": "No content", "url": "https://example.com/n"}
            ]
        }));
    });

    let client = TavilyClient::new("tvly-test").unwrap().with_base_url(server.base_url());
    let results = client.search("latest streaming rates", 3).await.unwrap();

    mock.assert();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Rates 2025");
    assert_eq!(results[0].content, "Spotify pays...");
    assert!((results[0].score - 0.92).abs() < f64::EPSILON);
    assert_eq!(results[1].content, "");
}

#[tokio::test]
async fn tavily_error_status_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/search");
        then.status(401).body("bad key");
    });

    let client = TavilyClient::new("wrong").unwrap().with_base_url(server.base_url());
    let err = client.search("anything", 5).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains("bad key"), "{msg}");
}

#[tokio::test]
async fn noop_search_returns_nothing() {
    assert!(NoopSearchService.search("news", 5).await.unwrap().is_empty());
}
