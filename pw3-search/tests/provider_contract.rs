//! PublicWWW provider contract tests.
//!
//! These tests verify the exact request shape sent to the export endpoint
//! and how responses and failures are mapped, against a local mock server.

use pw3_search::{ExportFormat, PublicWwwEngine, SearchConfig, SearchError, SearchProvider};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_for(server: &MockServer, api_key: Option<&str>) -> PublicWwwEngine {
    PublicWwwEngine::new(SearchConfig {
        base_url: server.uri(),
        api_key: api_key.map(str::to_owned),
        timeout_seconds: 5,
        user_agent: None,
    })
    .expect("engine")
}

#[tokio::test]
async fn snippet_request_uses_csvsnippets_export() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/websites/foo/"))
        .and(query_param("export", "csvsnippets"))
        .and(query_param_is_missing("key"))
        .respond_with(ResponseTemplate::new(200).set_body_string("example.com;5;hello\n"))
        .expect(1)
        .mount(&server)
        .await;

    let body = engine_for(&server, None)
        .fetch_export("foo", ExportFormat::CsvSnippets)
        .await
        .expect("export");
    assert_eq!(body, "example.com;5;hello\n");
}

#[tokio::test]
async fn api_key_is_sent_as_query_parameter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/websites/foo/"))
        .and(query_param("export", "csv"))
        .and(query_param("key", "k-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a.com;1\n"))
        .expect(1)
        .mount(&server)
        .await;

    let body = engine_for(&server, Some("k-1"))
        .fetch_export("foo", ExportFormat::Csv)
        .await
        .expect("export");
    assert_eq!(body, "a.com;1\n");
}

#[tokio::test]
async fn query_with_spaces_and_quotes_is_one_path_segment() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/websites/%22jquery%201.4%22/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let body = engine_for(&server, None)
        .fetch_export("\"jquery 1.4\"", ExportFormat::Csv)
        .await
        .expect("export");
    assert!(body.is_empty());
}

#[tokio::test]
async fn non_success_status_is_an_error_without_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = engine_for(&server, Some("secret"))
        .fetch_export("foo", ExportFormat::Csv)
        .await
        .unwrap_err();
    match err {
        SearchError::Status { status, ref url } => {
            assert_eq!(status, 503);
            assert!(!url.contains("secret"));
            assert!(url.contains("key=***"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late.com;1\n")
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = PublicWwwEngine::new(SearchConfig {
        base_url: server.uri(),
        timeout_seconds: 1,
        ..Default::default()
    })
    .expect("engine");

    let err = engine
        .fetch_export("foo", ExportFormat::Csv)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn search_helper_parses_export() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/websites/foo/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("a.com;1;x\nbad-line\nb.com;2\n"),
        )
        .mount(&server)
        .await;

    let config = SearchConfig {
        base_url: server.uri(),
        timeout_seconds: 5,
        ..Default::default()
    };
    let lines = pw3_search::search("foo", ExportFormat::CsvSnippets, &config)
        .await
        .expect("search");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].domain, "a.com");
    assert_eq!(lines[1].snippet, "");
}
