use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use carbon_portal_retriever::domain::ObjectId;
use carbon_portal_retriever::retrieval::{CsvFetcher, FetchFailure};
use carbon_portal_retriever::server::{AppState, router};

#[derive(Default)]
struct MockFetcher {
    files: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl CsvFetcher for MockFetcher {
    fn fetch_csv(&self, pid: &ObjectId) -> Result<Vec<u8>, FetchFailure> {
        self.calls.lock().unwrap().push(pid.to_string());
        self.files
            .get(pid.as_str())
            .cloned()
            .ok_or_else(|| FetchFailure::new(404, "not found"))
    }
}

async fn get(fetcher: Arc<MockFetcher>, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = router(AppState::new(fetcher))
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

#[tokio::test]
async fn valid_pid_returns_csv_bytes_verbatim() {
    let content = b"Expocode,Date\r\n11SS20200101,2020-01-01\r\n\xef\xbb\xbf;x\n".to_vec();
    let mut fetcher = MockFetcher::default();
    fetcher
        .files
        .insert("qbnUz2pNx8g9tXUFf5Kx9Xau".to_string(), content.clone());

    let (status, content_type, body) =
        get(Arc::new(fetcher), "/qbnUz2pNx8g9tXUFf5Kx9Xau").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/csv"));
    assert_eq!(body, content);
}

#[tokio::test]
async fn upstream_failure_is_passed_through() {
    let (status, _, body) = get(Arc::new(MockFetcher::default()), "/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"not found");
}

#[tokio::test]
async fn implausible_pid_is_rejected_without_fetching() {
    let fetcher = Arc::new(MockFetcher::default());
    let (status, _, _) = get(Arc::clone(&fetcher), "/bad.pid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(fetcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pid_with_encoded_whitespace_is_rejected() {
    let mut fetcher = MockFetcher::default();
    fetcher.files.insert("abc".to_string(), b"a\n".to_vec());
    let fetcher = Arc::new(fetcher);
    for uri in ["/%20abc", "/abc%20", "/abc%0A"] {
        let (status, _, _) = get(Arc::clone(&fetcher), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert!(fetcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn only_single_segment_paths_are_routed() {
    let fetcher = Arc::new(MockFetcher::default());
    let (status, _, _) = get(Arc::clone(&fetcher), "/a/b").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(fetcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn other_upstream_statuses_keep_code_and_message() {
    struct Forbidden;
    impl CsvFetcher for Forbidden {
        fn fetch_csv(&self, _pid: &ObjectId) -> Result<Vec<u8>, FetchFailure> {
            Err(FetchFailure::new(403, "licence not accepted"))
        }
    }
    let response = router(AppState::new(Arc::new(Forbidden)))
        .oneshot(Request::builder().uri("/abc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"licence not accepted");
}
