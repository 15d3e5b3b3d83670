//! Integration tests for cancellation support in HarvestService and PagedSearch.

use std::time::{Duration, Instant};

use demeter_core::harvest::HarvestService;
use demeter_core::{HarvestConfig, HarvestStatus, PagedSearch, PagedStatus, SilentReporter};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    MockFetcher, MockPortalClientFactory, MockRecord, TEST_PORTAL_URL,
};

#[tokio::test]
async fn test_cancellation_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![("a", MockRecord::dataset("a"))]);
    let config = HarvestConfig::default().with_inter_request_delay(Duration::ZERO);
    let service = HarvestService::with_config(factory.clone(), MockFetcher::new(), config);

    let token = CancellationToken::new();
    token.cancel();

    let report = service
        .harvest_cancellable(TEST_PORTAL_URL, dir.path(), &SilentReporter, token)
        .await
        .unwrap();

    assert_eq!(report.status, HarvestStatus::Cancelled);
    assert!(factory.requested().is_empty());
}

#[tokio::test]
async fn test_cancellation_between_items_keeps_written_files() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::dataset("b")),
        ("c", MockRecord::dataset("c")),
    ])
    .cancel_after(2, token.clone());
    let config = HarvestConfig::default().with_inter_request_delay(Duration::ZERO);
    let service = HarvestService::with_config(factory.clone(), MockFetcher::new(), config);

    let report = service
        .harvest_cancellable(TEST_PORTAL_URL, dir.path(), &SilentReporter, token)
        .await
        .unwrap();

    let portal_dir = dir.path().join("test-portal.example.com");
    assert_eq!(report.status, HarvestStatus::Cancelled);
    assert_eq!(report.stats.downloaded, 2, "The in-flight record is still written");
    assert!(portal_dir.join("a").exists());
    assert!(portal_dir.join("b").exists());
    assert!(!portal_dir.join("c").exists());
    assert_eq!(factory.requested(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_cancellation_cuts_the_politeness_delay_short() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::dataset("b")),
    ])
    .cancel_after(1, token.clone());
    let config = HarvestConfig::default().with_inter_request_delay(Duration::from_secs(30));
    let service = HarvestService::with_config(factory, MockFetcher::new(), config);

    let start = Instant::now();
    let report = service
        .harvest_cancellable(TEST_PORTAL_URL, dir.path(), &SilentReporter, token)
        .await
        .unwrap();

    assert_eq!(report.status, HarvestStatus::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancelled_paged_search_requests_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MockFetcher::new().respond("https://views.example.gov/api/views?page=1", "[]");
    let token = CancellationToken::new();
    token.cancel();

    let report = PagedSearch::new(fetcher.clone())
        .harvest_paged_cancellable("https://views.example.gov", dir.path(), &SilentReporter, token)
        .await
        .unwrap();

    assert_eq!(report.status, PagedStatus::Cancelled);
    assert!(fetcher.requests().is_empty());
}
