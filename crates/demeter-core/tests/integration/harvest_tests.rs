//! Integration tests for HarvestService.
//!
//! These tests run the CKAN download loop against mock portals and a
//! temporary cache directory.

use std::time::{Duration, Instant};

use demeter_core::harvest::HarvestService;
use demeter_core::{
    FailureKind, HarvestConfig, HarvestStatus, PortalEntry, PortalOutcome, PortalType,
    TracingReporter,
};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    MockFetcher, MockPortalClientFactory, MockRecord, TEST_PORTAL_URL,
};

fn no_delay() -> HarvestConfig {
    HarvestConfig::default().with_inter_request_delay(Duration::ZERO)
}

fn service(factory: MockPortalClientFactory) -> HarvestService<MockPortalClientFactory, MockFetcher> {
    HarvestService::with_config(factory, MockFetcher::new(), no_delay())
}

#[tokio::test]
async fn test_harvest_downloads_every_listed_record() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![
        ("roads", MockRecord::dataset("roads")),
        ("rivers", MockRecord::dataset("rivers")),
    ]);
    let service = service(factory.clone());

    let report = service.harvest(TEST_PORTAL_URL, dir.path()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.namespace, "test-portal.example.com");
    assert_eq!(report.stats.downloaded, 2);
    assert_eq!(report.stats.skipped, 0);
    assert_eq!(factory.requested(), vec!["roads", "rivers"]);

    let stored = std::fs::read(dir.path().join("test-portal.example.com/roads")).unwrap();
    let record: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(record["name"], "roads");
    assert_eq!(
        record["resources"][0]["url"],
        "https://files.example.com/roads.csv"
    );
}

#[tokio::test]
async fn test_second_harvest_fetches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::dataset("b")),
        ("c", MockRecord::dataset("c")),
    ]);
    let service = service(factory.clone());

    service.harvest(TEST_PORTAL_URL, dir.path()).await.unwrap();
    factory.clear_requests();

    let report = service.harvest(TEST_PORTAL_URL, dir.path()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.stats.downloaded, 0);
    assert_eq!(report.stats.skipped, 3);
    assert!(factory.requested().is_empty(), "No record should be fetched again");
    assert_eq!(factory.listings(), 2, "The listing is requested on every run");
}

#[tokio::test]
async fn test_existing_file_is_never_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let portal_dir = dir.path().join("test-portal.example.com");
    std::fs::create_dir_all(&portal_dir).unwrap();
    std::fs::write(portal_dir.join("a"), b"stale but present").unwrap();

    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::dataset("b")),
    ]);
    let report = service(factory.clone())
        .harvest(TEST_PORTAL_URL, dir.path())
        .await
        .unwrap();

    assert_eq!(factory.requested(), vec!["b"]);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(
        std::fs::read(portal_dir.join("a")).unwrap(),
        b"stale but present",
        "Existing files are not updated"
    );
}

#[tokio::test]
async fn test_access_denied_aborts_remaining_records() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::NotAuthorized),
        ("c", MockRecord::dataset("c")),
    ]);

    let report = service(factory.clone())
        .harvest_with_progress(TEST_PORTAL_URL, dir.path(), &TracingReporter)
        .await
        .unwrap();

    let portal_dir = dir.path().join("test-portal.example.com");
    assert!(portal_dir.join("a").exists());
    assert!(!portal_dir.join("b").exists());
    assert!(!portal_dir.join("c").exists());
    assert_eq!(factory.requested(), vec!["a", "b"], "c must never be requested");
    assert_eq!(report.failure_kind(), Some(FailureKind::AccessDenied));
    assert_eq!(report.stats.downloaded, 1);
}

#[tokio::test]
async fn test_validation_error_aborts_remaining_records() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![
        ("bad", MockRecord::Invalid),
        ("good", MockRecord::dataset("good")),
    ]);

    let report = service(factory.clone())
        .harvest(TEST_PORTAL_URL, dir.path())
        .await
        .unwrap();

    assert_eq!(report.failure_kind(), Some(FailureKind::RecordInvalid));
    assert_eq!(factory.requested(), vec!["bad"]);
    assert!(!dir.path().join("test-portal.example.com/good").exists());
}

#[tokio::test]
async fn test_unreachable_portal_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::unreachable("dns error");

    let report = service(factory.clone())
        .harvest(TEST_PORTAL_URL, dir.path())
        .await
        .unwrap();

    match &report.status {
        HarvestStatus::Aborted { kind, reason } => {
            assert_eq!(*kind, FailureKind::PortalUnreachable);
            assert!(reason.contains("dns error"));
        }
        other => panic!("Expected aborted status, got {other:?}"),
    }
    assert!(factory.requested().is_empty());
    assert!(
        dir.path().join("test-portal.example.com").is_dir(),
        "The portal directory is created before listing"
    );
}

#[tokio::test]
async fn test_invalid_portal_url_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![]);

    let report = service(factory)
        .harvest("not-a-url", dir.path())
        .await
        .unwrap();

    assert_eq!(report.failure_kind(), Some(FailureKind::PortalUnreachable));
}

#[tokio::test]
async fn test_other_record_errors_propagate() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::Broken("HTTP 500".to_string())),
        ("c", MockRecord::dataset("c")),
    ]);

    let result = service(factory.clone())
        .harvest(TEST_PORTAL_URL, dir.path())
        .await;

    assert!(result.is_err());
    assert!(dir.path().join("test-portal.example.com/a").exists());
    assert_eq!(factory.requested(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_inter_request_delay_is_applied_after_each_write() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::dataset("b")),
    ]);
    let config = HarvestConfig::default().with_inter_request_delay(Duration::from_millis(60));
    let service = HarvestService::with_config(factory, MockFetcher::new(), config);

    let start = Instant::now();
    service.harvest(TEST_PORTAL_URL, dir.path()).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(120));

    // Cached records are skipped without any delay.
    let start = Instant::now();
    service.harvest(TEST_PORTAL_URL, dir.path()).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(60));
}

#[tokio::test]
async fn test_harvest_leaves_no_partial_files() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![("a", MockRecord::dataset("a"))]);
    service(factory).harvest(TEST_PORTAL_URL, dir.path()).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path().join("test-portal.example.com"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a"]);
}

#[tokio::test]
async fn test_identifiers_outside_the_portal_dir_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    let factory = MockPortalClientFactory::new(vec![
        ("../../escaped", MockRecord::dataset("escaped")),
        ("", MockRecord::dataset("blank")),
        ("nested/id", MockRecord::dataset("nested")),
        ("roads", MockRecord::dataset("roads")),
    ]);
    let service = service(factory.clone());

    let report = service.harvest(TEST_PORTAL_URL, &cache_root).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.stats.rejected, 3);
    assert_eq!(report.stats.downloaded, 1);
    assert_eq!(factory.requested(), vec!["roads"]);
    assert!(!dir.path().join("escaped").exists());
    assert!(!cache_root.join("escaped").exists());
    assert!(!cache_root.join("test-portal.example.com/nested").exists());
    assert!(cache_root.join("test-portal.example.com/roads").exists());
}

#[tokio::test]
async fn test_batch_continues_after_portal_failure() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MockFetcher::new()
        .respond("https://views.example.gov/api/views?page=1", r#"[{"id": "x"}]"#)
        .respond("https://views.example.gov/api/views?page=2", "[]");
    let factory = MockPortalClientFactory::new(vec![
        ("a", MockRecord::dataset("a")),
        ("b", MockRecord::NotAuthorized),
    ]);
    let service = HarvestService::with_config(factory, fetcher.clone(), no_delay());

    let entries = [
        PortalEntry {
            name: "denied".to_string(),
            url: TEST_PORTAL_URL.to_string(),
            portal_type: PortalType::Ckan,
            enabled: true,
            description: None,
        },
        PortalEntry {
            name: "views".to_string(),
            url: "https://views.example.gov".to_string(),
            portal_type: PortalType::Socrata,
            enabled: true,
            description: None,
        },
    ];
    let portals: Vec<&PortalEntry> = entries.iter().collect();

    let summary = service.batch_harvest(&portals, dir.path()).await.unwrap();

    assert_eq!(summary.total_portals(), 2);
    assert_eq!(summary.successful_count(), 1);
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(summary.total_datasets(), 2);
    assert!(matches!(
        summary.results[1].outcome,
        PortalOutcome::Paged(ref r) if r.views_seen == 1
    ));
    assert!(
        dir.path()
            .join("socrata/views.example.gov/api/views?page=1")
            .exists()
    );
    assert_eq!(fetcher.requests().len(), 2);
}

#[tokio::test]
async fn test_batch_stops_on_uncaught_error() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockPortalClientFactory::new(vec![("a", MockRecord::Broken("boom".into()))]);
    let fetcher = MockFetcher::new();
    let service = HarvestService::with_config(factory, fetcher.clone(), no_delay());

    let entries = [
        PortalEntry {
            name: "broken".to_string(),
            url: TEST_PORTAL_URL.to_string(),
            portal_type: PortalType::Ckan,
            enabled: true,
            description: None,
        },
        PortalEntry {
            name: "never".to_string(),
            url: "https://views.example.gov".to_string(),
            portal_type: PortalType::Socrata,
            enabled: true,
            description: None,
        },
    ];
    let portals: Vec<&PortalEntry> = entries.iter().collect();

    let result = service
        .batch_harvest_cancellable(&portals, dir.path(), &TracingReporter, CancellationToken::new())
        .await;

    assert!(result.is_err());
    assert!(fetcher.requests().is_empty(), "The second portal never starts");
}
