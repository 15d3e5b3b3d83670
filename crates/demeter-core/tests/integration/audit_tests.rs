//! Integration tests for the link audit.

use demeter_core::harvest::SOCRATA_CACHE_DIR;
use demeter_core::{
    AppError, FailureKind, LinkAudit, PagedSearch, PagedStatus, PortalType, SilentReporter, cache,
};
use serde_json::Value;

use crate::integration::common::{MockFetcher, MockProber};

async fn write(root: &std::path::Path, rel: &str, body: &str) {
    cache::write_atomic(&root.join(rel), body.as_bytes())
        .await
        .unwrap();
}

fn rows(out: &[u8]) -> Vec<Value> {
    String::from_utf8(out.to_vec())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_audit_resolves_both_portal_kinds() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "demo.ckan.org/roads",
        r#"{"name": "roads", "resources": [{"url": "https://f.example/a"}, {"url": "https://f.example/b"}]}"#,
    )
    .await;
    write(
        dir.path(),
        "socrata/data.example.gov/api/views?page=1",
        r#"[
            {"viewType": "href", "tableId": 1, "metadata": {"accessPoints": {"csv": "https://s.example/1.csv"}}},
            {"viewType": "tabular", "tableId": 2}
        ]"#,
    )
    .await;

    let mut out = Vec::new();
    let summary = LinkAudit::<MockProber>::new(None)
        .audit_directory(dir.path(), &mut out, &SilentReporter)
        .await
        .unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.links, 2);
    assert_eq!(summary.probed, 0);

    let rows = rows(&out);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["software"], "ckan");
    assert_eq!(rows[0]["url"], "https://f.example/b");
    assert!(rows[0].get("liveness").is_none());
    assert!(rows[0]["source"].as_str().unwrap().ends_with("roads"));
    assert_eq!(rows[1]["software"], "socrata");
    assert_eq!(rows[1]["identifier"], "1");
    assert_eq!(rows[2]["is_link"], false);
    assert!(rows[2]["url"].is_null());
}

#[tokio::test]
async fn test_audit_probes_non_null_urls() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "p/alive",
        r#"{"name": "alive", "resources": [{"url": "https://up.example"}]}"#,
    )
    .await;
    write(
        dir.path(),
        "p/dead",
        r#"{"name": "dead", "resources": [{"url": "https://down.example"}]}"#,
    )
    .await;
    write(dir.path(), "p/empty", r#"{"name": "empty", "resources": []}"#).await;

    let prober = MockProber::with_dead(&["https://down.example"]);
    let mut out = Vec::new();
    let summary = LinkAudit::new(Some(prober.clone()))
        .audit_directory(dir.path(), &mut out, &SilentReporter)
        .await
        .unwrap();

    assert_eq!(summary.probed, 2);
    assert_eq!(summary.alive, 1);
    assert_eq!(summary.failed_probes, 1);
    assert_eq!(prober.probed().len(), 2, "Null URLs are never probed");

    let rows = rows(&out);
    let dead = rows.iter().find(|r| r["identifier"] == "dead").unwrap();
    assert_eq!(dead["liveness"]["status_code"], -42);
    assert!(dead["liveness"]["headers"].is_null());
    let alive = rows.iter().find(|r| r["identifier"] == "alive").unwrap();
    assert_eq!(alive["liveness"]["status_code"], 200);
}

#[tokio::test]
async fn test_audit_filters_by_software_and_skips_undecodable() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a/one", r#"{"name": "one"}"#).await;
    write(dir.path(), "s/page", r#"[{"viewType": "href", "tableId": "t"}]"#).await;
    write(dir.path(), "a/broken", "{ truncated").await;

    let mut out = Vec::new();
    let summary = LinkAudit::<MockProber>::new(None)
        .only(PortalType::Socrata)
        .audit_directory(dir.path(), &mut out, &SilentReporter)
        .await
        .unwrap();

    assert_eq!(summary.files, 1);
    assert_eq!(summary.records, 1);
    assert_eq!(summary.undecodable_files, 1);
    assert_eq!(rows(&out)[0]["identifier"], "t");
}

#[tokio::test]
async fn test_malformed_record_fails_with_file_name() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "p/nameless", r#"{"resources": []}"#).await;

    let mut out = Vec::new();
    let err = LinkAudit::<MockProber>::new(None)
        .audit_directory(dir.path(), &mut out, &SilentReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::MalformedRecord { .. }));
    assert!(err.to_string().contains("nameless"));
}

#[tokio::test]
async fn test_audit_after_failed_paged_search_counts_the_bad_page() {
    let dir = tempfile::tempdir().unwrap();
    let page = "https://data.example.gov/api/views?page=1";
    let fetcher = MockFetcher::new()
        .respond(page, r#"{"error": "rate limited"}"#)
        .respond(page, r#"{"error": "rate limited"}"#);

    let report = PagedSearch::new(fetcher)
        .harvest_paged("https://data.example.gov", &dir.path().join(SOCRATA_CACHE_DIR))
        .await
        .unwrap();
    assert!(matches!(
        report.status,
        PagedStatus::Failed {
            kind: FailureKind::DecodeFailure,
            ..
        }
    ));
    write(
        dir.path(),
        "demo.ckan.org/roads",
        r#"{"name": "roads", "resources": [{"url": "https://f.example/roads.csv"}]}"#,
    )
    .await;

    let mut out = Vec::new();
    let summary = LinkAudit::<MockProber>::new(None)
        .audit_directory(dir.path(), &mut out, &SilentReporter)
        .await
        .unwrap();

    assert_eq!(summary.undecodable_files, 1);
    assert_eq!(summary.files, 1);
    assert_eq!(summary.records, 1);
    assert_eq!(rows(&out)[0]["identifier"], "roads");
}
