//! Failure paths: verification, retries, cancellation and sticky errors

mod common;

use common::*;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wikidump_dl::config::RetryConfig;
use wikidump_dl::{ArchiveError, Catalog, DumpHub, Error, ResourceDescriptor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn one_resource(name: &str, url: String, digest: String) -> Catalog {
    let mut catalog = Catalog::new();
    catalog.insert(name, vec![ResourceDescriptor::new(url, digest)]);
    catalog
}

#[tokio::test]
async fn digest_mismatch_exhausts_retries_and_leaves_no_spool() {
    let server = MockServer::start().await;
    // max_attempts = 3 retries, so four requests in total
    mount_body_expecting(&server, "/pages.xml.bz2", b"corrupted".to_vec(), 4).await;

    let spool = TempDir::new().unwrap();
    let expected = sha1_hex(&bzip2(PAGES_XML.as_bytes()));
    let hub = test_hub(
        one_resource(
            "pages",
            format!("{}/pages.xml.bz2", server.uri()),
            expected.clone(),
        ),
        &spool,
    );

    let mut resources = hub.open("pages");
    match resources.next(&CancellationToken::new()).await {
        Err(Error::DigestMismatch {
            expected: e, actual, ..
        }) => {
            assert_eq!(e, expected);
            assert_eq!(actual, sha1_hex(b"corrupted"));
        }
        other => panic!("expected DigestMismatch, got {other:?}"),
    }
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn not_found_is_retried_then_reported_as_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.xml.gz"))
        .respond_with(ResponseTemplate::new(404))
        .expect(4)
        .mount(&server)
        .await;

    let spool = TempDir::new().unwrap();
    let hub = test_hub(
        one_resource(
            "missing",
            format!("{}/missing.xml.gz", server.uri()),
            sha1_hex(b"whatever"),
        ),
        &spool,
    );

    let err = hub
        .open("missing")
        .next(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 404, .. }), "got {err:?}");
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn corrupt_first_response_recovers_on_retry() {
    let server = MockServer::start().await;
    let body = gzip(PAGES_XML.as_bytes());
    Mock::given(method("GET"))
        .and(path("/pages.xml.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"truncated".as_slice()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_body_expecting(&server, "/pages.xml.gz", body.clone(), 1).await;

    let spool = TempDir::new().unwrap();
    let hub = test_hub(
        one_resource(
            "pages",
            format!("{}/pages.xml.gz", server.uri()),
            sha1_hex(&body),
        ),
        &spool,
    );

    let mut resources = hub.open("pages");
    let stream = expect_next(&mut resources, &CancellationToken::new()).await;
    assert_eq!(read_and_close(stream).await, PAGES_XML);
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn cancel_during_backoff_returns_promptly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let spool = TempDir::new().unwrap();
    let slow_retry = RetryConfig {
        max_attempts: 12,
        initial_delay: Duration::from_secs(60),
        max_delay: Duration::from_secs(3600),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    let hub = DumpHub::new(
        one_resource(
            "pages",
            format!("{}/pages.xml", server.uri()),
            sha1_hex(b"x"),
        ),
        test_date(),
        test_config(&spool, slow_retry),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let mut resources = hub.open("pages");
    let err = resources.next(&cancel).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled), "got {err:?}");
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn failure_is_sticky_and_does_not_refetch() {
    let server = MockServer::start().await;
    mount_body_expecting(&server, "/a.xml", b"bad".to_vec(), 4).await;
    mount_body_expecting(&server, "/b.xml", PAGES_XML.as_bytes().to_vec(), 0).await;

    let spool = TempDir::new().unwrap();
    let mut catalog = Catalog::new();
    catalog.insert(
        "pages",
        vec![
            ResourceDescriptor::new(format!("{}/a.xml", server.uri()), sha1_hex(b"good")),
            ResourceDescriptor::new(
                format!("{}/b.xml", server.uri()),
                sha1_hex(PAGES_XML.as_bytes()),
            ),
        ],
    );
    let hub = test_hub(catalog, &spool);
    let cancel = CancellationToken::new();

    let mut resources = hub.open("pages");
    let first = resources.next(&cancel).await.unwrap_err();
    let second = resources.next(&cancel).await.unwrap_err();
    let third = resources.next(&cancel).await.unwrap_err();

    assert!(matches!(first, Error::DigestMismatch { .. }));
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.to_string(), third.to_string());
    assert!(resources.is_finished());
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn abandoned_fetch_fails_instead_of_skipping_ahead() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p1.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(PAGES_XML.as_bytes())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    mount_body_expecting(&server, "/p2.xml", PAGES_XML_PART2.as_bytes().to_vec(), 0).await;

    let spool = TempDir::new().unwrap();
    let mut catalog = Catalog::new();
    catalog.insert(
        "pages",
        vec![
            ResourceDescriptor::new(
                format!("{}/p1.xml", server.uri()),
                sha1_hex(PAGES_XML.as_bytes()),
            ),
            ResourceDescriptor::new(
                format!("{}/p2.xml", server.uri()),
                sha1_hex(PAGES_XML_PART2.as_bytes()),
            ),
        ],
    );
    let hub = test_hub(catalog, &spool);
    let cancel = CancellationToken::new();

    let mut resources = hub.open("pages");
    let timed_out =
        tokio::time::timeout(Duration::from_millis(200), resources.next(&cancel)).await;
    assert!(timed_out.is_err(), "first fetch should still be waiting");

    for _ in 0..3 {
        match resources.next(&cancel).await {
            Err(Error::Cancelled) => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }
    assert!(resources.is_finished());
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn unknown_name_errors_on_every_call() {
    let spool = TempDir::new().unwrap();
    let hub = test_hub(Catalog::new(), &spool);
    let cancel = CancellationToken::new();

    let mut resources = hub.open("stub-meta-current");
    for _ in 0..3 {
        match resources.next(&cancel).await {
            Err(Error::UnknownResource { name }) => assert_eq!(name, "stub-meta-current"),
            other => panic!("expected UnknownResource, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn empty_resource_list_ends_on_first_call() {
    let spool = TempDir::new().unwrap();
    let mut catalog = Catalog::new();
    catalog.insert("abstract", vec![]);
    let hub = test_hub(catalog, &spool);
    let cancel = CancellationToken::new();

    let mut resources = hub.open("abstract");
    for _ in 0..3 {
        assert!(resources.next(&cancel).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn seven_zip_with_two_entries_is_rejected_without_retry() {
    let server = MockServer::start().await;
    let scratch = TempDir::new().unwrap();
    let archive = seven_zip(
        scratch.path(),
        &[("part1.xml", PAGES_XML), ("part2.xml", PAGES_XML_PART2)],
    );
    let digest = sha1_hex(&archive);
    mount_body_expecting(&server, "/history.xml.7z", archive, 1).await;

    let spool = TempDir::new().unwrap();
    let hub = test_hub(
        one_resource(
            "history",
            format!("{}/history.xml.7z", server.uri()),
            digest,
        ),
        &spool,
    );

    let err = hub
        .open("history")
        .next(&CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Archive(ArchiveError::EntryCount { count, .. }) => assert_eq!(count, 2),
        other => panic!("expected EntryCount, got {other:?}"),
    }
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn malformed_digest_fails_without_a_request() {
    let server = MockServer::start().await;
    mount_body_expecting(&server, "/pages.xml", PAGES_XML.as_bytes().to_vec(), 0).await;

    let spool = TempDir::new().unwrap();
    let hub = test_hub(
        one_resource(
            "pages",
            format!("{}/pages.xml", server.uri()),
            "abc".to_string(),
        ),
        &spool,
    );

    let err = hub
        .open("pages")
        .next(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config { .. }), "got {err:?}");
}
