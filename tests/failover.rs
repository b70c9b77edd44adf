//! HTTP client and failover against local fake hosts.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, Method, StatusCode};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use campus_cache::scrapers::{ScrapeError, Upstream, UrlCache};
use common::{fast_client, spawn_host};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

/// Healthy on `/` (so the probe passes) but 503 everywhere else.
fn flaky_host(hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route("/", get(|| async { StatusCode::OK }))
        .fallback(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::SERVICE_UNAVAILABLE
            }
        })
}

fn healthy_host(probes: Arc<AtomicUsize>, gets: Arc<AtomicUsize>) -> Router {
    Router::new().fallback(move |method: Method| {
        let probes = probes.clone();
        let gets = gets.clone();
        async move {
            if method == Method::HEAD {
                probes.fetch_add(1, Ordering::SeqCst);
            } else {
                gets.fetch_add(1, Ordering::SeqCst);
            }
            (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                "<html><body><p>served by B</p></body></html>",
            )
        }
    })
}

#[tokio::test]
async fn test_transient_503_fails_over_to_next_candidate() {
    let a_hits = counter();
    let b_probes = counter();
    let b_gets = counter();
    let a = spawn_host(flaky_host(a_hits.clone())).await;
    let b = spawn_host(healthy_host(b_probes.clone(), b_gets.clone())).await;

    let cache = Arc::new(UrlCache::new("sea", vec![a.clone(), b.clone()]));
    let upstream = Upstream::new(fast_client(3), cache.clone());
    let cancel = CancellationToken::new();

    let page = upstream
        .get(&cancel, "/pls/ld/CAMPUS_DIR_M.p1?kind=1")
        .await
        .unwrap();
    assert!(page.body.contains("served by B"));
    assert_eq!(a_hits.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get_cached(), Some(b.clone()));

    // Later requests use the cached candidate without probing again
    upstream.get(&cancel, "/pls/ld/CAMPUS_DIR_M.p1?kind=2").await.unwrap();
    assert_eq!(b_probes.load(Ordering::SeqCst), 1);
    assert_eq!(b_gets.load(Ordering::SeqCst), 2);
    assert_eq!(a_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clear_forces_reprobe() {
    let b_probes = counter();
    let b = spawn_host(healthy_host(b_probes.clone(), counter())).await;
    let http = fast_client(0);
    let cache = UrlCache::new("lms", vec![b.clone()]);
    let cancel = CancellationToken::new();

    assert_eq!(cache.get(&http, &cancel).await.unwrap(), b);
    assert_eq!(cache.get(&http, &cancel).await.unwrap(), b);
    assert_eq!(b_probes.load(Ordering::SeqCst), 1);

    cache.clear();
    assert_eq!(cache.get(&http, &cancel).await.unwrap(), b);
    assert_eq!(b_probes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_big5_body_is_decoded() {
    let (encoded, _, unmappable) = encoding_rs::BIG5.encode("<html><body><h1>資訊工程學系</h1></body></html>");
    assert!(!unmappable);
    let body = encoded.into_owned();
    let app = Router::new().route(
        "/dir",
        get(move || {
            let body = body.clone();
            async move { ([(header::CONTENT_TYPE, "text/html; charset=BIG5")], body) }
        }),
    );
    let base = spawn_host(app).await;

    let page = fast_client(0)
        .get_document(&CancellationToken::new(), &format!("{base}/dir"))
        .await
        .unwrap();
    assert!(page.body.contains("資訊工程學系"));
}

#[tokio::test]
async fn test_404_is_not_retried() {
    let hits = counter();
    let app = {
        let hits = hits.clone();
        Router::new().fallback(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::NOT_FOUND
            }
        })
    };
    let base = spawn_host(app).await;

    let err = fast_client(5)
        .get_document(&CancellationToken::new(), &format!("{base}/missing"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.is_not_found());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_404_keeps_working_base_url() {
    let probes = counter();
    let gets = counter();
    let app = {
        let probes = probes.clone();
        let gets = gets.clone();
        Router::new().fallback(move |method: Method| {
            let probes = probes.clone();
            let gets = gets.clone();
            async move {
                if method == Method::HEAD {
                    probes.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                } else {
                    gets.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND
                }
            }
        })
    };
    let base = spawn_host(app).await;
    let cache = Arc::new(UrlCache::new("sea", vec![base.clone()]));
    let upstream = Upstream::new(fast_client(3), cache.clone());
    let cancel = CancellationToken::new();

    for path in ["/missing/1", "/missing/2"] {
        let err = upstream.get(&cancel, path).await.unwrap_err();
        assert!(err.is_not_found());
    }
    assert_eq!(cache.get_cached(), Some(base));
    assert_eq!(probes.load(Ordering::SeqCst), 1);
    assert_eq!(gets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_503_exhausts_retries() {
    let hits = counter();
    let base = spawn_host(flaky_host(hits.clone())).await;

    let err = fast_client(2)
        .get_document(&CancellationToken::new(), &format!("{base}/busy"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(!err.is_permanent());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_429_waits_for_retry_after() {
    let hits = counter();
    let app = {
        let hits = hits.clone();
        Router::new().route(
            "/limited",
            get(move || {
                let hits = hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        (
                            StatusCode::TOO_MANY_REQUESTS,
                            [(header::RETRY_AFTER, "1")],
                            "slow down",
                        )
                    } else {
                        (StatusCode::OK, [(header::RETRY_AFTER, "0")], "welcome")
                    }
                }
            }),
        )
    };
    let base = spawn_host(app).await;

    let started = Instant::now();
    let page = fast_client(3)
        .get_document(&CancellationToken::new(), &format!("{base}/limited"))
        .await
        .unwrap();
    assert_eq!(page.body, "welcome");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "late"
        }),
    );
    let base = spawn_host(app).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = fast_client(3)
        .get_document(&cancel, &format!("{base}/slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}
