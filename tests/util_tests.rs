//! Tests for utility modules (retry, timeout, URL helpers).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ytm_auth::error::AuthError;
use ytm_auth::util::retry::RetryPolicy;
use ytm_auth::util::timeout::with_timeout;
use ytm_auth::util::url::{build_url_with_params, query_param};

#[tokio::test(start_paused = true)]
async fn retry_policy_retries_retryable_errors_until_success() {
    let policy = RetryPolicy {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(100),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_task = attempts.clone();

    let task = tokio::spawn(async move {
        policy
            .execute(|| {
                let attempts = attempts_for_task.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(AuthError::Timeout(100))
                    } else {
                        Ok::<_, AuthError>("ok")
                    }
                }
            })
            .await
    });

    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let result = task.await.unwrap();

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_stops_immediately_for_non_retryable_errors() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AuthError::api(401, "Unauthorized"))
            }
        })
        .await;

    match result {
        Err(AuthError::Api { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected api error, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_returns_last_error_when_attempts_are_exhausted() {
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(50),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_task = attempts.clone();

    let task = tokio::spawn(async move {
        policy
            .execute(|| {
                let attempts = attempts_for_task.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AuthError::api(502, "Bad gateway"))
                }
            })
            .await
    });

    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let result = task.await.unwrap();

    assert_eq!(result.unwrap_err().status(), Some(502));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn retry_policy_backoff_grows_and_caps() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
    assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
    assert_eq!(policy.backoff_for(10), Duration::from_secs(10));
    assert_eq!(RetryPolicy::none().max_attempts, 1);
    assert_eq!(RetryPolicy::none().with_max_attempts(0).max_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn with_timeout_maps_deadline_to_timeout_error() {
    let result = with_timeout(Duration::from_millis(250), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, AuthError>(())
    })
    .await;

    match result {
        Err(AuthError::Timeout(ms)) => assert_eq!(ms, 250),
        other => panic!("expected timeout error, got {other:?}"),
    }
}

#[tokio::test]
async fn with_timeout_passes_through_results() {
    let value = with_timeout(Duration::from_secs(1), async { Ok::<_, AuthError>(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);
}

#[test]
fn url_helpers_encode_and_decode_query() {
    let url = build_url_with_params(
        "https://hub.example.com/api/rest/oauth2/auth",
        &[("scope", "Hub YouTrack"), ("redirect_uri", "ytoauth://landing.url")],
    );
    assert_eq!(
        url,
        "https://hub.example.com/api/rest/oauth2/auth?scope=Hub%20YouTrack&redirect_uri=ytoauth%3A%2F%2Flanding.url"
    );
    assert_eq!(query_param(&url, "scope").as_deref(), Some("Hub YouTrack"));
    assert_eq!(
        query_param(&url, "redirect_uri").as_deref(),
        Some("ytoauth://landing.url")
    );
}
