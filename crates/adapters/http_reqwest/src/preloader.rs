//! Media warm-up over HTTP.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;

use signage_app::ports::Preloader;

/// Fetches media URLs in the background so the HTTP cache is warm when a
/// slide shows them.
///
/// Each URL is fetched once. Failed fetches are forgotten so a later call
/// retries them. At most `max_concurrent` fetches run at a time; `preload`
/// itself never waits.
#[derive(Debug, Clone)]
pub struct HttpPreloader {
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl HttpPreloader {
    #[must_use]
    pub fn new(http: reqwest::Client, max_concurrent: usize) -> Self {
        Self {
            http,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            seen: Arc::default(),
        }
    }

    /// Whether `url` was already requested (and did not fail).
    #[must_use]
    pub fn is_known(&self, url: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    fn claim(&self, url: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string())
    }
}

impl Preloader for HttpPreloader {
    fn preload(&self, url: &str) {
        let url = url.trim();
        if url.is_empty() || !self.claim(url) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(url, "no runtime to preload on");
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(url);
            return;
        };

        let http = self.http.clone();
        let permits = Arc::clone(&self.permits);
        let seen = Arc::clone(&self.seen);
        let url = url.to_string();
        runtime.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let result = match http.get(&url).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => response.bytes().await.map(|body| body.len()),
                    Err(err) => Err(err),
                },
                Err(err) => Err(err),
            };
            match result {
                Ok(size) => tracing::debug!(%url, size, "preloaded"),
                Err(err) => {
                    tracing::debug!(%url, error = %err, "preload failed");
                    seen.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&url);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn should_fetch_each_url_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/a.jpg",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "jpeg"
                }),
            )
            .with_state(Arc::clone(&hits));
        let base = serve(router).await;
        let preloader = HttpPreloader::new(reqwest::Client::new(), 2);

        let url = format!("{base}/a.jpg");
        preloader.preload_many(&[url.as_str(), url.as_str()]);
        preloader.preload(&url);
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(preloader.is_known(&url));
    }

    #[tokio::test]
    async fn should_forget_failed_urls() {
        let router = Router::new().route("/missing.jpg", get(|| async { StatusCode::NOT_FOUND }));
        let base = serve(router).await;
        let preloader = HttpPreloader::new(reqwest::Client::new(), 1);

        let url = format!("{base}/missing.jpg");
        preloader.preload(&url);
        settle().await;

        assert!(!preloader.is_known(&url));
    }

    #[tokio::test]
    async fn should_ignore_blank_urls() {
        let preloader = HttpPreloader::new(reqwest::Client::new(), 1);
        preloader.preload("  ");
        assert!(!preloader.is_known(""));
    }

    #[test]
    fn should_not_panic_outside_a_runtime() {
        let preloader = HttpPreloader::new(reqwest::Client::new(), 1);
        preloader.preload("http://127.0.0.1:9/a.jpg");
        assert!(!preloader.is_known("http://127.0.0.1:9/a.jpg"));
    }
}
