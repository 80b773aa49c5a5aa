//! reqwest implementation of the remote ports.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, ETAG, IF_NONE_MATCH};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use signage_app::ports::{ConfigSource, LiveTarget, PairingApi, PushMessage, PushTransport};
use signage_domain::error::{PayloadError, SignageError};
use signage_domain::id::{DeviceId, PairingCode};
use signage_domain::pairing::PairStatus;
use signage_domain::push::{ConfigSnapshot, DeviceResolution, DeviceSnapshot, decode_device, fingerprint};
use signage_domain::schedule::Schedule;
use signage_domain::settings::Settings;

use crate::error::HttpError;
use crate::preloader::HttpPreloader;
use crate::sse;

const SCHEDULE_PATH: &str = "/api/schedule";
const SETTINGS_PATH: &str = "/api/settings";
const STREAM_PATH: &str = "/api/stream";
const PROBE_PATH: &str = "/api/stream/probe";
const RESOLVE_PATH: &str = "/pair/resolve";
const BEGIN_PATH: &str = "/pair/begin";
const POLL_PATH: &str = "/pair/poll";
const HEARTBEAT_PATH: &str = "/pair/heartbeat";

/// Configuration for the HTTP adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server base URL, e.g. `https://signage.example`.
    pub base_url: String,
    /// Timeout of request/response calls. The live channel has none.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Build an [`HttpClient`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidBaseUrl`] when the base URL is not an
    /// absolute http(s) URL, or [`HttpError::Request`] when the TLS backend
    /// cannot be initialized.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|_| HttpError::InvalidBaseUrl(self.base_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::InvalidBaseUrl(self.base_url));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("signaged/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.connect_timeout)
            .build()?;

        Ok(HttpClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            request_timeout: self.request_timeout,
            cache: Arc::default(),
        })
    }
}

/// A body kept for revalidation.
#[derive(Debug, Clone)]
struct Cached {
    etag: Option<String>,
    body: String,
}

/// Client of the configuration server.
///
/// Cloning is cheap; clones share the connection pool and the revalidation
/// cache.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    cache: Arc<Mutex<HashMap<&'static str, Cached>>>,
}

impl HttpClient {
    /// A preloader sharing this client's connection pool.
    #[must_use]
    pub fn preloader(&self, max_concurrent: usize) -> HttpPreloader {
        HttpPreloader::new(self.http.clone(), max_concurrent)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn cached(&self, path: &'static str) -> Option<Cached> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    fn remember(&self, path: &'static str, entry: Cached) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, entry);
    }

    /// `GET` with `If-None-Match`, falling back to the cached body on `304`.
    ///
    /// The body is not cached here: callers remember it once it decoded.
    async fn conditional_get(&self, path: &'static str) -> Result<Cached, HttpError> {
        let cached = self.cached(path);

        let mut request = self.http.get(self.url(path)).timeout(self.request_timeout);
        if let Some(etag) = cached.as_ref().and_then(|c| c.etag.as_deref()) {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response = request.send().await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::trace!(path, "not modified");
            return cached.ok_or(HttpError::NotModifiedWithoutCache(path));
        }

        let response = ensure_success(response)?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(Cached { etag, body })
    }
}

fn ensure_success(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HttpError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SignageError> {
    let body = ensure_success(response)?
        .text()
        .await
        .map_err(HttpError::from)?;
    serde_json::from_str(&body)
        .map_err(PayloadError::from)
        .map_err(SignageError::from)
}

fn stream_query(target: &LiveTarget) -> Vec<(&'static str, &str)> {
    match target {
        LiveTarget::Global => vec![("mode", "global")],
        LiveTarget::Device(id) => vec![("mode", "device"), ("device", id.as_str())],
        LiveTarget::Pairing(code) => vec![("mode", "pair"), ("code", code.as_str())],
    }
}

impl ConfigSource for HttpClient {
    fn fetch_global(&self) -> impl Future<Output = Result<ConfigSnapshot, SignageError>> + Send {
        let this = self.clone();
        async move {
            let (schedule, settings) = futures_util::future::try_join(
                this.conditional_get(SCHEDULE_PATH),
                this.conditional_get(SETTINGS_PATH),
            )
            .await?;

            let schedule_doc: Schedule =
                serde_json::from_str(&schedule.body).map_err(PayloadError::from)?;
            let settings_doc: Settings =
                serde_json::from_str(&settings.body).map_err(PayloadError::from)?;

            let version = match (&schedule.etag, &settings.etag) {
                (Some(a), Some(b)) => fingerprint([a.as_bytes(), b.as_bytes()]),
                _ => fingerprint([schedule.body.as_bytes(), settings.body.as_bytes()]),
            };
            tracing::debug!(version = %version, "global configuration fetched");

            this.remember(SCHEDULE_PATH, schedule);
            this.remember(SETTINGS_PATH, settings);

            Ok(ConfigSnapshot {
                schedule: schedule_doc,
                settings: settings_doc,
                version,
            })
        }
    }

    fn resolve_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<DeviceSnapshot, SignageError>> + Send {
        let this = self.clone();
        let device_id = device_id.clone();
        async move {
            let response = this
                .http
                .get(this.url(RESOLVE_PATH))
                .query(&[("device", device_id.as_str())])
                .timeout(this.request_timeout)
                .send()
                .await
                .map_err(HttpError::from)?;

            if response.status() == StatusCode::NOT_FOUND {
                return Err(SignageError::DeviceUnbound {
                    device_id: device_id.to_string(),
                });
            }

            let body = ensure_success(response)?
                .text()
                .await
                .map_err(HttpError::from)?;
            match decode_device(&body)? {
                DeviceResolution::Found(snapshot) => Ok(snapshot),
                DeviceResolution::NotFound => {
                    tracing::warn!(%device_id, "resolve answered 200 with a not-found body");
                    Err(PayloadError::NotFoundBody.into())
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct BeginResponse {
    code: PairingCode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatBody<'a> {
    device_id: &'a DeviceId,
}

impl PairingApi for HttpClient {
    fn begin_pairing(&self) -> impl Future<Output = Result<PairingCode, SignageError>> + Send {
        let this = self.clone();
        async move {
            let response = this
                .http
                .post(this.url(BEGIN_PATH))
                .timeout(this.request_timeout)
                .send()
                .await
                .map_err(HttpError::from)?;
            let begin: BeginResponse = read_json(response).await?;
            Ok(begin.code)
        }
    }

    fn poll_pairing(
        &self,
        code: &PairingCode,
    ) -> impl Future<Output = Result<PairStatus, SignageError>> + Send {
        let this = self.clone();
        let code = code.clone();
        async move {
            let response = this
                .http
                .get(this.url(POLL_PATH))
                .query(&[("code", code.as_str())])
                .timeout(this.request_timeout)
                .send()
                .await
                .map_err(HttpError::from)?;
            read_json(response).await
        }
    }

    fn heartbeat(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        let this = self.clone();
        let device_id = device_id.clone();
        async move {
            let response = this
                .http
                .post(this.url(HEARTBEAT_PATH))
                .json(&HeartbeatBody {
                    device_id: &device_id,
                })
                .timeout(this.request_timeout)
                .send()
                .await
                .map_err(HttpError::from)?;
            ensure_success(response)?;
            Ok(())
        }
    }
}

impl PushTransport for HttpClient {
    type Stream = BoxStream<'static, Result<PushMessage, SignageError>>;

    fn probe(
        &self,
        target: &LiveTarget,
    ) -> impl Future<Output = Result<bool, SignageError>> + Send {
        let this = self.clone();
        let target = target.clone();
        async move {
            let response = this
                .http
                .get(this.url(PROBE_PATH))
                .query(&stream_query(&target))
                .timeout(this.request_timeout)
                .send()
                .await
                .map_err(HttpError::from)?;

            let status = response.status();
            if status.is_success() {
                return Ok(true);
            }
            if matches!(
                status,
                StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
            ) {
                tracing::debug!(live_target = %target, %status, "server does not offer push");
                return Ok(false);
            }
            Err(HttpError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            }
            .into())
        }
    }

    fn open(
        &self,
        target: &LiveTarget,
    ) -> impl Future<Output = Result<Self::Stream, SignageError>> + Send {
        let this = self.clone();
        let target = target.clone();
        async move {
            let response = this
                .http
                .get(this.url(STREAM_PATH))
                .query(&stream_query(&target))
                .header(ACCEPT, "text/event-stream")
                .send()
                .await
                .map_err(HttpError::from)?;
            let response = ensure_success(response)?;
            tracing::debug!(live_target = %target, "live channel open");
            Ok(sse::messages(response))
        }
    }
}
