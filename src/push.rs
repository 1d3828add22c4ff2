//! The push-mode Pushgateway client: a periodic loop that POSTs the full
//! exposition to a target URL built from a job (and optional
//! instance/grouping-key) until cancelled, pushing once more on the way
//! out. Grounded on `metrics-exporter-prometheus`'s
//! `exporter/push_gateway.rs`, trimmed to plain HTTP (no TLS).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::HeaderValue;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::sync::Notify;
use tracing::error;

use crate::error::{MetricsError, Result};
use crate::registry::Registry;

/// A cooperative cancellation signal for [`Pusher::run`]. Cloning shares
/// the same underlying flag; calling [`PushCancelToken::cancel`] from any
/// clone wakes every waiter.
#[derive(Clone)]
pub struct PushCancelToken(Arc<CancelInner>);

struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Default for PushCancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PushCancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self(Arc::new(CancelInner {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }))
    }

    /// Signals cancellation. The pusher performs one final push, then
    /// returns from [`Pusher::run`].
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.0.notify.notified().await;
    }
}

/// Periodically pushes a [`Registry`]'s exposition to a Prometheus
/// Pushgateway.
pub struct Pusher {
    registry: Arc<Registry>,
    client: Client<HttpConnector, Full<Bytes>>,
    endpoint: String,
    job: String,
    instance: Option<String>,
    grouping_key: Vec<(String, String)>,
    interval: Duration,
    basic_auth: Option<(String, Option<String>)>,
    on_error: Option<Arc<dyn Fn(MetricsError) + Send + Sync>>,
}

impl Pusher {
    /// Builds a pusher targeting `<endpoint>/job/<job>`. Fails if either
    /// is empty.
    pub fn new(registry: Arc<Registry>, endpoint: impl Into<String>, job: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let job = job.into();
        if endpoint.is_empty() {
            return Err(MetricsError::invalid("pusher endpoint must not be empty"));
        }
        if job.is_empty() {
            return Err(MetricsError::invalid("pusher job must not be empty"));
        }
        Ok(Self {
            registry,
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            endpoint,
            job,
            instance: None,
            grouping_key: Vec::new(),
            interval: Duration::from_millis(1000),
            basic_auth: None,
            on_error: None,
        })
    }

    /// Adds an `instance` path segment to the target URL. Fails if empty.
    pub fn instance(mut self, instance: impl Into<String>) -> Result<Self> {
        let instance = instance.into();
        if instance.is_empty() {
            return Err(MetricsError::invalid("pusher instance must not be empty"));
        }
        self.instance = Some(instance);
        Ok(self)
    }

    /// Adds a `key/value` grouping-key path segment pair. Both must be
    /// non-empty.
    pub fn grouping_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || value.is_empty() {
            return Err(MetricsError::invalid(
                "pusher grouping key and value must not be empty",
            ));
        }
        self.grouping_key.push((key, value));
        Ok(self)
    }

    /// Sets the push interval (default 1000 ms). Fails if not positive.
    pub fn interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(MetricsError::invalid("pusher interval must be positive"));
        }
        self.interval = interval;
        Ok(self)
    }

    /// Sends HTTP basic auth credentials with every push.
    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.basic_auth = Some((username.into(), password));
        self
    }

    /// Installs a callback invoked on every transport failure (non-2xx
    /// response or network error). Scrape failures are never delivered
    /// here: a cycle that cannot collect is skipped silently.
    pub fn on_error(mut self, on_error: impl Fn(MetricsError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    fn target_url(&self) -> std::result::Result<Uri, MetricsError> {
        let mut url = format!("{}/job/{}", self.endpoint.trim_end_matches('/'), self.job);
        if let Some(instance) = &self.instance {
            url.push_str(&format!("/instance/{instance}"));
        }
        for (k, v) in &self.grouping_key {
            url.push_str(&format!("/{k}/{v}"));
        }
        url.parse()
            .map_err(|e| MetricsError::TransportFailure(format!("invalid pusher target url: {e}")))
    }

    /// Runs the periodic push loop until `cancel` fires, then performs one
    /// final push and returns.
    pub async fn run(self, cancel: PushCancelToken) -> Result<()> {
        loop {
            let start = Instant::now();
            self.push_once().await;

            if cancel.is_cancelled() {
                return Ok(());
            }

            let elapsed = start.elapsed();
            let remaining = self.interval.saturating_sub(elapsed);
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = cancel.cancelled() => {
                    self.push_once().await;
                    return Ok(());
                }
            }
        }
    }

    async fn push_once(&self) {
        let mut body = String::new();
        match self.registry.collect_and_serialize(&mut body) {
            Ok(()) => {}
            Err(MetricsError::ScrapeFailure(_)) => return,
            Err(e) => {
                self.deliver_error(e);
                return;
            }
        }

        let target = match self.target_url() {
            Ok(target) => target,
            Err(e) => {
                self.deliver_error(e);
                return;
            }
        };

        let mut builder = Request::builder().method(Method::POST).uri(target);
        builder = builder.header("content-type", "text/plain");
        if let Some((username, password)) = &self.basic_auth {
            builder = builder.header("authorization", basic_auth_header(username, password.as_deref()));
        }
        let request = match builder.body(Full::from(body)) {
            Ok(request) => request,
            Err(e) => {
                self.deliver_error(MetricsError::TransportFailure(e.to_string()));
                return;
            }
        };

        match self.client.request(request).await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                self.deliver_error(MetricsError::TransportFailure(format!(
                    "pushgateway responded {}",
                    response.status()
                )));
            }
            Err(e) => {
                self.deliver_error(MetricsError::TransportFailure(e.to_string()));
            }
        }
    }

    fn deliver_error(&self, err: MetricsError) {
        match &self.on_error {
            Some(on_error) => on_error(err),
            None => error!(error = %err, "pushgateway delivery failed"),
        }
    }
}

fn basic_auth_header(username: &str, password: Option<&str>) -> HeaderValue {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let credentials = match password {
        Some(password) => format!("{username}:{password}"),
        None => format!("{username}:"),
    };
    let mut header = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(credentials)))
        .expect("base64-encoded credentials are always a valid header value");
    header.set_sensitive(true);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_endpoint_or_job() {
        let registry = Arc::new(Registry::new());
        assert!(Pusher::new(registry.clone(), "", "job").is_err());
        assert!(Pusher::new(registry, "http://localhost:9091", "").is_err());
    }

    #[test]
    fn rejects_nonpositive_interval() {
        let registry = Arc::new(Registry::new());
        let pusher = Pusher::new(registry, "http://localhost:9091", "job").unwrap();
        assert!(pusher.interval(Duration::ZERO).is_err());
    }

    #[test]
    fn target_url_includes_instance_and_grouping_key() {
        let registry = Arc::new(Registry::new());
        let pusher = Pusher::new(registry, "http://localhost:9091", "my_job")
            .unwrap()
            .instance("host1")
            .unwrap()
            .grouping_key("region", "eu")
            .unwrap();
        let url = pusher.target_url().unwrap();
        assert_eq!(
            url.to_string(),
            "http://localhost:9091/job/my_job/instance/host1/region/eu"
        );
    }

    #[test]
    fn basic_auth_header_encodes_username_and_password() {
        let header = basic_auth_header("metrics", Some("secret"));
        assert!(header.is_sensitive());
        assert!(header.to_str().unwrap().starts_with("Basic "));
    }
}
