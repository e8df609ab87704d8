//! Tower middleware that rate limits requests against a hit store.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures::future::BoxFuture;
use tower::{BoxError, Layer, Service};
use tracing::{trace, warn};

use super::handler::{DefaultRejection, RejectionHandler};
use super::headers::{self, RateLimitInfo};
use super::key::{KeyGenerator, RemoteAddr};
use super::options::{RateLimitOptions, DEFAULT_MESSAGE};
use crate::error::{HitguardError, Result};
use crate::ratelimit::HitStore;

/// Everything a [`RateLimitService`] needs, shared between clones.
struct Limiter {
    store: Arc<dyn HitStore>,
    key_generator: Arc<dyn KeyGenerator>,
    handler: Arc<dyn RejectionHandler>,
    options: RateLimitOptions,
}

/// Builder for [`RateLimitLayer`].
///
/// Every field except the store has a default.
pub struct RateLimitBuilder {
    store: Option<Arc<dyn HitStore>>,
    key_generator: Arc<dyn KeyGenerator>,
    handler: Arc<dyn RejectionHandler>,
    status_code: u16,
    message: String,
    legacy_headers: bool,
    standard_headers: bool,
}

impl Default for RateLimitBuilder {
    fn default() -> Self {
        Self {
            store: None,
            key_generator: Arc::new(RemoteAddr),
            handler: Arc::new(DefaultRejection),
            status_code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            message: DEFAULT_MESSAGE.to_string(),
            legacy_headers: true,
            standard_headers: false,
        }
    }
}

impl RateLimitBuilder {
    /// Store that counts hits. Required.
    pub fn store(mut self, store: Arc<dyn HitStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// How requests are mapped to keys. Defaults to [`RemoteAddr`].
    pub fn key_generator(mut self, key_generator: impl KeyGenerator + 'static) -> Self {
        self.key_generator = Arc::new(key_generator);
        self
    }

    /// Same as [`key_generator`](Self::key_generator) for an already shared generator.
    pub fn shared_key_generator(mut self, key_generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = key_generator;
        self
    }

    /// Response for rejected requests. Defaults to [`DefaultRejection`].
    pub fn handler(mut self, handler: impl RejectionHandler + 'static) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Status code for the default rejection. Defaults to 429.
    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Body for the default rejection.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Emit `X-RateLimit-*` headers. Defaults to `true`.
    pub fn legacy_headers(mut self, enabled: bool) -> Self {
        self.legacy_headers = enabled;
        self
    }

    /// Emit `RateLimit-*` headers. Defaults to `false`.
    pub fn standard_headers(mut self, enabled: bool) -> Self {
        self.standard_headers = enabled;
        self
    }

    /// Validate the configuration and build the layer.
    pub fn build(self) -> Result<RateLimitLayer> {
        let store = self.store.ok_or_else(|| {
            HitguardError::Config("a hit store is required to build the rate limit layer".to_string())
        })?;

        let status_code = StatusCode::from_u16(self.status_code)
            .map_err(|e| HitguardError::Config(format!("invalid status code {}: {}", self.status_code, e)))?;

        Ok(RateLimitLayer {
            limiter: Arc::new(Limiter {
                store,
                key_generator: self.key_generator,
                handler: self.handler,
                options: RateLimitOptions {
                    status_code,
                    message: self.message,
                    legacy_headers: self.legacy_headers,
                    standard_headers: self.standard_headers,
                },
            }),
        })
    }
}

/// A layer that enforces fixed-window rate limits on requests.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<Limiter>,
}

impl fmt::Debug for RateLimitLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitLayer")
            .field("options", &self.limiter.options)
            .field("max_connections", &self.limiter.store.max_connections())
            .field("window_seconds", &self.limiter.store.window_seconds())
            .finish()
    }
}

impl RateLimitLayer {
    /// Start configuring a layer.
    pub fn builder() -> RateLimitBuilder {
        RateLimitBuilder::default()
    }

    /// Forget the hits counted for `key`.
    pub async fn reset_key(&self, key: &str) -> Result<()> {
        self.limiter.store.reset_key(key).await
    }

    /// The store backing this layer.
    pub fn store(&self) -> &Arc<dyn HitStore> {
        &self.limiter.store
    }

    /// Response options in effect.
    pub fn options(&self) -> &RateLimitOptions {
        &self.limiter.options
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Middleware service produced by [`RateLimitLayer`].
///
/// Key derivation and store failures are returned as the service error and
/// are never turned into a rejection.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<Limiter>,
}

impl<S, B> Service<Request<B>> for RateLimitService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, std::result::Result<Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // Keep the service that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let key = limiter.key_generator.generate(&parts).map_err(|e| {
                warn!(error = %e, path = %parts.uri.path(), "Failed to derive rate limit key");
                e
            })?;

            let result = limiter.store.increment(&key).await.map_err(|e| {
                warn!(key = %key, error = %e, "Hit store increment failed");
                e
            })?;

            let info = RateLimitInfo::new(limiter.store.max_connections(), &result);
            let options = &limiter.options;

            if result.has_passed_limit {
                warn!(
                    key = %key,
                    total_hits = result.total_hits,
                    reset_time = %info.reset_time_iso(),
                    "Rate limit exceeded"
                );
                let mut response = limiter.handler.reject(&parts, &info, options);
                headers::apply_usage(response.headers_mut(), &info, options);
                headers::apply_retry_after(response.headers_mut(), &info, options);
                return Ok(response);
            }

            trace!(key = %key, remaining = info.remaining, "Request admitted");

            parts.extensions.insert(info.clone());
            let mut response = inner
                .call(Request::from_parts(parts, body))
                .await
                .map_err(Into::into)?;
            headers::apply_usage(response.headers_mut(), &info, options);
            Ok(response)
        })
    }
}
