//! Client key derivation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::error::{HitguardError, Result};

/// Header consulted by [`ForwardedFor`].
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Derives the key a request is counted under.
///
/// Implementations must return an error when the client cannot be
/// identified; an empty or placeholder key would merge unrelated clients into
/// one counter.
pub trait KeyGenerator: Send + Sync {
    /// Compute the key for a request.
    fn generate(&self, parts: &Parts) -> Result<String>;
}

impl<F> KeyGenerator for F
where
    F: Fn(&Parts) -> Result<String> + Send + Sync,
{
    fn generate(&self, parts: &Parts) -> Result<String> {
        self(parts)
    }
}

/// Keys requests by the peer IP address.
///
/// Requires the server to record connection info, e.g. with
/// `Router::into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteAddr;

impl KeyGenerator for RemoteAddr {
    fn generate(&self, parts: &Parts) -> Result<String> {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .ok_or_else(|| {
                HitguardError::KeyExtraction(
                    "peer address is not available on the request; serve with connect info \
                     or configure a different key generator"
                        .to_string(),
                )
            })
    }
}

/// Keys requests by the first address in `X-Forwarded-For`.
///
/// Only trustworthy behind a proxy that overwrites the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardedFor;

impl KeyGenerator for ForwardedFor {
    fn generate(&self, parts: &Parts) -> Result<String> {
        let value = parts
            .headers
            .get(X_FORWARDED_FOR)
            .ok_or_else(|| HitguardError::KeyExtraction("missing X-Forwarded-For header".to_string()))?;

        let value = value
            .to_str()
            .map_err(|e| HitguardError::KeyExtraction(format!("invalid X-Forwarded-For header: {}", e)))?;

        value
            .split(',')
            .map(str::trim)
            .next()
            .filter(|client| !client.is_empty())
            .map(str::to_string)
            .ok_or_else(|| HitguardError::KeyExtraction("empty X-Forwarded-For header".to_string()))
    }
}

/// Built-in key generators selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// See [`RemoteAddr`].
    #[default]
    RemoteAddr,
    /// See [`ForwardedFor`].
    ForwardedFor,
}

impl KeySource {
    /// The generator for this source.
    pub fn generator(self) -> Arc<dyn KeyGenerator> {
        match self {
            KeySource::RemoteAddr => Arc::new(RemoteAddr),
            KeySource::ForwardedFor => Arc::new(ForwardedFor),
        }
    }
}
