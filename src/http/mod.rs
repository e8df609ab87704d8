//! HTTP middleware that applies hit store verdicts to requests.
//!
//! [`RateLimitLayer`] is a tower layer, so it can wrap any tower service
//! whose response is an axum [`Response`](axum::response::Response).

mod handler;
pub mod headers;
mod key;
mod layer;
mod options;
mod server;

pub use handler::{DefaultRejection, RejectionHandler};
pub use headers::RateLimitInfo;
pub use key::{ForwardedFor, KeyGenerator, KeySource, RemoteAddr, X_FORWARDED_FOR};
pub use layer::{RateLimitBuilder, RateLimitLayer, RateLimitService};
pub use options::{RateLimitOptions, DEFAULT_MESSAGE};
pub use server::{router, HttpServer};
