//! Hitguard - Fixed-Window Request Rate Limiting
//!
//! This crate counts requests per client inside fixed time windows and
//! rejects clients that go over a ceiling. The counting lives in an
//! in-memory, sharded hit store; a tower layer derives the client key for
//! each request, consults the store and answers over-limit clients with 429.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
