//! Orma — visitor-analytics capture for web applications.
//!
//! Orma records the entities behind page traffic (sessions, visits, devices,
//! agents, cookies, errors, routes) and answers aggregate questions about
//! them. Its centerpiece is a fingerprint-based deduplication cache that
//! absorbs bursts of near-duplicate tracking writes: a partially-known record
//! is reduced to a stable identity key, and a short-TTL cache decides whether
//! the authoritative store needs to be consulted at all.
//!
//! The crate is a library; the host application owns routing, request
//! parsing, and process startup, and feeds Orma already-parsed capture
//! parameters.
//!
//! Layers:
//!
//! - [`cache`] — attribute normalization, fingerprint construction, the
//!   TTL store abstraction, and the deduplication facade.
//! - [`domain`] — records mirrored from persistent storage.
//! - [`application`] — repository traits plus the capture and statistics
//!   services.
//! - [`infra`] — Postgres-backed repositories and telemetry bootstrap.
//! - [`config`] — typed settings with layered precedence (file → env).

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
