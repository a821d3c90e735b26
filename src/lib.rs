//! # RepoMirror Library
//!
//! This library provides the core functionality for the RepoMirror sync
//! service: webhook ingestion, full sync, outbound push and the content
//! cache, plus the HTTP surface and server configuration.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod provider;
pub mod repositories;
pub mod server;
pub mod sync;
pub mod webhook_verification;
pub use migration;
