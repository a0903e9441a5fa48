//! # GDAP Bulk Migration Library
//!
//! Core functionality for bulk-migrating delegated admin (GDAP) relationships
//! and their access assignments between a partner tenant and many customer
//! tenants, against a paginated, rate-limited administrative API.

pub mod auth;
pub mod batch;
pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod paging;
pub mod store;
pub mod sync;
