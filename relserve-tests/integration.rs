//! Integration tests for Relserve
//!
//! These tests drive the full HTTP router in-process against a temporary
//! releases directory and check the responses clients actually see.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/catalog_endpoints.rs"]
mod catalog_endpoints;

#[path = "integration/download_endpoint.rs"]
mod download_endpoint;
